//! Batch driver: pairs ground-truth and reconstruction files, runs the
//! selected metrics, and aggregates averages.
//!
//! Image decoding stays behind the [`ImageLoader`] seam so the core never
//! depends on a codec; the CLI supplies a loader backed by the `image`
//! crate. Pairing is deterministic: both directory listings are sorted and
//! matched by index, and each ground-truth filename stem must appear inside
//! the corresponding reconstruction stem. Any mismatch aborts the whole
//! batch.

use std::fs;
use std::path::{Path, PathBuf};

use crate::image::Planes;
use crate::{wspsnr, wsssim, WsMetricsError};

/// The metrics a batch run can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Weighted-spherical PSNR.
    WsPsnr,
    /// Weighted-spherical SSIM.
    WsSsim,
}

impl MetricKind {
    /// All supported metrics, in reporting order.
    #[must_use]
    pub fn all() -> [Self; 2] {
        [Self::WsPsnr, Self::WsSsim]
    }

    /// Short lowercase name used in reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::WsPsnr => "wspsnr",
            Self::WsSsim => "wsssim",
        }
    }

    /// Runs this metric on one pair.
    ///
    /// # Errors
    /// Propagates the engine's validation errors.
    pub fn compute(
        self,
        gt: &Planes,
        sr: &Planes,
        crop_border: usize,
    ) -> Result<f64, WsMetricsError> {
        match self {
            Self::WsPsnr => wspsnr(gt, sr, crop_border),
            Self::WsSsim => wsssim(gt, sr, crop_border),
        }
    }
}

/// Image-decoding collaborator for the batch driver.
pub trait ImageLoader {
    /// Reads one image file into planar form.
    ///
    /// # Errors
    /// Returns [`WsMetricsError::Load`] (or any other variant) when the file
    /// cannot be read or decoded.
    fn load(&self, path: &Path) -> Result<Planes, WsMetricsError>;
}

/// Options for a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Border pixels excluded from every comparison.
    pub crop_border: usize,
    /// Lowercase file extensions to include; empty means all files.
    pub extensions: Vec<String>,
}

/// Per-metric batch outcome: per-pair values in pairing order plus their
/// arithmetic mean.
#[derive(Debug, Clone)]
pub struct MetricSummary {
    /// Which metric this summarizes.
    pub metric: MetricKind,
    /// `(id, value)` per pair, where `id` is the ground-truth filename stem.
    pub values: Vec<(String, f64)>,
    /// Arithmetic mean over all pairs.
    pub average: f64,
}

/// Structured result of a batch run.
#[derive(Debug, Clone)]
pub struct BatchReport {
    metrics: Vec<MetricSummary>,
}

impl BatchReport {
    /// Summaries in the order the metrics were requested.
    #[must_use]
    pub fn metrics(&self) -> &[MetricSummary] {
        &self.metrics
    }

    /// Looks up the summary for one metric.
    #[must_use]
    pub fn get(&self, kind: MetricKind) -> Option<&MetricSummary> {
        self.metrics.iter().find(|s| s.metric == kind)
    }

    /// Number of pairs processed.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.metrics.first().map_or(0, |s| s.values.len())
    }
}

/// Running accumulator for one metric, owned by the batch loop.
#[derive(Debug, Default)]
struct MetricAccumulator {
    values: Vec<(String, f64)>,
    sum: f64,
}

impl MetricAccumulator {
    fn record(&mut self, id: &str, value: f64) {
        self.values.push((id.to_owned(), value));
        self.sum += value;
    }

    fn finish(self, metric: MetricKind) -> MetricSummary {
        let average = if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        };
        MetricSummary {
            metric,
            values: self.values,
            average,
        }
    }
}

/// Runs `metrics` over every matched pair of `gt_dir` and `sr_dir`.
///
/// Pairs are processed sequentially; each comparison is independent and
/// side-effect-free. Fails fast: a pairing mismatch or a metric error on any
/// pair aborts the whole run.
///
/// # Errors
/// [`WsMetricsError::PairMismatch`] on listing/stem mismatch,
/// [`WsMetricsError::EmptyBatch`] when `gt_dir` has no eligible files, plus
/// anything the loader or engines raise.
pub fn compute_metrics<L: ImageLoader>(
    loader: &L,
    gt_dir: &Path,
    sr_dir: &Path,
    metrics: &[MetricKind],
    options: &BatchOptions,
) -> Result<BatchReport, WsMetricsError> {
    let pairs = pair_files(gt_dir, sr_dir, &options.extensions)?;

    let mut accumulators: Vec<(MetricKind, MetricAccumulator)> = metrics
        .iter()
        .map(|&kind| (kind, MetricAccumulator::default()))
        .collect();

    for (gt_path, sr_path) in &pairs {
        let id = file_stem(gt_path);
        let gt = loader.load(gt_path)?;
        let sr = loader.load(sr_path)?;
        for (kind, acc) in &mut accumulators {
            let value = kind.compute(&gt, &sr, options.crop_border)?;
            acc.record(&id, value);
        }
    }

    Ok(BatchReport {
        metrics: accumulators
            .into_iter()
            .map(|(kind, acc)| acc.finish(kind))
            .collect(),
    })
}

/// Matches the sorted listings of two directories index by index.
///
/// # Errors
/// [`WsMetricsError::PairMismatch`] if the listings differ in length or a
/// ground-truth stem is not a substring of its partner's stem;
/// [`WsMetricsError::EmptyBatch`] if the ground-truth listing is empty.
pub fn pair_files(
    gt_dir: &Path,
    sr_dir: &Path,
    extensions: &[String],
) -> Result<Vec<(PathBuf, PathBuf)>, WsMetricsError> {
    let gt_files = list_files(gt_dir, extensions)?;
    let sr_files = list_files(sr_dir, extensions)?;

    if gt_files.is_empty() {
        return Err(WsMetricsError::EmptyBatch {
            dir: gt_dir.to_path_buf(),
        });
    }
    if gt_files.len() != sr_files.len() {
        return Err(WsMetricsError::PairMismatch {
            reason: format!(
                "file counts differ: {} in {} vs {} in {}",
                gt_files.len(),
                gt_dir.display(),
                sr_files.len(),
                sr_dir.display()
            ),
        });
    }

    for (gt_path, sr_path) in gt_files.iter().zip(&sr_files) {
        let gt_stem = file_stem(gt_path);
        let sr_stem = file_stem(sr_path);
        if !sr_stem.contains(&gt_stem) {
            return Err(WsMetricsError::PairMismatch {
                reason: format!(
                    "stem '{gt_stem}' of {} not found in '{sr_stem}' of {}",
                    gt_path.display(),
                    sr_path.display()
                ),
            });
        }
    }

    Ok(gt_files.into_iter().zip(sr_files).collect())
}

fn list_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>, WsMetricsError> {
    let entries = fs::read_dir(dir).map_err(|e| WsMetricsError::Load {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| WsMetricsError::Load {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if !extensions.is_empty() {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_lowercase)
                .unwrap_or_default();
            if !extensions.contains(&ext) {
                continue;
            }
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageF;
    use std::collections::HashMap;

    /// In-memory loader keyed by filename stem.
    struct FakeLoader {
        images: HashMap<String, Planes>,
    }

    impl ImageLoader for FakeLoader {
        fn load(&self, path: &Path) -> Result<Planes, WsMetricsError> {
            self.images
                .get(&file_stem(path))
                .cloned()
                .ok_or_else(|| WsMetricsError::Load {
                    path: path.to_path_buf(),
                    message: "not present".into(),
                })
        }
    }

    fn temp_dir(tag: &str) -> PathBuf {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "ws-metrics-batch-{tag}-{}-{id}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").expect("write file");
    }

    fn gradient(width: usize, height: usize, offset: f64) -> Planes {
        let mut plane = ImageF::new(width, height);
        for y in 0..height {
            for x in 0..width {
                plane.set(x, y, ((x * 5 + y * 3) % 200) as f64 + offset);
            }
        }
        Planes::from_planes(vec![plane])
    }

    #[test]
    fn test_pairing_by_stem_substring() {
        let gt = temp_dir("gt");
        let sr = temp_dir("sr");
        touch(&gt, "000.png");
        touch(&gt, "001.png");
        touch(&sr, "000_sr.png");
        touch(&sr, "001_sr.png");

        let pairs = pair_files(&gt, &sr, &[]).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(file_stem(&pairs[0].1), "000_sr");
        assert_eq!(file_stem(&pairs[1].1), "001_sr");

        fs::remove_dir_all(&gt).ok();
        fs::remove_dir_all(&sr).ok();
    }

    #[test]
    fn test_pairing_sorts_before_matching() {
        // Listing order on disk doesn't matter; both sides are sorted, so
        // a listing created out of order still pairs up.
        let gt = temp_dir("gt");
        let sr = temp_dir("sr");
        touch(&gt, "000.png");
        touch(&gt, "001.png");
        touch(&sr, "001_sr.png");
        touch(&sr, "000_sr.png");

        let pairs = pair_files(&gt, &sr, &[]).unwrap();
        assert_eq!(file_stem(&pairs[0].0), "000");
        assert_eq!(file_stem(&pairs[0].1), "000_sr");

        fs::remove_dir_all(&gt).ok();
        fs::remove_dir_all(&sr).ok();
    }

    #[test]
    fn test_count_mismatch_fails() {
        let gt = temp_dir("gt");
        let sr = temp_dir("sr");
        touch(&gt, "000.png");
        touch(&gt, "001.png");
        touch(&sr, "000_sr.png");

        assert!(matches!(
            pair_files(&gt, &sr, &[]),
            Err(WsMetricsError::PairMismatch { .. })
        ));

        fs::remove_dir_all(&gt).ok();
        fs::remove_dir_all(&sr).ok();
    }

    #[test]
    fn test_stem_mismatch_fails() {
        let gt = temp_dir("gt");
        let sr = temp_dir("sr");
        touch(&gt, "frame_a.png");
        touch(&sr, "frame_b_sr.png");

        assert!(matches!(
            pair_files(&gt, &sr, &[]),
            Err(WsMetricsError::PairMismatch { .. })
        ));

        fs::remove_dir_all(&gt).ok();
        fs::remove_dir_all(&sr).ok();
    }

    #[test]
    fn test_empty_batch_fails() {
        let gt = temp_dir("gt");
        let sr = temp_dir("sr");

        assert!(matches!(
            pair_files(&gt, &sr, &[]),
            Err(WsMetricsError::EmptyBatch { .. })
        ));

        fs::remove_dir_all(&gt).ok();
        fs::remove_dir_all(&sr).ok();
    }

    #[test]
    fn test_extension_filter() {
        let gt = temp_dir("gt");
        let sr = temp_dir("sr");
        touch(&gt, "000.png");
        touch(&gt, "notes.txt");
        touch(&sr, "000_sr.png");

        let pairs = pair_files(&gt, &sr, &["png".to_owned()]).unwrap();
        assert_eq!(pairs.len(), 1);

        fs::remove_dir_all(&gt).ok();
        fs::remove_dir_all(&sr).ok();
    }

    #[test]
    fn test_compute_metrics_report() {
        let gt = temp_dir("gt");
        let sr = temp_dir("sr");
        touch(&gt, "000.png");
        touch(&gt, "001.png");
        touch(&sr, "000_sr.png");
        touch(&sr, "001_sr.png");

        let mut images = HashMap::new();
        images.insert("000".to_owned(), gradient(16, 12, 0.0));
        images.insert("000_sr".to_owned(), gradient(16, 12, 4.0));
        images.insert("001".to_owned(), gradient(16, 12, 0.0));
        images.insert("001_sr".to_owned(), gradient(16, 12, 8.0));
        let loader = FakeLoader { images };

        let report = compute_metrics(
            &loader,
            &gt,
            &sr,
            &[MetricKind::WsPsnr, MetricKind::WsSsim],
            &BatchOptions::default(),
        )
        .unwrap();

        assert_eq!(report.pair_count(), 2);
        let psnr = report.get(MetricKind::WsPsnr).unwrap();
        assert_eq!(psnr.values.len(), 2);
        assert_eq!(psnr.values[0].0, "000");
        // Uniform offsets give exact PSNR values.
        let expected_000 = 10.0 * (255.0f64 * 255.0 / 16.0).log10();
        let expected_001 = 10.0 * (255.0f64 * 255.0 / 64.0).log10();
        assert!((psnr.values[0].1 - expected_000).abs() < 1e-9);
        assert!((psnr.values[1].1 - expected_001).abs() < 1e-9);
        assert!((psnr.average - (expected_000 + expected_001) / 2.0).abs() < 1e-9);

        let ssim = report.get(MetricKind::WsSsim).unwrap();
        assert_eq!(ssim.values.len(), 2);
        assert!(ssim.values.iter().all(|&(_, v)| v > 0.0 && v <= 1.0));

        fs::remove_dir_all(&gt).ok();
        fs::remove_dir_all(&sr).ok();
    }

    #[test]
    fn test_loader_failure_aborts() {
        let gt = temp_dir("gt");
        let sr = temp_dir("sr");
        touch(&gt, "000.png");
        touch(&sr, "000_sr.png");

        let loader = FakeLoader {
            images: HashMap::new(),
        };
        let report = compute_metrics(
            &loader,
            &gt,
            &sr,
            &[MetricKind::WsPsnr],
            &BatchOptions::default(),
        );
        assert!(matches!(report, Err(WsMetricsError::Load { .. })));

        fs::remove_dir_all(&gt).ok();
        fs::remove_dir_all(&sr).ok();
    }
}
