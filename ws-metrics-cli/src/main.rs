//! ws-metrics CLI - spherically weighted quality metrics for 360° content
//!
//! Compare an equirectangular reconstruction against ground truth and
//! compute WS-PSNR / WS-SSIM scores.

use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ColorChoice, Parser, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use ws_metrics::{
    compute_metrics, wspsnr, wsssim, BatchOptions, BatchReport, ImageLoader, MetricKind, Planes,
    WsMetricsError,
};

/// Spherically weighted image quality metrics for equirectangular content
///
/// Computes WS-PSNR and WS-SSIM between ground-truth and reconstructed
/// 360° frames. Pixel rows are weighted by their sphere area, so error
/// near the poles counts less than error at the equator.
///
/// WS-PSNR is reported in dB (higher is better, inf for identical images).
/// WS-SSIM is ~1.0 for identical images and drops with structural damage.
#[derive(Parser, Debug)]
#[command(name = "ws-metrics")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    Compare two frames:
        ws-metrics gt.png reconstructed.png

    Batch mode over matched directories (paired by sorted filename stems):
        ws-metrics --batch gt_frames/ sr_frames/

    Exclude a 4-pixel border from the comparison:
        ws-metrics --crop-border 4 gt.png reconstructed.png

    Only WS-PSNR, machine-readable:
        ws-metrics --metric wspsnr --quiet gt.png reconstructed.png

    JSON for scripting:
        ws-metrics --json --batch gt_frames/ sr_frames/

    CI gating:
        ws-metrics --min-psnr 35 --min-ssim 0.95 gt.png reconstructed.png

EXIT CODES:
    0 - Success (all thresholds met if --min-psnr/--min-ssim specified)
    1 - A score fell below its threshold
    2 - Error (file not found, shape mismatch, pairing failure, etc.)")]
struct Cli {
    /// Ground-truth image or directory
    #[arg(value_name = "GROUND_TRUTH")]
    gt: PathBuf,

    /// Reconstructed image or directory
    #[arg(value_name = "RECONSTRUCTED")]
    sr: PathBuf,

    /// Which metrics to compute
    #[arg(short, long, value_enum, default_value = "all")]
    metric: MetricArg,

    /// Pixels to crop from each edge before comparison
    #[arg(long, default_value = "0", value_name = "N")]
    crop_border: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Output JSON (shorthand for --format json)
    #[arg(long, conflicts_with = "format")]
    json: bool,

    /// Quiet mode - only output score numbers
    #[arg(long, short = 'q', conflicts_with = "format")]
    quiet: bool,

    /// Batch mode: compare matched files in two directories
    #[arg(long, short = 'b')]
    batch: bool,

    /// File extensions to include in batch mode (comma-separated)
    #[arg(
        long,
        default_value = "png,jpg,jpeg,webp,bmp",
        value_delimiter = ','
    )]
    extensions: Vec<String>,

    /// Minimum acceptable WS-PSNR in dB (exit code 1 if any pair is below)
    #[arg(long, value_name = "DB")]
    min_psnr: Option<f64>,

    /// Minimum acceptable WS-SSIM (exit code 1 if any pair is below)
    #[arg(long, value_name = "SCORE")]
    min_ssim: Option<f64>,

    /// Suppress per-pair detail lines in batch mode
    #[arg(long)]
    no_details: bool,

    /// Suppress the average summary in batch mode
    #[arg(long)]
    no_summary: bool,

    /// Control color output
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum MetricArg {
    /// Both WS-PSNR and WS-SSIM
    All,
    /// WS-PSNR only
    Wspsnr,
    /// WS-SSIM only
    Wsssim,
}

impl MetricArg {
    fn kinds(self) -> Vec<MetricKind> {
        match self {
            Self::All => MetricKind::all().to_vec(),
            Self::Wspsnr => vec![MetricKind::WsPsnr],
            Self::Wsssim => vec![MetricKind::WsSsim],
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON with per-pair values and averages
    Json,
    /// Minimal - just the score numbers
    Score,
}

#[derive(Serialize)]
struct JsonPair {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wspsnr: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wsssim: Option<f64>,
}

#[derive(Serialize)]
struct JsonOutput {
    ground_truth: String,
    reconstructed: String,
    crop_border: usize,
    pairs: Vec<JsonPair>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wspsnr_avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wsssim_avg: Option<f64>,
}

/// Image-crate-backed loader for the batch driver.
struct FileLoader;

impl ImageLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<Planes, WsMetricsError> {
        load_planes(path)
    }
}

fn load_planes(path: &Path) -> Result<Planes, WsMetricsError> {
    let img = image::open(path).map_err(|e| WsMetricsError::Load {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let (width, height) = (img.width() as usize, img.height() as usize);
    // Grayscale stays single-channel; everything else is compared as RGB.
    Ok(match img {
        image::DynamicImage::ImageLuma8(gray) => {
            let samples: Vec<f64> = gray.as_raw().iter().map(|&v| f64::from(v)).collect();
            Planes::from_gray(&samples, width, height)
        }
        other => {
            let rgb = other.to_rgb8();
            Planes::from_interleaved_u8(
                rgb.as_raw(),
                width,
                height,
                3,
                ws_metrics::AxisOrder::Hwc,
            )
        }
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_colors(&cli);

    if cli.batch || (cli.gt.is_dir() && cli.sr.is_dir()) {
        run_batch(&cli)
    } else {
        run_single(&cli)
    }
}

fn setup_colors(cli: &Cli) {
    match cli.color {
        ColorChoice::Always => colored::control::set_override(true),
        ColorChoice::Never => colored::control::set_override(false),
        ColorChoice::Auto => {
            if !io::stdout().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

fn get_format(cli: &Cli) -> OutputFormat {
    if cli.json {
        OutputFormat::Json
    } else if cli.quiet {
        OutputFormat::Score
    } else {
        cli.format
    }
}

fn fail(message: &str) -> ExitCode {
    eprintln!("{}: {message}", "error".red().bold());
    ExitCode::from(2)
}

fn run_single(cli: &Cli) -> ExitCode {
    let result = (|| -> Result<Vec<(MetricKind, f64)>, WsMetricsError> {
        let gt = load_planes(&cli.gt)?;
        let sr = load_planes(&cli.sr)?;
        cli.metric
            .kinds()
            .into_iter()
            .map(|kind| {
                let value = match kind {
                    MetricKind::WsPsnr => wspsnr(&gt, &sr, cli.crop_border)?,
                    MetricKind::WsSsim => wsssim(&gt, &sr, cli.crop_border)?,
                };
                Ok((kind, value))
            })
            .collect()
    })();

    let values = match result {
        Ok(values) => values,
        Err(e) => return fail(&e.to_string()),
    };

    match get_format(cli) {
        OutputFormat::Score => {
            for (_, value) in &values {
                println!("{value:.6}");
            }
        }
        OutputFormat::Text => {
            for &(kind, value) in &values {
                let label = display_name(kind);
                let formatted = format_value(kind, value);
                match threshold_for(cli, kind) {
                    Some(min) if value < min => {
                        println!("{label}: {} (below minimum {min})", formatted.red());
                    }
                    _ => println!("{label}: {formatted}"),
                }
            }
        }
        OutputFormat::Json => {
            let id = stem_of(&cli.gt);
            let pair = json_pair(&id, &values);
            let output = JsonOutput {
                ground_truth: cli.gt.display().to_string(),
                reconstructed: cli.sr.display().to_string(),
                crop_border: cli.crop_border,
                wspsnr_avg: pair.wspsnr,
                wsssim_avg: pair.wsssim,
                pairs: vec![pair],
            };
            match serde_json::to_string_pretty(&output) {
                Ok(json) => println!("{json}"),
                Err(e) => return fail(&format!("failed to serialize JSON: {e}")),
            }
        }
    }

    let _ = io::stdout().flush();
    exit_for_thresholds(cli, &values)
}

fn run_batch(cli: &Cli) -> ExitCode {
    if !cli.gt.is_dir() {
        return fail(&format!(
            "ground-truth path '{}' is not a directory",
            cli.gt.display()
        ));
    }
    if !cli.sr.is_dir() {
        return fail(&format!(
            "reconstructed path '{}' is not a directory",
            cli.sr.display()
        ));
    }

    let options = BatchOptions {
        crop_border: cli.crop_border,
        extensions: cli.extensions.iter().map(|e| e.to_lowercase()).collect(),
    };
    let report = match compute_metrics(&FileLoader, &cli.gt, &cli.sr, &cli.metric.kinds(), &options)
    {
        Ok(report) => report,
        Err(e) => return fail(&e.to_string()),
    };

    match get_format(cli) {
        OutputFormat::Json => {
            if let Err(e) = output_batch_json(cli, &report) {
                return fail(&e);
            }
        }
        OutputFormat::Score => {
            for summary in report.metrics() {
                println!("{:.6}", summary.average);
            }
        }
        OutputFormat::Text => output_batch_text(cli, &report),
    }

    let _ = io::stdout().flush();

    // Threshold gating is per pair, not per average.
    let mut violated = false;
    for summary in report.metrics() {
        if let Some(min) = threshold_for(cli, summary.metric) {
            if summary.values.iter().any(|&(_, v)| v < min) {
                violated = true;
            }
        }
    }
    if violated {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}

fn output_batch_text(cli: &Cli, report: &BatchReport) {
    let n = report.pair_count();

    if !cli.no_details {
        for i in 0..n {
            let mut line = String::new();
            for summary in report.metrics() {
                let (id, value) = &summary.values[i];
                if line.is_empty() {
                    line = format!("[{i}/{n}] {id}");
                }
                line.push_str(&format!(
                    "  {}:{}",
                    summary.metric.name(),
                    format_value(summary.metric, *value)
                ));
            }
            println!("{line}");
        }
    }

    if !cli.no_summary {
        if !cli.no_details && n > 0 {
            println!();
        }
        for summary in report.metrics() {
            let label = display_name(summary.metric);
            let formatted = format_value(summary.metric, summary.average);
            let below = threshold_for(cli, summary.metric)
                .is_some_and(|min| summary.values.iter().any(|&(_, v)| v < min));
            if below {
                println!(
                    "Average {label}: {}  {}",
                    formatted,
                    "(pairs below minimum)".red().bold()
                );
            } else {
                println!("Average {label}: {}", formatted.bold());
            }
        }
    }
}

fn output_batch_json(cli: &Cli, report: &BatchReport) -> Result<(), String> {
    let n = report.pair_count();
    let mut pairs = Vec::with_capacity(n);
    for i in 0..n {
        let id = report.metrics()[0].values[i].0.clone();
        let values: Vec<(MetricKind, f64)> = report
            .metrics()
            .iter()
            .map(|s| (s.metric, s.values[i].1))
            .collect();
        pairs.push(json_pair(&id, &values));
    }

    let output = JsonOutput {
        ground_truth: cli.gt.display().to_string(),
        reconstructed: cli.sr.display().to_string(),
        crop_border: cli.crop_border,
        pairs,
        wspsnr_avg: report.get(MetricKind::WsPsnr).map(|s| s.average),
        wsssim_avg: report.get(MetricKind::WsSsim).map(|s| s.average),
    };
    let json =
        serde_json::to_string_pretty(&output).map_err(|e| format!("failed to serialize JSON: {e}"))?;
    println!("{json}");
    Ok(())
}

fn json_pair(id: &str, values: &[(MetricKind, f64)]) -> JsonPair {
    let mut pair = JsonPair {
        id: id.to_owned(),
        wspsnr: None,
        wsssim: None,
    };
    for &(kind, value) in values {
        match kind {
            MetricKind::WsPsnr => pair.wspsnr = Some(value),
            MetricKind::WsSsim => pair.wsssim = Some(value),
        }
    }
    pair
}

fn exit_for_thresholds(cli: &Cli, values: &[(MetricKind, f64)]) -> ExitCode {
    for &(kind, value) in values {
        if let Some(min) = threshold_for(cli, kind) {
            if value < min {
                return ExitCode::from(1);
            }
        }
    }
    ExitCode::SUCCESS
}

fn threshold_for(cli: &Cli, kind: MetricKind) -> Option<f64> {
    match kind {
        MetricKind::WsPsnr => cli.min_psnr,
        MetricKind::WsSsim => cli.min_ssim,
    }
}

fn display_name(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::WsPsnr => "WS-PSNR",
        MetricKind::WsSsim => "WS-SSIM",
    }
}

fn format_value(kind: MetricKind, value: f64) -> String {
    match kind {
        MetricKind::WsPsnr => format!("{value:.2}"),
        MetricKind::WsSsim => format!("{value:.4}"),
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("?")
        .to_owned()
}
