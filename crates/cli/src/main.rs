//! GeoBIA CLI - zonal statistics for object-based image analysis

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use geobia_algorithms::statistics::{
    attribute_segments, zonal_statistics, SegmentStats, ZonalParams, ZonalStatistic,
};
use geobia_core::io::{read_geotiff, write_geotiff};
use geobia_core::Raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geobia")]
#[command(author, version, about = "Zonal statistics for object-based image analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Print the per-segment statistic table
    Stats {
        /// Value raster (e.g. a cloud-free composite)
        values: PathBuf,
        /// Segment label raster from the segmentation stage
        labels: PathBuf,
        /// Include missing observations in the accumulation
        #[arg(long)]
        keep_nodata: bool,
        /// Treat this value in the value raster as no-data (besides NaN)
        #[arg(long)]
        nodata: Option<f64>,
    },
    /// Attribute each pixel with its segment's statistic and write a GeoTIFF
    Zonal {
        /// Value raster (e.g. a cloud-free composite)
        values: PathBuf,
        /// Segment label raster from the segmentation stage
        labels: PathBuf,
        /// Output file
        output: PathBuf,
        /// Statistic: mean, std, min, max, range, sum, count
        #[arg(short, long, default_value = "mean")]
        statistic: String,
        /// Include missing observations in the accumulation
        #[arg(long)]
        keep_nodata: bool,
        /// Treat this value in the value raster as no-data (besides NaN)
        #[arg(long)]
        nodata: Option<f64>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_values(path: &PathBuf, nodata: Option<f64>) -> Result<Raster<f64>> {
    let pb = spinner("Reading value raster...");
    let mut raster: Raster<f64> = read_geotiff(path).context("Failed to read value raster")?;
    pb.finish_and_clear();
    if nodata.is_some() {
        raster.set_nodata(nodata);
    }
    info!("Values: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_labels(path: &PathBuf) -> Result<Raster<i32>> {
    let pb = spinner("Reading label raster...");
    let raster: Raster<i32> = read_geotiff(path).context("Failed to read label raster")?;
    pb.finish_and_clear();
    info!("Labels: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &PathBuf) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_statistic(s: &str) -> Result<ZonalStatistic> {
    match s.to_lowercase().as_str() {
        "mean" | "avg" => Ok(ZonalStatistic::Mean),
        "std" | "stddev" => Ok(ZonalStatistic::StdDev),
        "min" => Ok(ZonalStatistic::Min),
        "max" => Ok(ZonalStatistic::Max),
        "range" => Ok(ZonalStatistic::Range),
        "sum" => Ok(ZonalStatistic::Sum),
        "count" => Ok(ZonalStatistic::Count),
        _ => anyhow::bail!(
            "Unknown statistic: {}. Use mean, std, min, max, range, sum or count.",
            s
        ),
    }
}

fn print_table(table: &std::collections::HashMap<i32, SegmentStats>) {
    let mut rows: Vec<&SegmentStats> = table.values().collect();
    rows.sort_by_key(|s| s.label);

    println!(
        "{:>10} {:>10} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "label", "count", "mean", "std", "min", "max", "sum"
    );
    for s in rows {
        println!(
            "{:>10} {:>10} {:>14.4} {:>14.4} {:>14.4} {:>14.4} {:>14.4}",
            s.label,
            s.count,
            s.mean(),
            s.std_dev(),
            s.value(ZonalStatistic::Min),
            s.value(ZonalStatistic::Max),
            s.value(ZonalStatistic::Sum),
        );
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { input } => {
            let raster = read_values(&input, None)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let summary = raster.summary();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(srs) = raster.spatial_ref() {
                println!("Spatial ref: {}", srs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nSummary:");
            if let Some(min) = summary.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = summary.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = summary.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                summary.valid_count,
                100.0 * summary.valid_count as f64 / raster.len() as f64
            );
        }

        Commands::Stats {
            values,
            labels,
            keep_nodata,
            nodata,
        } => {
            let values = read_values(&values, nodata)?;
            let labels = read_labels(&labels)?;

            let start = Instant::now();
            let table = zonal_statistics(&values, &labels, !keep_nodata)
                .context("Failed to compute zonal statistics")?;
            let elapsed = start.elapsed();

            print_table(&table);
            println!("\n{} segments in {:.2?}", table.len(), elapsed);
        }

        Commands::Zonal {
            values,
            labels,
            output,
            statistic,
            keep_nodata,
            nodata,
        } => {
            let statistic = parse_statistic(&statistic)?;
            let values = read_values(&values, nodata)?;
            let labels = read_labels(&labels)?;

            let start = Instant::now();
            let result = attribute_segments(
                &values,
                &labels,
                ZonalParams {
                    statistic,
                    skip_nodata: !keep_nodata,
                },
            )
            .context("Failed to attribute segments")?;
            let elapsed = start.elapsed();

            write_result(&result, &output)?;
            done("Attributed raster", &output, elapsed);
        }
    }

    Ok(())
}
