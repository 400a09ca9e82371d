use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vecbatch::{Config, Pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "vecbatch",
    version,
    author,
    about = "Batch-convert vector files to GeoJSON with ogr2ogr",
    long_about = "Batch-convert geospatial vector files with ogr2ogr.\n\n\
    Every matching file under the source directory is converted into the \
    destination directory, which mirrors the source tree. Existing outputs \
    are skipped unless --overwrite is given. A timestamped log of every file \
    is written to the destination directory.\n\n\
    USAGE EXAMPLES:\n  \
      # Convert all shapefiles to WGS84 GeoJSON\n  \
      vecbatch ./shapes ./geojson\n\n  \
      # Keep source coordinates, newline-delimited output, 8 workers\n  \
      vecbatch ./shapes ./out --crs 0 --seq --parallel --workers 8\n\n  \
      # Use a GDAL install that is not on PATH\n  \
      vecbatch ./shapes ./out --tool-dir /opt/gdal/bin"
)]
struct Cli {
    /// Directory scanned for input files
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Directory the converted tree is written to (created if missing)
    #[arg(value_name = "DEST")]
    dest: PathBuf,

    /// Target EPSG code; 0 keeps the source coordinates
    #[arg(long, default_value_t = 4326, value_name = "EPSG")]
    crs: u32,

    /// Replace outputs that already exist
    #[arg(long)]
    overwrite: bool,

    /// Decimal places kept in GeoJSON coordinates
    #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(0..=15))]
    precision: u8,

    /// Write newline-delimited GeoJSON (.geojsonl)
    #[arg(long)]
    seq: bool,

    /// Also write a .gz copy of each output (ignored with --seq)
    #[arg(long)]
    gzip: bool,

    /// Convert several files at once
    #[arg(short, long)]
    parallel: bool,

    /// Worker count for --parallel; 0 uses half the CPUs (at least 2)
    #[arg(short, long, default_value_t = 0, value_parser = clap::value_parser!(u16).range(0..=256))]
    workers: u16,

    /// Directory containing the converter, searched before PATH
    #[arg(long, value_name = "DIR", env = "VECBATCH_TOOL_DIR")]
    tool_dir: Option<PathBuf>,

    /// Converter program name
    #[arg(long, default_value = "ogr2ogr", value_name = "PROGRAM")]
    converter: String,

    /// File name glob selecting inputs (can be used multiple times)
    #[arg(long = "pattern", value_name = "GLOB", default_value = "*.shp")]
    patterns: Vec<String>,

    /// Also write the run summary as JSON to this file
    #[arg(long, value_name = "FILE")]
    summary_json: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut builder = Config::builder()
        .source_dir(cli.source)
        .dest_dir(cli.dest)
        .target_crs(cli.crs)
        .overwrite(cli.overwrite)
        .precision(cli.precision)
        .sequence(cli.seq)
        .compress(cli.gzip)
        .parallel(cli.parallel)
        .max_workers(usize::from(cli.workers))
        .converter(cli.converter);

    if let Some(tool_dir) = cli.tool_dir {
        builder = builder.tool_dir(tool_dir);
    }

    for pattern in cli.patterns {
        builder = builder.pattern(pattern);
    }

    if let Some(path) = cli.summary_json {
        builder = builder.summary_json(path);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let summary = Pipeline::new(config)
        .context("Failed to prepare batch conversion")?
        .run()
        .context("Batch conversion failed")?;

    if summary.total > 0 {
        summary.print_summary();
    }

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("vecbatch=info"),
        1 => EnvFilter::new("vecbatch=debug"),
        _ => EnvFilter::new("vecbatch=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
