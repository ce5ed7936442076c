use anyhow::{Context, Result};
use blink_slm::*;
use clap::Parser;
use log::{info, LevelFilter};
use std::path::PathBuf;

/// Stream alternating phase images to a Meadowlark SLM through the Blink SDK
#[derive(Parser, Debug)]
#[command(name = "blink-slm", version, long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of A/B cycles
    #[arg(short = 'n', long)]
    cycles: Option<u32>,

    /// Override how frames are written
    #[arg(short, long, value_enum)]
    mode: Option<WriteMode>,

    /// Use a generated calibration frame and ramps instead of bitmap files
    #[arg(long)]
    generate_images: bool,

    #[arg(long, default_value_t = LevelFilter::Info)]
    log_level: LevelFilter,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Check configuration and images without loading the vendor library
    #[arg(long)]
    dry_run: bool,

    /// Print a configuration template and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.print_config {
        println!("{}", config::template());
        return Ok(());
    }

    logger::init(args.log_level, args.log_file.as_deref())?;

    let mut conf = Conf::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(cycles) = args.cycles {
        conf.sequence.cycles = cycles;
    }
    if let Some(mode) = args.mode {
        conf.sequence.mode = mode;
    }
    if args.generate_images {
        conf.sequence.images = ImageOrigin::Generated;
    }

    let params = conf.create_params();
    params.validate()?;
    let setup = conf.device_setup();
    let plan = conf.sequence_plan();
    let images = conf.load_images().context("failed to load phase images")?;

    if args.dry_run {
        info!("{params:?}");
        info!("{setup:?}");
        info!("{plan:?}");
        info!("Configuration and images OK, not touching the SLM");
        return Ok(());
    }

    let library = BlinkLibrary::open(&conf.sdk.library)?;
    info!("Loaded {}", library.path().display());

    let report = run(&library, &params, &setup, &plan, &images, &mut ThreadSleep)?;
    info!(
        "Wrote {} frames in {} cycles over {:.2} s, {:.1} frames/s ({} failed writes)",
        report.frames_written,
        report.cycles,
        report.elapsed.as_secs_f64(),
        report.mean_frame_rate,
        report.failed_writes
    );
    if let Some(period) = report.mean_cycle_period() {
        info!("Mean cycle period: {:.2} ms", period.as_secs_f64() * 1e3);
    }

    Ok(())
}
