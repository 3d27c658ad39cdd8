use anyhow::{Context, Result};
use clap::Parser;
use serde_derive::Serialize;
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
};
use tracing_subscriber::EnvFilter;

use speedtrack::frame::read_frames;
use speedtrack::timing::SpeedEvent;
use speedtrack::v2v::Broadcast;
use speedtrack::{Config, Direction, SpeedPipeline, Track};

/// Replays per-frame vehicle detections (JSON lines) through the tracker,
/// the dual-line speed timer and the V2V simulation.
#[derive(Parser, Debug)]
#[command(name = "speedtrack", about = "Vehicle speed estimation from detection logs")]
struct Args {
    /// JSON-lines frame file; reads stdin when omitted
    #[arg(long, value_name = "PATH")]
    input: Option<PathBuf>,
    /// YAML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Centroid matching distance in pixels
    #[arg(long)]
    threshold: Option<f32>,
    /// Frames a track may go unmatched before it is dropped
    #[arg(long)]
    max_missed: Option<u32>,
    #[arg(long)]
    line_a: Option<f32>,
    #[arg(long)]
    line_b: Option<f32>,
    /// Tolerance band around each line, in pixels
    #[arg(long)]
    offset: Option<f32>,
    /// Distance between the lines, in meters
    #[arg(long)]
    distance: Option<f64>,
    /// Also emit every frame's tracks
    #[arg(long)]
    tracks: bool,
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Output<'a> {
    Tracks { timestamp: f64, tracks: &'a [Track] },
    Speed(&'a SpeedEvent),
    Broadcast(&'a Broadcast),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();
    run(args)
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(v) = args.threshold {
        config.tracker.distance_threshold = v;
    }
    if let Some(v) = args.max_missed {
        config.tracker.max_missed_frames = v;
    }
    if let Some(v) = args.line_a {
        config.timing.line_a_y = v;
    }
    if let Some(v) = args.line_b {
        config.timing.line_b_y = v;
    }
    if let Some(v) = args.offset {
        config.timing.offset = v;
    }
    if let Some(v) = args.distance {
        config.timing.distance_m = v;
    }

    config.validate().context("Invalid configuration")?;

    Ok(config)
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    tracing::info!(?config, "starting");

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut pipeline = SpeedPipeline::new(config);
    let mut frames = 0usize;

    for (line, frame) in read_frames(reader).enumerate() {
        let frame = frame.with_context(|| format!("Bad frame on line {}", line + 1))?;
        let report = pipeline.process(&frame);
        frames += 1;

        if args.tracks {
            write_line(
                &mut out,
                &Output::Tracks {
                    timestamp: report.timestamp,
                    tracks: &report.tracks,
                },
            )?;
        }

        for event in &report.events {
            write_line(&mut out, &Output::Speed(event))?;
        }

        for broadcast in &report.broadcasts {
            write_line(&mut out, &Output::Broadcast(broadcast))?;
        }
    }

    out.flush()?;

    let timer = pipeline.timer();
    tracing::info!(
        frames,
        going_down = timer.count(Direction::Down),
        going_up = timer.count(Direction::Up),
        "done"
    );

    Ok(())
}

fn write_line<W: Write>(out: &mut W, output: &Output<'_>) -> Result<()> {
    serde_json::to_writer(&mut *out, output)?;
    out.write_all(b"\n")?;
    Ok(())
}
