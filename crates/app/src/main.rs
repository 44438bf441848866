use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use lanebeat_core::{
    AudioAssetStore, AudioClip, Autoplay, Beatmap, GameConfig, LanebeatError, NullPresentation,
    Session, SimulatedDevice,
};
use tracing_subscriber::EnvFilter;

/// Frames simulated past the end of the clip before giving up.
const OVERRUN_FRAMES: u64 = 600;

fn main() -> lanebeat_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { beatmap } => run_validate(&beatmap),
        Commands::Simulate {
            beatmap,
            config,
            jitter,
            fps,
            length,
            json,
        } => run_simulate(&beatmap, config.as_deref(), jitter, fps, length, json),
    }
}

fn run_validate(path: &Path) -> lanebeat_core::Result<()> {
    let beatmap = Beatmap::load(path)?;
    let holds = beatmap.notes().iter().filter(|note| note.is_hold()).count();
    tracing::info!(
        song = %beatmap.song_id,
        bpm = beatmap.bpm,
        lanes = beatmap.lanes,
        notes = beatmap.notes().len(),
        holds,
        duration = beatmap.duration(),
        "beatmap is valid"
    );
    Ok(())
}

fn run_simulate(
    beatmap_path: &Path,
    config_path: Option<&Path>,
    jitter: f64,
    fps: u32,
    length: Option<f64>,
    json: bool,
) -> lanebeat_core::Result<()> {
    tracing::info!(?beatmap_path, ?config_path, jitter, fps, "running headless simulation");

    if fps == 0 {
        return Err(LanebeatError::msg("--fps must be at least 1"));
    }
    let beatmap = Beatmap::load(beatmap_path)?;
    let config = match config_path {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::with_lanes(beatmap.lanes),
    };

    let device = SimulatedDevice::new(config.audio.sample_rate);
    let mut assets = AudioAssetStore::new();
    assets.register(AudioClip::new(
        beatmap.audio_file.clone(),
        length.unwrap_or_else(|| beatmap.duration() + 2.0),
        config.audio.sample_rate,
    ));

    let mut autoplay = Autoplay::from_beatmap(&beatmap, jitter);
    let mut session =
        Session::from_assets(config, beatmap, &assets, device.clone(), NullPresentation)?;
    session.start()?;

    let frame_seconds = 1.0 / f64::from(fps);
    let clip_frames = (session.clip().length_seconds * f64::from(fps)).ceil() as u64;
    let max_frames = clip_frames + OVERRUN_FRAMES;
    let mut judged = 0usize;
    for _ in 0..max_frames {
        device.advance_seconds(frame_seconds);
        let inputs = autoplay.due(session.song_time());
        let report = session.tick(&inputs);
        judged += report.judgements.len();
        if report.ended.is_some() {
            break;
        }
    }
    if !session.is_ended() {
        session.stop();
    }

    let summary = session.scoreboard().summary();
    tracing::info!(
        reason = ?session.end_reason(),
        judged,
        score = summary.score,
        accuracy = summary.accuracy,
        "simulation finished"
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "score {}  max combo {}  accuracy {:.2}%  \
             (excellent {} / great {} / good {} / miss {})",
            summary.score,
            summary.max_combo,
            summary.accuracy * 100.0,
            summary.counts.excellent,
            summary.counts.great,
            summary.counts.good,
            summary.counts.miss,
        );
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Rhythm game timing and judgement runtime", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse and validate a beatmap file.
    Validate {
        /// Path to the beatmap JSON document.
        beatmap: PathBuf,
    },
    /// Play a beatmap headlessly with scripted input and report the score.
    Simulate {
        /// Path to the beatmap JSON document.
        beatmap: PathBuf,
        /// Optional game configuration file; defaults match the beatmap's lane count.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seconds each scripted press lands off its onset.
        #[arg(long, default_value_t = 0.0)]
        jitter: f64,
        /// Simulation ticks per second.
        #[arg(long, default_value_t = 240)]
        fps: u32,
        /// Audio clip length in seconds; defaults to the last note plus two seconds.
        #[arg(long)]
        length: Option<f64>,
        /// Print the final score as JSON.
        #[arg(long)]
        json: bool,
    },
}
