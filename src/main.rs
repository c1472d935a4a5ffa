//! glyphcast: PPM images and frame folders played on a grid of glyphs

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use glyphcast::display::TerminalHost;
use glyphcast::{utils, AsyncMediaLoader, Config, PlaybackOptions, Resolution, Screen};

#[derive(Parser)]
#[command(name = "glyphcast", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load one image or video folder and show it in the terminal
    Play(PlayArgs),
}

#[derive(Args)]
struct PlayArgs {
    /// Image file, or video folder with --video, relative to the media root
    reference: PathBuf,

    /// Treat REFERENCE as a folder with a timestamp index
    #[arg(long)]
    video: bool,

    /// Grid size as WIDTHxHEIGHT; frames are resampled to it
    #[arg(long, value_parser = utils::parse_resolution)]
    resolution: Option<Resolution>,

    #[arg(long)]
    speed: Option<f64>,

    #[arg(long = "loop")]
    looping: bool,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Media root directory
    #[arg(long)]
    root: Option<PathBuf>,

    /// Seconds to wait before issuing the load
    #[arg(long, default_value_t = 0.0)]
    delay: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("glyphcast=info")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Play(args) => play(args).await,
    }
}

async fn play(args: PlayArgs) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(root) = args.root {
        config.media.root = root;
    }
    if let Some(res) = args.resolution {
        config.screen.width = res.width;
        config.screen.height = res.height;
    }
    if let Some(speed) = args.speed {
        config.playback.speed = speed;
    }
    config.playback.looping |= args.looping;
    config.ensure_root();

    info!("glyphcast launching, media root {}", config.media.root.display());

    let mut host = TerminalHost::new(config.screen.width);
    let mut screen = Screen::new(&mut host, config.screen.clone());
    let mut loader = AsyncMediaLoader::new(&config);
    let options = PlaybackOptions::from(&config.playback);
    let target = Some(config.screen.resolution());

    let delay = Duration::try_from_secs_f64(args.delay)?;
    if !delay.is_zero() {
        info!("Waiting {:?} before loading", delay);
        tokio::time::sleep(delay).await;
    }

    let job = if args.video {
        loader.load_video_folder(&args.reference, target)
    } else {
        loader.load_image(&args.reference, target)
    };
    screen.load(&mut host, &mut loader, job, options);

    let mut out = io::stdout();
    write!(out, "\x1b[2J")?;

    let tick = Duration::from_millis(config.runtime.tick_ms.max(1));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            // Wake early when a frame timer is due before the next pump tick
            _ = tokio::time::sleep(host.until_next_timer().map_or(tick, |d| d.min(tick))) => {}
        }

        loader.pump();
        screen.update(&mut host, &loader);
        for timer in host.poll_timers() {
            screen.on_timer(&mut host, timer);
        }
        host.present(&mut out)?;

        if screen.is_idle() {
            break;
        }
    }

    let failure = loader
        .job(job)
        .and_then(|j| j.fatal_error())
        .map(ToString::to_string);

    screen.delete(&mut host, &mut loader);
    writeln!(out, "\x1b[0m")?;
    info!("glyphcast shutting down");

    match failure {
        Some(e) => Err(eyre!("{} failed: {}", args.reference.display(), e)),
        None => Ok(()),
    }
}
