//! `coverdisp` entry
//!
//! Starts the watcher on its own thread, then runs the image viewer on the main thread.
//! The program ends when the viewer does.

use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use crate::backends::Feh;
use crate::display;
use crate::watcher::{Settings, Watcher};

pub const MPD_HOST: &str = "localhost";
pub const MPD_PORT: u16 = 6600;
pub const MPD_TIMEOUT: Duration = Duration::from_secs(30);

const DEFAULT_MUSIC_DIR: &str = "/var/lib/mpd/music";
const DEFAULT_COVER: &str = "/tmp/cover.jpg";

pub static CFG: LazyLock<Config> = LazyLock::new(parse);

#[derive(Parser)]
#[command(
    version = "0.2.0",
    about = "Shows the cover of the album MPD is playing",
    after_help = "Example: coverdisp 800x800+50+140"
)]
struct Cli {
    #[arg(value_name = "GEOMETRY", help = "Window geometry passed to the viewer.")]
    geometry: Option<String>,

    #[arg(short = 'q', long = "quiet", help = "Do not announce album changes.")]
    quiet: bool,

    #[arg(short = 'v', long = "verbose", help = "Log debug messages.")]
    verbose: bool,

    #[arg(
        short = 'b',
        long = "binary",
        value_name = "PATH",
        help = "Path to the feh binary."
    )]
    binary: Option<String>,

    #[arg(
        short = 'm',
        long = "music-dir",
        value_name = "PATH",
        help = "MPD's music directory."
    )]
    music_dir: Option<PathBuf>,

    #[arg(
        short = 'c',
        long = "cover",
        value_name = "FILE",
        help = "Where the current cover is copied to."
    )]
    cover: Option<PathBuf>,

    #[arg(
        short = 'r',
        long = "reload",
        value_name = "DURATION",
        default_value = "500ms",
        value_parser = parse_duration,
        help = "How often the viewer reloads the cover."
    )]
    reload: Duration,

    #[arg(
        short = 'i',
        long = "interval",
        value_name = "DURATION",
        default_value = "100ms",
        value_parser = parse_duration,
        help = "How often MPD is polled."
    )]
    interval: Duration,
}

pub struct Config {
    pub geometry: Option<String>,
    pub quiet: bool,
    pub verbose: bool,
    pub binary: Option<String>,
    pub music_dir: PathBuf,
    pub cover: PathBuf,
    pub reload: Duration,
    pub interval: Duration,
}

fn parse_duration(input: &str) -> Result<Duration, String> {
    duration_str::parse(input).map_err(|err| err.to_string())
}

fn parse() -> Config {
    // `-h` counts as a usage error as well
    let parsed = Cli::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        std::process::exit(1);
    });
    Config {
        geometry: parsed.geometry,
        quiet: parsed.quiet,
        verbose: parsed.verbose,
        binary: parsed.binary,
        music_dir: parsed
            .music_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MUSIC_DIR)),
        cover: parsed.cover.unwrap_or_else(|| PathBuf::from(DEFAULT_COVER)),
        reload: parsed.reload,
        interval: parsed.interval,
    }
}

fn setup_logger(verbose: bool) -> Result<(), fern::InitError> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                message
            ));
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

/// Connects and polls until a fatal error. Runs on the watcher thread.
fn watch(settings: Settings) {
    match Watcher::connect(MPD_HOST, MPD_PORT, MPD_TIMEOUT, settings) {
        Ok(mut watcher) => watcher.run(),
        Err(err) => log::error!("could not establish connection with MPD: {err}"),
    }
}

/// The real start.
///
/// # Errors
/// Fatal errors that will cause the program to exit will be returned here.
pub fn start() -> Result<(), Box<dyn Error>> {
    setup_logger(CFG.verbose)?;
    display::ensure_placeholder(&CFG.cover)?;

    let settings = Settings {
        music_dir: CFG.music_dir.clone(),
        cover: CFG.cover.clone(),
        interval: CFG.interval,
        quiet: CFG.quiet,
    };
    // Never joined, it goes away with the process
    thread::Builder::new()
        .name("watcher".to_string())
        .spawn(move || watch(settings))?;

    let viewer = Feh::new(CFG.binary.clone(), CFG.geometry.clone(), CFG.reload);
    smol::block_on(display::run(&viewer, &CFG.cover))?;
    Ok(())
}
