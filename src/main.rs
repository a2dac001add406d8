//! # peg-this - Main Entry Point
//!
//! Punto di ingresso dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap` (un subcommand per operazione)
//! - Caricamento della configurazione (file JSON + override da CLI)
//! - Inizializzazione del logging con `tracing`, legato alla durata della sessione
//! - Verifica di ffmpeg/ffprobe: se mancano la sessione non parte
//! - Ctrl-C inoltrato al processo ffmpeg in esecuzione
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI
//! 2. Carica `config.json` e applica gli override
//! 3. Configura il logging (INFO o DEBUG a seconda del flag verbose, file opzionale)
//! 4. Risolve i tool, crea la `Session` ed esegue il subcommand
//!
//! ## Esempio di utilizzo:
//! ```bash
//! peg-this trim clip.mp4 --start 00:00:05 --end 00:01:30
//! peg-this batch --format gif --fps 10 --yes
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use peg_this::file_manager::FileManager;
use peg_this::json_output::JsonMessage;
use peg_this::report;
use peg_this::{
    AudioCodec, BatchFormat, BatchRunner, Config, ContainerFormat, CornerSelection, CropRegion,
    CropSelector, Crf, FixedCrop, InterruptHandle, OperationRequest, PegError, ProcessRunner,
    QualityPreset, Session, TimeCode, ToolPathResolver, Toolchain,
};

#[derive(Parser)]
#[command(name = "peg-this", version)]
#[command(about = "Inspect, convert, trim, crop and extract streams from media files with ffmpeg")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output progress and results as JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Configuration file (default: <config dir>/peg-this/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Path to the ffmpeg executable
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,

    /// Directory for produced files (default: next to the input)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Fail instead of overwriting existing output files
    #[arg(long, global = true)]
    no_overwrite: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show format and stream information
    Inspect { file: PathBuf },

    /// Change container without re-encoding
    Remux {
        file: PathBuf,
        /// mp4, mkv, mov, avi or webm
        #[arg(short, long)]
        format: ContainerFormat,
    },

    /// Re-encode video with x264 at a constant rate factor
    Compress {
        file: PathBuf,
        /// CRF 0-51, lower = better quality
        #[arg(long, conflicts_with = "preset")]
        crf: Option<Crf>,
        /// high (18), medium (23) or low (28)
        #[arg(long)]
        preset: Option<QualityPreset>,
    },

    /// Cut a time range without re-encoding
    Trim {
        file: PathBuf,
        /// Start time (HH:MM:SS[.frac])
        #[arg(long)]
        start: TimeCode,
        /// End time (HH:MM:SS[.frac])
        #[arg(long)]
        end: TimeCode,
    },

    /// Save the audio track to its own file
    ExtractAudio {
        file: PathBuf,
        /// mp3, flac or wav
        #[arg(long, default_value = "mp3")]
        codec: AudioCodec,
    },

    /// Drop the audio track, copying video as is
    RemoveAudio { file: PathBuf },

    /// Convert to an animated GIF (two-pass palette)
    Gif {
        file: PathBuf,
        #[arg(long)]
        fps: Option<u32>,
        /// Width in pixels, height keeps the aspect ratio
        #[arg(long)]
        width: Option<u32>,
    },

    /// Crop the video to a rectangle
    Crop {
        file: PathBuf,
        /// WIDTHxHEIGHT+X+Y
        #[arg(long, conflicts_with = "corners", required_unless_present = "corners")]
        region: Option<CropRegion>,
        /// Two opposite corners: X1,Y1,X2,Y2
        #[arg(long)]
        corners: Option<CornerSelection>,
    },

    /// Convert every video in a directory
    Batch {
        /// mp4, mkv, mov, avi, webm or gif
        #[arg(short, long)]
        format: BatchFormat,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List media files in a directory
    List {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Report where ffmpeg and ffprobe were found
    Tools,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli).await?;
    // Subscriber lives as long as the session; every task runs on this thread.
    let _log_guard = init_logging(&config, cli.verbose)?;
    debug!("Configuration: {:?}", config);

    match &cli.command {
        Command::Tools => {
            print!("{}", ToolPathResolver::new().get_tools_report());
            return Ok(());
        }
        Command::List { dir } => return list_media(dir).await,
        _ => {}
    }

    let json = config.json_output;
    let toolchain = match Toolchain::resolve(&config) {
        Ok(toolchain) => toolchain,
        Err(e) => return Err(fail(e, json)),
    };
    info!("Using ffmpeg at {}", toolchain.ffmpeg.display());

    let interrupt = InterruptHandle::new();
    let _ctrl_c = interrupt.listen_for_ctrl_c();
    let mut session = Session::new(config, toolchain, ProcessRunner::new(interrupt));

    match execute(&mut session, cli.command).await {
        Ok(()) => Ok(()),
        Err(PegError::Interrupted) => {
            if json {
                JsonMessage::error(&PegError::Interrupted).emit();
            }
            eprintln!("Operation cancelled by user.");
            std::process::exit(130);
        }
        Err(e) => Err(fail(e, json)),
    }
}

/// Report a terminal error in the active output mode.
fn fail(e: PegError, json: bool) -> anyhow::Error {
    error!("{}", e);
    if json {
        JsonMessage::error(&e).emit();
    }
    e.into()
}

async fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.clone().or_else(Config::default_path);
    let mut config = match path {
        Some(ref path) => Config::from_file(path)
            .await
            .with_context(|| format!("Invalid configuration file {}", path.display()))?,
        None => Config::default(),
    };

    if cli.json {
        config.json_output = true;
    }
    if cli.no_overwrite {
        config.overwrite = false;
    }
    if let Some(ref dir) = cli.output_dir {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
        config.output_dir = Some(dir.clone());
    }
    if cli.ffmpeg.is_some() {
        config.ffmpeg_path = cli.ffmpeg.clone();
    }
    if cli.ffprobe.is_some() {
        config.ffprobe_path = cli.ffprobe.clone();
    }
    if cli.log_file.is_some() {
        config.log_file = cli.log_file.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &Config, verbose: bool) -> Result<tracing::dispatcher::DefaultGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let dispatch = match config.log_file {
        Some(ref path) => {
            let file = File::create(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            tracing::Dispatch::new(
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .finish(),
            )
        }
        None => tracing::Dispatch::new(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish(),
        ),
    };

    Ok(tracing::dispatcher::set_default(&dispatch))
}

async fn list_media(dir: &Path) -> Result<()> {
    let files = FileManager::find_media_files(dir)?;
    let mut sized = Vec::with_capacity(files.len());
    for file in files {
        let size = FileManager::get_file_size(&file).await.unwrap_or(0);
        sized.push((file, size));
    }
    print!("{}", report::render_media_list(&sized));
    Ok(())
}

async fn execute(session: &mut Session, command: Command) -> Result<(), PegError> {
    let json = session.config().json_output;

    let (request, file) = match command {
        Command::Inspect { file } => {
            let probe = session.inspect(&file).await?;
            if json {
                JsonMessage::probe(file, &probe).emit();
            } else {
                print!("{}", report::render_probe(&file, &probe));
            }
            return Ok(());
        }
        Command::Crop { file, region, corners } => {
            let mut selector: Box<dyn CropSelector> = match (region, corners) {
                (Some(region), _) => Box::new(FixedCrop(region)),
                (None, Some(corners)) => Box::new(corners),
                (None, None) => {
                    return Err(PegError::FormatError(
                        "--region or --corners is required".to_string(),
                    ))
                }
            };
            let started = Instant::now();
            let output = session.crop(&file, selector.as_mut()).await?;
            finish(json, output.into_iter().collect(), 0, started);
            return Ok(());
        }
        Command::Batch { format, fps, width, dir, yes } => {
            let gif = match format {
                BatchFormat::Gif => Some(session.config().gif_params(fps, width)?),
                BatchFormat::Container(_) => None,
            };
            return batch(session, OperationRequest::batch(format, gif), &dir, yes).await;
        }
        Command::Remux { file, format } => (OperationRequest::ConvertLossless { format }, file),
        Command::Compress { file, crf, preset } => {
            let crf = match (crf, preset) {
                (Some(crf), _) => crf,
                (None, Some(preset)) => preset.crf(),
                (None, None) => Crf::new(session.config().default_crf)?,
            };
            (OperationRequest::ConvertLossy { crf }, file)
        }
        Command::Trim { file, start, end } => (OperationRequest::trim(start, end)?, file),
        Command::ExtractAudio { file, codec } => (OperationRequest::ExtractAudio { codec }, file),
        Command::RemoveAudio { file } => (OperationRequest::RemoveAudio, file),
        Command::Gif { file, fps, width } => {
            let params = session.config().gif_params(fps, width)?;
            (OperationRequest::ToGif { params }, file)
        }
        Command::List { .. } | Command::Tools => return Ok(()),
    };

    if json {
        JsonMessage::start(file.clone(), &request).emit();
    }
    let started = Instant::now();
    let output = session.run(&request, &file).await?;
    finish(json, output.into_iter().collect(), 0, started);
    Ok(())
}

async fn batch(
    session: &mut Session,
    request: OperationRequest,
    dir: &Path,
    yes: bool,
) -> Result<(), PegError> {
    let json = session.config().json_output;
    let files =
        FileManager::find_batch_videos(dir).map_err(|e| PegError::Validation(e.to_string()))?;
    if files.is_empty() {
        println!("No video files found in {}.", dir.display());
        return Ok(());
    }

    if !yes && !confirm(&request, files.len()).await? {
        println!("Batch conversion cancelled.");
        return Ok(());
    }

    if json {
        JsonMessage::start(dir.to_path_buf(), &request).emit();
    }
    let started = Instant::now();
    let summary = BatchRunner::new(session).run(&request, &files).await?;
    if json {
        finish(json, summary.outputs(), summary.failed_count(), started);
    } else {
        print!("{}", report::render_batch(&summary));
    }
    Ok(())
}

async fn confirm(request: &OperationRequest, count: usize) -> Result<bool, PegError> {
    let target = match request {
        OperationRequest::BatchConvert { format, .. } => format.to_string(),
        other => other.kind().to_string(),
    };
    eprint!("Convert {} files to {}? [y/N] ", count, target);

    let mut answer = String::new();
    tokio::io::BufReader::new(tokio::io::stdin()).read_line(&mut answer).await?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn finish(json: bool, outputs: Vec<PathBuf>, failed: usize, started: Instant) {
    if json {
        JsonMessage::complete(outputs, failed, started.elapsed().as_secs_f64()).emit();
        return;
    }
    if outputs.is_empty() {
        println!("Nothing to do.");
    }
    for output in outputs {
        println!("Saved {}", output.display());
    }
}
