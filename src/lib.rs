//! # peg_this Library
//!
//! Front end per ffmpeg/ffprobe: ispeziona, converte, taglia, ritaglia ed
//! estrae stream da file media locali.
//!
//! ## Responsabilità:
//! - Costruisce invocazioni ffmpeg/ffprobe come liste di argomenti (mai shell)
//! - Esegue i processi figli e ne legge l'output riga per riga
//! - Deriva la percentuale di avanzamento dall'output testuale di ffmpeg
//! - Traduce il JSON di ffprobe in un modello tipizzato (`MediaProbe`)
//!
//! ## Architettura dei moduli:
//! - `timecode`: parsing/formattazione `HH:MM:SS[.frac]`
//! - `operation`: catalogo delle operazioni e parametri
//! - `crop`: regione di crop e selettori
//! - `invocation`: builder delle invocazioni
//! - `runner`: esecuzione dei processi figli, interruzione con Ctrl-C
//! - `probe`: parser dell'output di ffprobe
//! - `engine`: sessione, batch, progress tracker, path di output
//! - `progress` / `json_output` / `report`: presentazione
//! - `config`, `error`, `tool_resolver`, `file_manager`, `utils`
//!
//! ## Utilizzo:
//! ```ignore
//! use peg_this::{Config, OperationRequest, ProcessRunner, Session, Toolchain};
//!
//! let config = Config::default();
//! let toolchain = Toolchain::resolve(&config)?;
//! let mut session = Session::new(config, toolchain, ProcessRunner::default());
//! let output = session.run(&OperationRequest::RemoveAudio, Path::new("clip.mp4")).await?;
//! ```

pub mod utils;

pub mod config;
pub mod crop;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod invocation;
pub mod json_output;
pub mod operation;
pub mod probe;
pub mod progress;
pub mod report;
pub mod runner;
pub mod timecode;
pub mod tool_resolver;

pub use config::Config;
pub use crop::{CornerSelection, CropRegion, CropSelector, FixedCrop, FrameInfo};
pub use engine::{BatchRunner, BatchSummary, Session};
pub use error::PegError;
pub use invocation::{Invocation, InvocationBuilder};
pub use operation::{
    AudioCodec, BatchFormat, ContainerFormat, Crf, GifParams, OperationRequest, QualityPreset,
};
pub use probe::MediaProbe;
pub use runner::{InterruptHandle, ProcessOutcome, ProcessRunner};
pub use timecode::TimeCode;
pub use tool_resolver::{ToolPathResolver, Toolchain};
