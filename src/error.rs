//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `PegError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori fatali (tool mancanti) da errori recuperabili (input utente)
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `InvocationFailure`: ffmpeg/ffprobe terminato con exit code non zero
//! - `ParseFailure`: JSON di ffprobe malformato o schema inatteso
//! - `FormatError`: time-code o parametro numerico non valido
//! - `MissingTool`: ffmpeg/ffprobe non trovato all'avvio
//! - `Interrupted`: operazione interrotta dall'operatore (Ctrl-C)
//! - `Validation`: parametri incoerenti (es. regione di crop fuori dal frame)
//! - `Io`: errori di I/O (spawn del processo, file non trovati, permessi)
//!
//! ## Esempio:
//! ```ignore
//! if resolver.resolve_tool("ffmpeg").is_none() {
//!     return Err(PegError::MissingTool("ffmpeg".to_string()));
//! }
//! ```

/// Custom error types for media operations
#[derive(thiserror::Error, Debug)]
pub enum PegError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{description} failed (exit code {}): {stderr}", exit_code_text(.exit_code))]
    InvocationFailure {
        description: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Could not parse probe output: {0}")]
    ParseFailure(String),

    #[error("Invalid value: {0}")]
    FormatError(String),

    #[error("Required tool not found: {0}")]
    MissingTool(String),

    #[error("Operation cancelled by user")]
    Interrupted,

    #[error("Validation error: {0}")]
    Validation(String),
}

fn exit_code_text(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

impl PegError {
    /// Errors after which the session cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PegError::MissingTool(_) | PegError::Interrupted)
    }

    /// Stable snake_case name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            PegError::Io(_) => "io",
            PegError::InvocationFailure { .. } => "invocation_failure",
            PegError::ParseFailure(_) => "parse_failure",
            PegError::FormatError(_) => "format_error",
            PegError::MissingTool(_) => "missing_tool",
            PegError::Interrupted => "interrupted",
            PegError::Validation(_) => "validation",
        }
    }
}

impl From<serde_json::Error> for PegError {
    fn from(err: serde_json::Error) -> Self {
        PegError::ParseFailure(err.to_string())
    }
}
