//! # JSON Output Module
//!
//! Output strutturato in JSON (una riga per evento) per l'uso da script o GUI esterne.
//!
//! ## Responsabilità:
//! - Emette su stdout un oggetto JSON per ogni evento di una operazione
//! - Il campo `type` identifica l'evento
//!
//! ## Tipi di messaggi:
//! - `start`: inizio di una operazione su un file
//! - `step_start` / `progress` / `step_complete`: singola invocazione di ffmpeg
//! - `probe`: metadati di un file (`inspect`)
//! - `batch_item`: esito di un file in una conversione batch
//! - `complete`: fine dell'operazione, con i file prodotti
//! - `error`: errore che ha interrotto l'operazione

use crate::error::PegError;
use crate::operation::OperationRequest;
use crate::probe::MediaProbe;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JsonMessage {
    /// Inizio di una operazione
    Start {
        input: PathBuf,
        request: OperationRequest,
    },

    /// Inizio di una invocazione
    StepStart {
        description: String,
        step: usize,
        total_steps: usize,
    },

    /// Avanzamento dell'invocazione corrente
    Progress {
        description: String,
        fraction: f64,
        percentage: f64,
    },

    /// Fine di una invocazione
    StepComplete {
        description: String,
        success: bool,
    },

    /// Metadati di un file
    Probe {
        path: PathBuf,
        probe: MediaProbe,
    },

    /// Esito di un file di una conversione batch
    BatchItem {
        path: PathBuf,
        index: usize,
        total: usize,
        output: Option<PathBuf>,
        error: Option<String>,
    },

    /// Operazione completata
    Complete {
        outputs: Vec<PathBuf>,
        failed: usize,
        duration_seconds: f64,
    },

    /// Errore
    Error {
        message: String,
        kind: String,
    },
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input: PathBuf, request: &OperationRequest) -> Self {
        Self::Start {
            input,
            request: request.clone(),
        }
    }

    pub fn step_start(description: &str, step: usize, total_steps: usize) -> Self {
        Self::StepStart {
            description: description.to_string(),
            step,
            total_steps,
        }
    }

    pub fn progress(description: &str, fraction: f64) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        Self::Progress {
            description: description.to_string(),
            fraction,
            percentage: (fraction * 1000.0).round() / 10.0,
        }
    }

    pub fn step_complete(description: &str, success: bool) -> Self {
        Self::StepComplete {
            description: description.to_string(),
            success,
        }
    }

    pub fn probe(path: PathBuf, probe: &MediaProbe) -> Self {
        Self::Probe {
            path,
            probe: probe.clone(),
        }
    }

    pub fn batch_item(
        path: PathBuf,
        index: usize,
        total: usize,
        result: &Result<PathBuf, PegError>,
    ) -> Self {
        let (output, error) = match result {
            Ok(output) => (Some(output.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self::BatchItem {
            path,
            index,
            total,
            output,
            error,
        }
    }

    pub fn complete(outputs: Vec<PathBuf>, failed: usize, duration_seconds: f64) -> Self {
        Self::Complete {
            outputs,
            failed,
            duration_seconds,
        }
    }

    pub fn error(error: &PegError) -> Self {
        Self::Error {
            message: error.to_string(),
            kind: error.kind().to_string(),
        }
    }
}
