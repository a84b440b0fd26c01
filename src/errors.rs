//! errors.rs
//! Taxonomía de errores del envío masivo.
//!
//! `BroadcastError` agrupa los errores que abortan (o afectan) una corrida completa.
//! `SendFailure` describe por qué falló UN destinatario; nunca aborta el bucle.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Archivo ilegible o sin la columna obligatoria. Fatal, antes de empezar.
    #[error("input validation error: {0}")]
    InputValidation(String),

    /// La sesión automatizada nunca quedó lista.
    #[error("session could not start: {0}")]
    SessionStart(String),

    /// No se pudo escribir el reporte. Los resultados en memoria se conservan.
    #[error("report could not be written to {path:?}: {reason}")]
    ReportWrite { path: PathBuf, reason: String },
}

/// Motivo de fallo de un intento individual.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFailure {
    #[error("chat did not load (timeout after {0}s)")]
    ChatLoadTimeout(u64),

    #[error("send control not found")]
    SendControlNotFound,

    #[error("invalid or non-user number")]
    InvalidNumber,

    #[error("unexpected automation error: {0}")]
    Automation(String),
}

impl SendFailure {
    /// Etiqueta corta y estable, útil para filtrar en reportes.
    pub fn kind(&self) -> &'static str {
        match self {
            SendFailure::ChatLoadTimeout(_) => "chat_load_timeout",
            SendFailure::SendControlNotFound => "send_control_not_found",
            SendFailure::InvalidNumber => "invalid_number",
            SendFailure::Automation(_) => "automation_error",
        }
    }
}
