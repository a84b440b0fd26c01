//! models/broadcast_model.rs
//! Requests/responses de la API de envío masivo.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::recipient_model::SendResult;
use crate::models::report_model::RunSummary;

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastRequest {
    /// Ruta local al .xlsx/.xls/.ods/.csv con los contactos.
    pub file_path: String,

    /// Plantilla de la corrida; si falta se usa la de configuración.
    pub template: Option<String>,

    /// Texto único que pisa el mensaje de cada fila.
    pub message_override: Option<String>,

    /// "safe" | "fast" | "turbo"
    pub speed_mode: Option<String>,

    /// Rango explícito entre envíos (segundos). Pisa el del modo.
    pub min_delay_secs: Option<f64>,
    pub max_delay_secs: Option<f64>,

    /// Omitir filas cuyo status ya es "sent".
    #[serde(default)]
    pub only_unsent: bool,

    /// Arranque programado (hora local).
    pub start_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastResponse {
    pub success: bool,
    pub operation_id: String,
    pub total: usize,
    pub message: String,
}

/// Estado en vivo de una corrida.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStateResponse {
    pub operation_id: String,
    pub status: String, // "pending", "running", "done", "cancelled", "failed"
    pub total: usize,
    pub processed: usize,
    pub summary: RunSummary,
    pub cancel_requested: bool,
    pub output_dir: Option<String>,
    pub report_error: Option<String>,
    pub recent_progress: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastResultsResponse {
    pub operation_id: String,
    pub results: Vec<SendResult>,
}
