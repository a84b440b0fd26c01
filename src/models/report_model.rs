//! models/report_model.rs
//! Filas del reporte y resumen de la corrida.

use serde::Serialize;

/// Valores exactos de la columna Status. Herramientas externas filtran por ellos.
pub const STATUS_SENT: &str = "Sent";
pub const STATUS_FAILED: &str = "Failed";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub phone: String,
    pub name: String,
    pub status: String, // "Sent" | "Failed"
    pub timestamp: String,
    pub final_message: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub sent: usize,
    pub failed: usize,
    /// Porcentaje redondeado a dos decimales; 0 si no hubo resultados.
    pub success_rate: f64,
}

impl RunSummary {
    pub fn from_counts(sent: usize, failed: usize) -> Self {
        let total = sent + failed;
        let success_rate = if total == 0 {
            0.0
        } else {
            round2(sent as f64 / total as f64 * 100.0)
        };
        RunSummary {
            total,
            sent,
            failed,
            success_rate,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
