//! services/result_aggregator.rs
//! Junta los resultados en memoria y al final escribe el reporte Excel.
//! No hay I/O por cada `add`: el disco se toca una sola vez, al exportar.

use std::fs;
use std::path::Path;

use chrono::Local;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use crate::errors::BroadcastError;
use crate::models::recipient_model::SendResult;
use crate::models::report_model::{ReportRow, RunSummary, STATUS_FAILED, STATUS_SENT};

pub const DETAIL_SHEET: &str = "Broadcast";
pub const SUMMARY_SHEET: &str = "Summary";
pub const DETAIL_HEADERS: [&str; 6] =
    ["phone", "name", "status", "timestamp", "final_message", "error"];

const SENT_FILL: u32 = 0xC6EFCE;
const SENT_FONT: u32 = 0x006100;
const FAILED_FILL: u32 = 0xFFC7CE;
const FAILED_FONT: u32 = 0x9C0006;

pub fn now_str() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    results: Vec<SendResult>,
    rows: Vec<ReportRow>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        ResultAggregator::default()
    }

    pub fn add(&mut self, result: SendResult) {
        self.add_with_timestamp(result, now_str());
    }

    pub fn add_with_timestamp(&mut self, result: SendResult, timestamp: String) {
        let status = if result.ok { STATUS_SENT } else { STATUS_FAILED };
        self.rows.push(ReportRow {
            phone: result.phone.clone(),
            name: result.name.clone(),
            status: status.to_string(),
            timestamp,
            final_message: result.final_message.clone(),
            error: result.error.clone().unwrap_or_default(),
        });
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[SendResult] {
        &self.results
    }

    pub fn summary(&self) -> RunSummary {
        let sent = self.results.iter().filter(|r| r.ok).count();
        RunSummary::from_counts(sent, self.results.len() - sent)
    }

    /// Escribe el libro con las hojas de detalle y de resumen.
    pub fn export_report(&self, path: &Path) -> Result<(), BroadcastError> {
        let report_err = |reason: String| BroadcastError::ReportWrite {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| report_err(e.to_string()))?;
        }

        let mut workbook = Workbook::new();
        self.write_detail_sheet(&mut workbook)
            .map_err(|e| report_err(e.to_string()))?;
        self.write_summary_sheet(&mut workbook)
            .map_err(|e| report_err(e.to_string()))?;
        workbook.save(path).map_err(|e| report_err(e.to_string()))?;

        log::info!(
            "(export_report) Reporte escrito en {:?} ({} filas)",
            path,
            self.rows.len()
        );
        Ok(())
    }

    fn write_detail_sheet(&self, workbook: &mut Workbook) -> Result<(), XlsxError> {
        let header_fmt = Format::new().set_bold();
        let sent_fmt = Format::new()
            .set_background_color(SENT_FILL)
            .set_font_color(SENT_FONT);
        let failed_fmt = Format::new()
            .set_background_color(FAILED_FILL)
            .set_font_color(FAILED_FONT);

        let ws = workbook.add_worksheet();
        ws.set_name(DETAIL_SHEET)?;

        for (col, header) in DETAIL_HEADERS.iter().enumerate() {
            ws.write_string_with_format(0, col as u16, *header, &header_fmt)?;
        }

        for (i, row) in self.rows.iter().enumerate() {
            let r = i as u32 + 1;
            let fmt = if row.status == STATUS_SENT {
                &sent_fmt
            } else {
                &failed_fmt
            };
            let cells = [
                &row.phone,
                &row.name,
                &row.status,
                &row.timestamp,
                &row.final_message,
                &row.error,
            ];
            for (col, value) in cells.iter().enumerate() {
                ws.write_string_with_format(r, col as u16, value.as_str(), fmt)?;
            }
        }

        for (col, header) in DETAIL_HEADERS.iter().enumerate() {
            let width = (header.len() + 2).clamp(12, 60);
            ws.set_column_width(col as u16, width as f64)?;
        }
        ws.set_column_width(4, 60)?;
        Ok(())
    }

    fn write_summary_sheet(&self, workbook: &mut Workbook) -> Result<(), XlsxError> {
        let summary = self.summary();
        let header_fmt = Format::new().set_bold();

        let ws = workbook.add_worksheet();
        ws.set_name(SUMMARY_SHEET)?;
        ws.write_string_with_format(0, 0, "Metric", &header_fmt)?;
        ws.write_string_with_format(0, 1, "Value", &header_fmt)?;

        let metrics = [
            ("Total", summary.total as f64),
            ("Sent", summary.sent as f64),
            ("Failed", summary.failed as f64),
            ("SuccessRate(%)", summary.success_rate),
        ];
        for (i, (label, value)) in metrics.iter().enumerate() {
            let r = i as u32 + 1;
            ws.write_string(r, 0, *label)?;
            ws.write_number(r, 1, *value)?;
        }

        ws.set_column_width(0, 20)?;
        ws.set_column_width(1, 18)?;
        Ok(())
    }
}
