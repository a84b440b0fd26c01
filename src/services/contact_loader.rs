//! services/contact_loader.rs
//! Lee la lista de contactos (xlsx/xls/ods/csv) y la convierte en `Recipient`s.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::errors::BroadcastError;
use crate::models::recipient_model::Recipient;

const PHONE_COLUMN: &str = "phone";
const NAME_COLUMN: &str = "name";
const MESSAGE_COLUMN: &str = "message";
const STATUS_COLUMN: &str = "status";

/// Tabla cruda: nombre de hoja (si aplica) y filas con su línea visual (1-based).
struct RawTable {
    sheet_name: Option<String>,
    rows: Vec<(usize, Vec<String>)>,
}

#[derive(Debug, Clone)]
pub struct ContactLoader {
    country_prefix: String,
}

impl ContactLoader {
    pub fn new(country_prefix: impl Into<String>) -> Self {
        ContactLoader {
            country_prefix: country_prefix.into(),
        }
    }

    /// Carga los destinatarios en el orden del archivo. Solo se lee la primera hoja.
    /// Filas sin teléfono utilizable se descartan en silencio.
    pub fn load(&self, path: &Path) -> Result<Vec<Recipient>, BroadcastError> {
        let table = read_table(path)?;

        let mut rows = table.rows.into_iter();
        let (_, header) = rows.next().ok_or_else(|| {
            BroadcastError::InputValidation(format!("{:?} está vacío", path))
        })?;

        let phone_idx = column_index(&header, PHONE_COLUMN).ok_or_else(|| {
            BroadcastError::InputValidation(format!(
                "missing required column: {}",
                PHONE_COLUMN
            ))
        })?;
        let name_idx = column_index(&header, NAME_COLUMN);
        let message_idx = column_index(&header, MESSAGE_COLUMN);
        let status_idx = column_index(&header, STATUS_COLUMN);

        let source_path = path.to_string_lossy().to_string();
        let mut recipients = Vec::new();
        let mut dropped = 0usize;

        for (line, row) in rows {
            let raw_phone = cell(&row, Some(phone_idx));
            let phone = match self.normalize_phone(&raw_phone) {
                Some(p) => p,
                None => {
                    dropped += 1;
                    continue;
                }
            };

            recipients.push(Recipient {
                phone,
                name: cell(&row, name_idx),
                message: cell(&row, message_idx),
                row_index: Some(line),
                sheet_name: table.sheet_name.clone(),
                source_path: Some(source_path.clone()),
                input_status: status_idx.map(|i| cell(&row, Some(i))),
            });
        }

        log::info!(
            "(load) {} contactos cargados desde {:?} ({} filas descartadas sin teléfono)",
            recipients.len(),
            path,
            dropped
        );
        Ok(recipients)
    }

    /// Deja solo dígitos y antepone el prefijo de país si falta.
    /// `None` si no queda ningún dígito.
    pub fn normalize_phone(&self, raw: &str) -> Option<String> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            return None;
        }
        if self.country_prefix.is_empty() || digits.starts_with(&self.country_prefix) {
            Some(digits)
        } else {
            Some(format!("{}{}", self.country_prefix, digits))
        }
    }
}

/// Solo deja pasar destinatarios cuyo status previo no sea "sent".
pub fn skip_already_sent(recipient: &Recipient) -> bool {
    match &recipient.input_status {
        None => true,
        Some(s) => !s.trim().eq_ignore_ascii_case("sent"),
    }
}

fn column_index(header: &[String], wanted: &str) -> Option<usize> {
    header
        .iter()
        .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(wanted))
}

fn cell(row: &[String], idx: Option<usize>) -> String {
    idx.and_then(|i| row.get(i))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn read_table(path: &Path) -> Result<RawTable, BroadcastError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "csv" | "txt" => read_csv(path),
        _ => read_workbook(path),
    }
}

fn read_csv(path: &Path) -> Result<RawTable, BroadcastError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| BroadcastError::InputValidation(format!("No se pudo leer {:?}: {}", path, e)))?;

    // El lector saltea líneas vacías y un campo entre comillas puede ocupar varias
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| {
            BroadcastError::InputValidation(format!("CSV inválido en {:?}: {}", path, e))
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(rows.len() + 1);
        rows.push((line, record.iter().map(|f| f.to_string()).collect()));
    }

    Ok(RawTable {
        sheet_name: None,
        rows,
    })
}

fn read_workbook(path: &Path) -> Result<RawTable, BroadcastError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        BroadcastError::InputValidation(format!("No se pudo abrir {:?}: {}", path, e))
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| BroadcastError::InputValidation(format!("{:?} no tiene hojas", path)))?;

    let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
        BroadcastError::InputValidation(format!("No se pudo leer la hoja '{}': {}", sheet_name, e))
    })?;

    // El rango empieza en la primera celda con datos, no necesariamente en A1.
    let header_row = range.start().map(|(r, _)| r as usize + 1).unwrap_or(1);
    let rows = range
        .rows()
        .enumerate()
        .map(|(idx, r)| (header_row + idx, r.iter().map(data_to_string).collect()))
        .collect();

    Ok(RawTable {
        sheet_name: Some(sheet_name),
        rows,
    })
}

fn data_to_string(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Teléfonos guardados como número: 5551112233.0 -> "5551112233"
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
