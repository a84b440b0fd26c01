//! services/attempt_log.rs
//! Carpeta de salida por corrida y logs CSV append-only (uno de éxitos, uno de fallos).
//! Se escriben en cada intento: si el proceso muere a mitad, lo enviado queda registrado.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::models::recipient_model::SendResult;

const SENT_HEADERS: [&str; 4] = ["timestamp", "phone", "name", "message"];
const FAILED_HEADERS: [&str; 5] = ["timestamp", "phone", "name", "message", "error"];

/// Crea `<root>/<YYYY-MM-DD_HHMMSS>`; si ya existe agrega `_2`, `_3`, ...
pub fn make_run_output_dir(root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(root).with_context(|| format!("No se pudo crear {:?}", root))?;

    let stamp = Local::now().format("%Y-%m-%d_%H%M%S").to_string();
    let mut candidate = root.join(&stamp);
    let mut n = 2;
    while candidate.exists() {
        candidate = root.join(format!("{}_{}", stamp, n));
        n += 1;
    }
    fs::create_dir_all(&candidate)
        .with_context(|| format!("No se pudo crear la carpeta de salida {:?}", candidate))?;
    Ok(candidate)
}

#[derive(Debug, Clone)]
pub struct AttemptLog {
    sent_path: PathBuf,
    failed_path: PathBuf,
}

impl AttemptLog {
    pub fn new(sent_path: PathBuf, failed_path: PathBuf) -> Self {
        AttemptLog {
            sent_path,
            failed_path,
        }
    }

    pub fn sent_path(&self) -> &Path {
        &self.sent_path
    }

    pub fn failed_path(&self) -> &Path {
        &self.failed_path
    }

    pub fn append(&self, result: &SendResult, timestamp: &str) -> Result<()> {
        if result.ok {
            append_row(
                &self.sent_path,
                &SENT_HEADERS,
                &[
                    timestamp,
                    result.phone.as_str(),
                    result.name.as_str(),
                    result.final_message.as_str(),
                ],
            )
        } else {
            append_row(
                &self.failed_path,
                &FAILED_HEADERS,
                &[
                    timestamp,
                    result.phone.as_str(),
                    result.name.as_str(),
                    result.final_message.as_str(),
                    result.error.as_deref().unwrap_or(""),
                ],
            )
        }
    }
}

fn append_row(path: &Path, headers: &[&str], fields: &[&str]) -> Result<()> {
    let header_needed = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("No se pudo abrir el log {:?}", path))?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if header_needed {
        writer.write_record(headers)?;
    }
    writer.write_record(fields)?;
    writer.flush().with_context(|| format!("No se pudo escribir el log {:?}", path))?;
    Ok(())
}
