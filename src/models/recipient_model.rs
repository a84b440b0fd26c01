//! models/recipient_model.rs
//! Destinatarios (una fila del archivo de entrada) y resultados de envío.

use serde::{Deserialize, Serialize};

/// Un destinatario leído del archivo. Inmutable una vez creado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    /// Solo dígitos, con prefijo de país. Nunca vacío.
    pub phone: String,
    pub name: String,
    /// Texto propio de la fila; vacío = usar plantilla.
    pub message: String,

    // Procedencia (para rastrear hasta el archivo original)
    pub row_index: Option<usize>,
    pub sheet_name: Option<String>,
    pub source_path: Option<String>,

    /// Estado previo que traía el archivo (p.ej. "Sent"). El núcleo no lo interpreta.
    pub input_status: Option<String>,
}

impl Recipient {
    #[allow(dead_code)]
    #[cfg(test)]
    pub fn test_new(phone: &str, name: &str, message: &str) -> Self {
        Self {
            phone: phone.to_string(),
            name: name.to_string(),
            message: message.to_string(),
            row_index: None,
            sheet_name: None,
            source_path: None,
            input_status: None,
        }
    }
}

/// Resultado de UN intento de envío.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub phone: String,
    pub name: String,
    pub ok: bool,
    /// `None` cuando `ok`.
    pub error: Option<String>,
    /// Texto exacto que se intentó enviar (ya personalizado).
    pub final_message: String,
    pub row_index: Option<usize>,
    pub sheet_name: Option<String>,
    pub source_path: Option<String>,
}

impl SendResult {
    pub fn from_attempt(recipient: &Recipient, final_message: String, error: Option<String>) -> Self {
        Self {
            phone: recipient.phone.clone(),
            name: recipient.name.clone(),
            ok: error.is_none(),
            error,
            final_message,
            row_index: recipient.row_index,
            sheet_name: recipient.sheet_name.clone(),
            source_path: recipient.source_path.clone(),
        }
    }
}
