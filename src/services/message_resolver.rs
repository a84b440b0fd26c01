//! services/message_resolver.rs
//! Decide el texto literal que recibe cada destinatario.

use crate::models::recipient_model::Recipient;

/// Único placeholder reconocido.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Prioridad: override de la corrida > mensaje de la fila > plantilla.
/// Se reemplaza `{name}` por el nombre (vacío si no hay) y se recorta el resultado.
pub fn resolve(recipient: &Recipient, template: &str, ui_override: Option<&str>) -> String {
    let source = match ui_override {
        Some(o) if !o.trim().is_empty() => o,
        _ if !recipient.message.trim().is_empty() => recipient.message.as_str(),
        _ => template,
    };

    source
        .replace(NAME_PLACEHOLDER, &recipient.name)
        .trim()
        .to_string()
}
