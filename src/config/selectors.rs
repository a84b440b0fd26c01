//! config/selectors.rs
//! Marcadores DOM del cliente web. Cambian con cada versión del cliente,
//! por eso viven como datos y no dentro del motor.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebClientSelectors {
    /// Caja de búsqueda del panel lateral: sesión autenticada.
    pub search_box: String,
    /// Canvas del código de login: autenticación pendiente.
    pub login_canvas: String,
    /// Caja de redacción (contenteditable) del chat abierto.
    pub compose_box: String,
    /// Botón "enviar" actual, en sus variantes (incluye aria-labels traducidos).
    pub send_buttons: Vec<String>,
    /// Ícono "enviar" de versiones anteriores.
    pub legacy_send_icon: String,
    /// Textos del aviso "número inválido / no es usuario".
    pub invalid_number_texts: Vec<String>,
}

impl Default for WebClientSelectors {
    fn default() -> Self {
        WebClientSelectors {
            search_box: r#"#side div[role="textbox"]"#.to_string(),
            login_canvas: "canvas".to_string(),
            compose_box: r#"#main footer [contenteditable="true"]"#.to_string(),
            send_buttons: vec![
                r#"button[aria-label="Send"]"#.to_string(),
                r#"button[aria-label="Gönder"]"#.to_string(),
                r#"button[aria-label="Enviar"]"#.to_string(),
                r#"[data-testid="compose-btn-send"]"#.to_string(),
                r#"span[data-icon="wds-ic-send-filled"]"#.to_string(),
            ],
            legacy_send_icon: r#"span[data-icon="send"]"#.to_string(),
            invalid_number_texts: vec![
                "telefon numarası geçersiz".to_string(),
                "WhatsApp kullanıcısı değil".to_string(),
                "Phone number shared via url is invalid".to_string(),
                "is not on WhatsApp".to_string(),
                "no es válido".to_string(),
            ],
        }
    }
}
