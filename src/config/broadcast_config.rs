//! config/broadcast_config.rs
//! Estructura global de configuración, con valores por defecto
//! y sobreescritura desde variables de entorno (.env).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::selectors::WebClientSelectors;
use crate::config::speed_mode::SpeedMode;
use crate::services::pacing::MAX_DELAY_SECS;

/// Qué hacer si la sesión no queda lista dentro del timeout inicial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyTimeoutPolicy {
    /// La corrida se aborta (SessionStart).
    Abort,
    /// Se sigue e intenta enviar igual.
    Proceed,
}

impl FromStr for ReadyTimeoutPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(ReadyTimeoutPolicy::Abort),
            "proceed" => Ok(ReadyTimeoutPolicy::Proceed),
            other => Err(format!("Política desconocida: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastGlobalConfig {
    // ===== Navegador =====
    pub profile_dir: PathBuf,
    pub chrome_executable: Option<PathBuf>,
    pub headless: bool,
    pub home_url: String,
    /// Admite `{phone}` y `{text}`.
    pub deep_link_template: String,
    pub selectors: WebClientSelectors,

    // ===== Contactos y mensaje =====
    /// Prefijo de país que se antepone si el número no lo trae.
    pub country_prefix: String,
    pub template_message: String,

    // ===== Tiempos =====
    pub default_speed_mode: SpeedMode,
    pub min_delay_secs: Option<f64>,
    pub max_delay_secs: Option<f64>,
    pub ready_timeout_secs: u64,
    pub ready_timeout_policy: ReadyTimeoutPolicy,
    pub chat_load_timeout_secs: u64,
    pub poll_interval_ms: u64,

    // ===== Salida =====
    pub output_root: PathBuf,
    pub report_file_name: String,
    pub sent_log_name: String,
    pub failed_log_name: String,
    /// Corridas terminadas que se siguen consultando en memoria.
    pub retained_runs: usize,

    // ===== Servidor =====
    pub bind_host: String,
    pub bind_port: u16,
    pub database_path: PathBuf,
}

impl Default for BroadcastGlobalConfig {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        BroadcastGlobalConfig {
            profile_dir: home.join("whatsapp_profile"),
            chrome_executable: None,
            headless: false,
            home_url: "https://web.whatsapp.com".to_string(),
            deep_link_template: "https://web.whatsapp.com/send?phone={phone}&text={text}"
                .to_string(),
            selectors: WebClientSelectors::default(),
            country_prefix: "90".to_string(),
            template_message: "Merhaba {name}! Bu bir test mesajıdır.".to_string(),
            default_speed_mode: SpeedMode::Fast,
            min_delay_secs: None,
            max_delay_secs: None,
            ready_timeout_secs: 60,
            ready_timeout_policy: ReadyTimeoutPolicy::Abort,
            chat_load_timeout_secs: 20,
            poll_interval_ms: 500,
            output_root: documents_dir().join("WhatsAppBroadcastRuns"),
            report_file_name: "results.xlsx".to_string(),
            sent_log_name: "sent_log.csv".to_string(),
            failed_log_name: "failed_log.csv".to_string(),
            retained_runs: 20,
            bind_host: "0.0.0.0".to_string(),
            bind_port: 5022,
            database_path: PathBuf::from("data").join("operations.db"),
        }
    }
}

impl BroadcastGlobalConfig {
    /// Defaults + variables `BROADCAST_*` (llamar después de `dotenv()`).
    pub fn from_env() -> Self {
        let mut cfg = BroadcastGlobalConfig::default();

        if let Ok(v) = env::var("BROADCAST_PROFILE_DIR") {
            cfg.profile_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("BROADCAST_CHROME_PATH") {
            cfg.chrome_executable = Some(PathBuf::from(v));
        }
        if let Ok(v) = env::var("BROADCAST_HOME_URL") {
            cfg.home_url = v;
        }
        if let Ok(v) = env::var("BROADCAST_DEEP_LINK") {
            cfg.deep_link_template = v;
        }
        if let Ok(v) = env::var("BROADCAST_COUNTRY_PREFIX") {
            cfg.country_prefix = v.chars().filter(|c| c.is_ascii_digit()).collect();
        }
        if let Ok(v) = env::var("BROADCAST_TEMPLATE") {
            cfg.template_message = v;
        }
        if let Ok(v) = env::var("BROADCAST_OUTPUT_ROOT") {
            cfg.output_root = PathBuf::from(v);
        }
        if let Ok(v) = env::var("BROADCAST_DATABASE_PATH") {
            cfg.database_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("BROADCAST_BIND_HOST") {
            cfg.bind_host = v;
        }

        cfg.headless = env_parse("BROADCAST_HEADLESS", cfg.headless);
        cfg.default_speed_mode = env_parse("BROADCAST_SPEED_MODE", cfg.default_speed_mode);
        cfg.min_delay_secs = env_parse_opt("BROADCAST_MIN_DELAY_SECS").or(cfg.min_delay_secs);
        cfg.max_delay_secs = env_parse_opt("BROADCAST_MAX_DELAY_SECS").or(cfg.max_delay_secs);
        cfg.ready_timeout_secs = env_parse("BROADCAST_READY_TIMEOUT_SECS", cfg.ready_timeout_secs);
        cfg.ready_timeout_policy =
            env_parse("BROADCAST_READY_TIMEOUT_POLICY", cfg.ready_timeout_policy);
        cfg.chat_load_timeout_secs =
            env_parse("BROADCAST_CHAT_TIMEOUT_SECS", cfg.chat_load_timeout_secs);
        cfg.poll_interval_ms = env_parse("BROADCAST_POLL_INTERVAL_MS", cfg.poll_interval_ms);
        cfg.retained_runs = env_parse("BROADCAST_RETAINED_RUNS", cfg.retained_runs);
        cfg.bind_port = env_parse("BROADCAST_BIND_PORT", cfg.bind_port);

        cfg
    }

    /// Rango efectivo entre envíos: override de la request > config > modo.
    /// Cada extremo queda en `[0, MAX_DELAY_SECS]`.
    pub fn between_range(
        &self,
        mode: SpeedMode,
        min_override: Option<f64>,
        max_override: Option<f64>,
    ) -> (f64, f64) {
        let profile = mode.profile();
        let min = min_override
            .or(self.min_delay_secs)
            .unwrap_or(profile.min_between)
            .max(0.0)
            .min(MAX_DELAY_SECS);
        let max = max_override
            .or(self.max_delay_secs)
            .unwrap_or(profile.max_between)
            .max(0.0)
            .min(MAX_DELAY_SECS);
        if max < min {
            (max, min)
        } else {
            (min, max)
        }
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("Valor inválido en {}='{}', se usa el default", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}

fn env_parse_opt<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Valor inválido en {}='{}', se ignora", key, raw);
            None
        }
    }
}

/// Carpeta Documentos del usuario; si no existe, el home.
pub fn documents_dir() -> PathBuf {
    if let Some(docs) = dirs::document_dir() {
        if docs.is_dir() {
            return docs;
        }
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    for candidate in ["Documents", "Belgeler", "My Documents"] {
        let p = home.join(candidate);
        if p.is_dir() {
            return p;
        }
    }
    home
}
