//! services/broadcast_runner.rs
//! Bucle de envío masivo: un destinatario a la vez, en el orden del archivo.
//!
//! El runner solo maneja datos (Recipient/SendResult) y avisa por callbacks;
//! quien lo llama (API, UI, tests) decide qué hacer con cada aviso.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;

use crate::config::broadcast_config::{BroadcastGlobalConfig, ReadyTimeoutPolicy};
use crate::config::speed_mode::{DelayProfile, SpeedMode};
use crate::errors::{BroadcastError, SendFailure};
use crate::models::recipient_model::{Recipient, SendResult};
use crate::services::attempt_log::{make_run_output_dir, AttemptLog};
use crate::services::message_resolver::resolve;
use crate::services::pacing::{secs_to_duration, CancelFlag, PacingController, WaitOutcome};
use crate::services::result_aggregator::{now_str, ResultAggregator};
use crate::services::send_engine::{SendEngine, SendTimings};
use crate::services::session_service::{ChatSession, Readiness};

/// Avisos de una corrida. `on_finished` se llama exactamente una vez.
pub trait BroadcastObserver: Send + Sync {
    fn on_progress(&self, text: &str);
    fn on_result(&self, result: &SendResult);
    fn on_finished(&self, output_dir: Option<&Path>);
}

/// Predicado previo al envío: `false` = omitir (no genera resultado).
pub type RecipientFilter = Arc<dyn Fn(&Recipient) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct RunSettings {
    pub template: String,
    pub message_override: Option<String>,
    pub speed_mode: SpeedMode,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub start_at: Option<NaiveDateTime>,
    pub filter: Option<RecipientFilter>,
}

impl RunSettings {
    pub fn from_config(config: &BroadcastGlobalConfig, speed_mode: SpeedMode) -> Self {
        let (min_delay_secs, max_delay_secs) = config.between_range(speed_mode, None, None);
        RunSettings {
            template: config.template_message.clone(),
            message_override: None,
            speed_mode,
            min_delay_secs,
            max_delay_secs,
            start_at: None,
            filter: None,
        }
    }
}

pub struct RunOutcome {
    pub aggregator: ResultAggregator,
    pub output_dir: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub cancelled: bool,
    /// La corrida no pudo empezar/continuar.
    pub fatal: Option<BroadcastError>,
    /// El reporte no se escribió; `aggregator` sigue disponible para reintentar.
    pub report_error: Option<BroadcastError>,
}

impl RunOutcome {
    fn empty(cancelled: bool, fatal: Option<BroadcastError>) -> Self {
        RunOutcome {
            aggregator: ResultAggregator::new(),
            output_dir: None,
            report_path: None,
            cancelled,
            fatal,
            report_error: None,
        }
    }
}

pub struct BroadcastRunner {
    config: Arc<BroadcastGlobalConfig>,
    profile: DelayProfile,
    engine: SendEngine,
    pacing: PacingController,
}

impl BroadcastRunner {
    pub fn new(config: Arc<BroadcastGlobalConfig>, speed_mode: SpeedMode) -> Self {
        let profile = speed_mode.profile();
        let poll_interval = Duration::from_millis(config.poll_interval_ms);
        let timings = SendTimings {
            open_delay: secs_to_duration(profile.open_delay),
            chat_load_timeout: Duration::from_secs(config.chat_load_timeout_secs),
            poll_interval,
            settle_delay: secs_to_duration(profile.settle_delay),
        };
        let engine = SendEngine::new(
            config.selectors.clone(),
            config.deep_link_template.clone(),
            timings,
        );
        BroadcastRunner {
            profile,
            engine,
            pacing: PacingController::new(poll_interval),
            config,
        }
    }

    pub fn with_engine(mut self, engine: SendEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_profile(mut self, profile: DelayProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Ejecuta la corrida completa. Cancelada o no, si hubo sesión se genera reporte.
    pub async fn run<S: ChatSession>(
        &self,
        session: &mut S,
        recipients: &[Recipient],
        settings: &RunSettings,
        observer: &dyn BroadcastObserver,
        cancel: &CancelFlag,
    ) -> RunOutcome {
        // 0) Arranque programado
        if let Some(start_at) = settings.start_at {
            observer.on_progress(&format!(
                "Arranque programado: esperando hasta {}",
                start_at.format("%Y-%m-%d %H:%M:%S")
            ));
            if self.pacing.wait_until(start_at, cancel).await == WaitOutcome::Cancelled {
                observer.on_progress("Cancelado durante la espera programada.");
                observer.on_finished(None);
                return RunOutcome::empty(true, None);
            }
        }
        if cancel.is_cancelled() {
            observer.on_progress("Cancelado antes de abrir el navegador.");
            observer.on_finished(None);
            return RunOutcome::empty(true, None);
        }

        // 1) Sesión
        if let Some(err) = self.open_session(session, observer).await {
            observer.on_progress(&format!("FATAL: {}", err));
            session.stop().await;
            observer.on_finished(None);
            return RunOutcome::empty(cancel.is_cancelled(), Some(err));
        }

        // 2) Carpeta de salida + logs por intento
        let output_dir = match make_run_output_dir(&self.config.output_root) {
            Ok(dir) => Some(dir),
            Err(e) => {
                log::error!("(run) {:#}", e);
                observer.on_progress(&format!("No se pudo crear la carpeta de salida: {:#}", e));
                None
            }
        };
        let attempt_log = output_dir.as_ref().map(|dir| {
            AttemptLog::new(
                dir.join(&self.config.sent_log_name),
                dir.join(&self.config.failed_log_name),
            )
        });

        // 3) Bucle principal
        let mut aggregator = ResultAggregator::new();
        let cancelled = self
            .send_all(
                session,
                recipients,
                settings,
                observer,
                cancel,
                attempt_log.as_ref(),
                &mut aggregator,
            )
            .await;

        session.stop().await;
        observer.on_progress("Navegador cerrado.");

        // 4) Reporte (también para corridas parciales)
        let (report_path, report_error) = self.write_report(&aggregator, output_dir.as_deref());
        match (&report_path, &report_error) {
            (Some(path), _) => observer.on_progress(&format!("Excel creado: {}", path.display())),
            (None, Some(err)) => observer.on_progress(&format!("Error escribiendo reporte: {}", err)),
            _ => {}
        }

        let summary = aggregator.summary();
        observer.on_progress(&format!(
            "{}: total={}, enviados={}, fallidos={}, éxito={:.2}%",
            if cancelled { "Corrida cancelada" } else { "Corrida completa" },
            summary.total,
            summary.sent,
            summary.failed,
            summary.success_rate
        ));
        observer.on_finished(output_dir.as_deref());

        RunOutcome {
            aggregator,
            output_dir,
            report_path,
            cancelled,
            fatal: None,
            report_error,
        }
    }

    /// Exporta (o re-exporta) el reporte dentro de `dir`.
    pub fn export(&self, aggregator: &ResultAggregator, dir: &Path) -> Result<PathBuf, BroadcastError> {
        let path = dir.join(&self.config.report_file_name);
        aggregator.export_report(&path)?;
        Ok(path)
    }

    async fn open_session<S: ChatSession>(
        &self,
        session: &mut S,
        observer: &dyn BroadcastObserver,
    ) -> Option<BroadcastError> {
        observer.on_progress("Abriendo navegador...");
        if let Err(e) = session.start().await {
            return Some(BroadcastError::SessionStart(format!("{:#}", e)));
        }

        observer.on_progress("Navegador abierto. Esperando al cliente web...");
        let timeout = Duration::from_secs(self.config.ready_timeout_secs);
        match session.wait_until_ready(timeout).await {
            Ok(Readiness::Ready) => {
                observer.on_progress("Cliente web listo. Comienzan los envíos...");
                None
            }
            Ok(Readiness::TimedOut { login_pending }) => {
                let reason = if login_pending {
                    format!("login code not scanned within {}s", timeout.as_secs())
                } else {
                    format!("web client not ready within {}s", timeout.as_secs())
                };
                match self.config.ready_timeout_policy {
                    ReadyTimeoutPolicy::Abort => Some(BroadcastError::SessionStart(reason)),
                    ReadyTimeoutPolicy::Proceed => {
                        log::warn!("(open_session) {}; se continúa igual", reason);
                        observer.on_progress(&format!("Aviso: {}; se intenta enviar igual.", reason));
                        None
                    }
                }
            }
            Err(e) => Some(BroadcastError::SessionStart(format!("{:#}", e))),
        }
    }

    /// Devuelve `true` si se cortó por cancelación.
    #[allow(clippy::too_many_arguments)]
    async fn send_all<S: ChatSession>(
        &self,
        session: &mut S,
        recipients: &[Recipient],
        settings: &RunSettings,
        observer: &dyn BroadcastObserver,
        cancel: &CancelFlag,
        attempt_log: Option<&AttemptLog>,
        aggregator: &mut ResultAggregator,
    ) -> bool {
        // Cola sin omitidos; tras su último elemento no hay pausa
        let mut queue: Vec<&Recipient> = Vec::with_capacity(recipients.len());
        for (idx, recipient) in recipients.iter().enumerate() {
            match &settings.filter {
                Some(filter) if !filter(recipient) => observer.on_progress(&format!(
                    "[{}/{}] Omitido (status previo): {}",
                    idx + 1,
                    recipients.len(),
                    recipient.phone
                )),
                _ => queue.push(recipient),
            }
        }
        let total = queue.len();

        for (idx, recipient) in queue.into_iter().enumerate() {
            if cancel.is_cancelled() {
                observer.on_progress("Cancelación pedida, se detiene el envío...");
                return true;
            }

            let message = resolve(
                recipient,
                &settings.template,
                settings.message_override.as_deref(),
            );
            observer.on_progress(&format!(
                "[{}/{}] Enviando → {} ({})",
                idx + 1,
                total,
                recipient.phone,
                recipient.name
            ));
            log::debug!("(send_all) Mensaje para {}: {:?}", recipient.phone, message);

            let attempt = match session.page() {
                Some(page) => self.engine.send_one(page, &recipient.phone, &message).await,
                None => Err(SendFailure::Automation("session is closed".to_string())),
            };
            if let Err(failure) = &attempt {
                log::warn!(
                    "(send_all) Falló {} [{}]: {}",
                    recipient.phone,
                    failure.kind(),
                    failure
                );
            }
            let result = SendResult::from_attempt(recipient, message, attempt.err().map(|f| f.to_string()));
            let timestamp = now_str();

            if let Some(log_files) = attempt_log {
                if let Err(e) = log_files.append(&result, &timestamp) {
                    log::warn!("(send_all) No se pudo escribir el log de intentos: {:#}", e);
                }
            }

            match &result.error {
                None => observer.on_progress(&format!("✔ Enviado: {}", result.phone)),
                Some(err) => observer.on_progress(&format!("✖ Error: {} -> {}", result.phone, err)),
            }
            observer.on_result(&result);
            let failed = !result.ok;
            aggregator.add_with_timestamp(result, timestamp);

            if idx + 1 == total {
                return false;
            }

            if failed && self.profile.fail_delay > 0.0 {
                let extra = secs_to_duration(self.profile.fail_delay);
                if self.pacing.wait_for(extra, cancel).await == WaitOutcome::Cancelled {
                    observer.on_progress("Espera interrumpida por cancelación.");
                    return true;
                }
            }

            let waited = self
                .pacing
                .wait_between_sends(settings.min_delay_secs, settings.max_delay_secs, cancel)
                .await;
            if waited == WaitOutcome::Cancelled {
                observer.on_progress("Espera interrumpida por cancelación.");
                return true;
            }
        }

        false
    }

    fn write_report(
        &self,
        aggregator: &ResultAggregator,
        output_dir: Option<&Path>,
    ) -> (Option<PathBuf>, Option<BroadcastError>) {
        let dir = match output_dir {
            Some(dir) => dir,
            None => {
                return (
                    None,
                    Some(BroadcastError::ReportWrite {
                        path: self.config.output_root.clone(),
                        reason: "output directory unavailable".to_string(),
                    }),
                )
            }
        };
        match self.export(aggregator, dir) {
            Ok(path) => (Some(path), None),
            Err(e) => {
                log::error!("(write_report) {}", e);
                (None, Some(e))
            }
        }
    }
}
