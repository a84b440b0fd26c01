//! services/broadcast_service.rs
//! Capa que la API usa para lanzar, consultar y cancelar corridas.
//! Mantiene el estado en vivo en memoria y el historial en `operations`.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::broadcast_config::BroadcastGlobalConfig;
use crate::config::speed_mode::SpeedMode;
use crate::errors::BroadcastError;
use crate::models::broadcast_model::{BroadcastRequest, BroadcastResponse, BroadcastStateResponse};
use crate::models::operation_model::CreateOperationRequest;
use crate::models::recipient_model::{Recipient, SendResult};
use crate::models::report_model::RunSummary;
use crate::services::broadcast_runner::{
    BroadcastObserver, BroadcastRunner, RecipientFilter, RunOutcome, RunSettings,
};
use crate::services::contact_loader::{skip_already_sent, ContactLoader};
use crate::services::operation_service::OperationService;
use crate::services::pacing::{CancelFlag, MAX_DELAY_SECS};
use crate::services::result_aggregator::ResultAggregator;
use crate::services::session_service::BrowserSession;

/// Líneas de progreso que se guardan por corrida.
const PROGRESS_BUFFER: usize = 50;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("{0}")]
    Invalid(String),
    /// Ya hay una corrida activa (una sola sesión de navegador a la vez).
    #[error("{0}")]
    Busy(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<BroadcastError> for StartError {
    fn from(e: BroadcastError) -> Self {
        match e {
            BroadcastError::InputValidation(msg) => StartError::Invalid(msg),
            other => StartError::Internal(anyhow::Error::new(other)),
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    status: String,
    processed: usize,
    sent: usize,
    failed: usize,
    progress: VecDeque<String>,
    results: Vec<SendResult>,
    output_dir: Option<PathBuf>,
    report_path: Option<PathBuf>,
    report_error: Option<String>,
    /// Se conserva si el reporte falló, para reintentar la exportación.
    pending_export: Option<ResultAggregator>,
}

/// Estado compartido de una corrida; también es su observer.
pub struct RunHandle {
    operation_id: String,
    total: usize,
    cancel: CancelFlag,
    state: Mutex<RunState>,
}

impl RunHandle {
    fn new(operation_id: String, total: usize) -> Self {
        RunHandle {
            operation_id,
            total,
            cancel: CancelFlag::new(),
            state: Mutex::new(RunState {
                status: "pending".to_string(),
                ..RunState::default()
            }),
        }
    }

    fn set_status(&self, status: &str) {
        self.state.lock().status = status.to_string();
    }

    fn snapshot(&self) -> BroadcastStateResponse {
        let st = self.state.lock();
        BroadcastStateResponse {
            operation_id: self.operation_id.clone(),
            status: st.status.clone(),
            total: self.total,
            processed: st.processed,
            summary: RunSummary::from_counts(st.sent, st.failed),
            cancel_requested: self.cancel.is_cancelled(),
            output_dir: st.output_dir.as_ref().map(|p| p.display().to_string()),
            report_error: st.report_error.clone(),
            recent_progress: st.progress.iter().cloned().collect(),
        }
    }
}

impl BroadcastObserver for RunHandle {
    fn on_progress(&self, text: &str) {
        log::info!("[{}] {}", self.operation_id, text);
        let mut st = self.state.lock();
        if st.progress.len() >= PROGRESS_BUFFER {
            st.progress.pop_front();
        }
        st.progress
            .push_back(format!("{} {}", Local::now().format("%H:%M:%S"), text));
    }

    fn on_result(&self, result: &SendResult) {
        let mut st = self.state.lock();
        st.processed += 1;
        if result.ok {
            st.sent += 1;
        } else {
            st.failed += 1;
        }
        st.results.push(result.clone());
    }

    fn on_finished(&self, output_dir: Option<&Path>) {
        self.state.lock().output_dir = output_dir.map(Path::to_path_buf);
    }
}

/// Corridas conocidas, la activa y el orden en que terminaron.
#[derive(Default)]
struct Registry {
    runs: HashMap<String, Arc<RunHandle>>,
    active: Option<String>,
    finished: VecDeque<String>,
}

/// Ocupa el lugar de la corrida activa. Al soltarse (fin normal o panic de la tarea)
/// libera el lugar, poda corridas viejas y publica el estado final.
pub struct ActiveRunGuard {
    registry: Arc<Mutex<Registry>>,
    handle: Arc<RunHandle>,
    operation_service: OperationService,
    retained: usize,
    final_status: Option<&'static str>,
}

impl ActiveRunGuard {
    pub fn handle(&self) -> &Arc<RunHandle> {
        &self.handle
    }

    pub fn finish(mut self, status: &'static str) {
        self.final_status = Some(status);
    }
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        let op_id = self.handle.operation_id.clone();
        let status = match self.final_status {
            Some(status) => status,
            None => {
                log::error!(
                    "(ActiveRunGuard) La corrida {} terminó sin estado final, se marca como fallida",
                    op_id
                );
                if let Ok(rt) = tokio::runtime::Handle::try_current() {
                    let operation_service = self.operation_service.clone();
                    let id = op_id.clone();
                    rt.spawn(async move {
                        if let Err(e) = operation_service
                            .mark_operation_failed(&id, "La corrida se interrumpió".to_string())
                            .await
                        {
                            log::error!("(ActiveRunGuard) {:#}", e);
                        }
                    });
                }
                "failed"
            }
        };

        {
            let mut reg = self.registry.lock();
            if reg.active.as_deref() == Some(op_id.as_str()) {
                reg.active = None;
            }
            reg.finished.push_back(op_id.clone());
            while reg.finished.len() > self.retained {
                if let Some(old) = reg.finished.pop_front() {
                    reg.runs.remove(&old);
                }
            }
        }
        self.handle.set_status(status);
    }
}

#[derive(Clone)]
pub struct BroadcastService {
    config: Arc<BroadcastGlobalConfig>,
    operation_service: OperationService,
    registry: Arc<Mutex<Registry>>,
}

impl BroadcastService {
    pub fn new(config: Arc<BroadcastGlobalConfig>, operation_service: OperationService) -> Self {
        BroadcastService {
            config,
            operation_service,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Toma el lugar de corrida activa para `op_id`, o `Busy` si ya hay otra.
    pub fn reserve(&self, op_id: &str, total: usize) -> Result<ActiveRunGuard, StartError> {
        let mut reg = self.registry.lock();
        if let Some(other) = reg.active.as_ref() {
            return Err(StartError::Busy(format!("Ya hay una corrida activa: {}", other)));
        }
        let handle = Arc::new(RunHandle::new(op_id.to_string(), total));
        reg.active = Some(op_id.to_string());
        reg.runs.insert(op_id.to_string(), handle.clone());
        Ok(ActiveRunGuard {
            registry: self.registry.clone(),
            handle,
            operation_service: self.operation_service.clone(),
            retained: self.config.retained_runs.max(1),
            final_status: None,
        })
    }

    /// Valida, carga contactos y lanza la corrida en segundo plano.
    pub async fn start_broadcast(
        &self,
        req: BroadcastRequest,
    ) -> Result<BroadcastResponse, StartError> {
        let speed_mode = match &req.speed_mode {
            Some(s) => s.parse::<SpeedMode>().map_err(StartError::Invalid)?,
            None => self.config.default_speed_mode,
        };
        for delay in [req.min_delay_secs, req.max_delay_secs].into_iter().flatten() {
            if !delay.is_finite() || delay < 0.0 {
                return Err(StartError::Invalid(
                    "Las demoras deben ser números no negativos".to_string(),
                ));
            }
            if delay > MAX_DELAY_SECS {
                return Err(StartError::Invalid(format!(
                    "Las demoras no pueden superar {} segundos",
                    MAX_DELAY_SECS
                )));
            }
        }
        if let Some(start_at) = req.start_at {
            if start_at <= Local::now().naive_local() {
                return Err(StartError::Invalid(
                    "La hora de arranque programado ya pasó".to_string(),
                ));
            }
        }
        if let Some(active) = self.registry.lock().active.as_ref() {
            return Err(StartError::Busy(format!("Ya hay una corrida activa: {}", active)));
        }

        // Contactos (error de validación = fatal, antes de empezar)
        let loader = ContactLoader::new(self.config.country_prefix.clone());
        let recipients = loader.load(Path::new(&req.file_path))?;

        let filter: Option<RecipientFilter> = if req.only_unsent {
            Some(Arc::new(skip_already_sent))
        } else {
            None
        };
        let total = match &filter {
            Some(f) => recipients.iter().filter(|r| f(r)).count(),
            None => recipients.len(),
        };
        if total == 0 {
            return Err(StartError::Invalid("No quedan contactos para enviar".to_string()));
        }

        let (min_delay_secs, max_delay_secs) =
            self.config
                .between_range(speed_mode, req.min_delay_secs, req.max_delay_secs);
        let mut settings = RunSettings::from_config(&self.config, speed_mode);
        if let Some(template) = req.template.clone().filter(|t| !t.trim().is_empty()) {
            settings.template = template;
        }
        settings.message_override = req.message_override.clone();
        settings.min_delay_secs = min_delay_secs;
        settings.max_delay_secs = max_delay_secs;
        settings.start_at = req.start_at;
        settings.filter = filter;

        let op = self
            .operation_service
            .create_operation(CreateOperationRequest {
                operation_type: "broadcast".to_string(),
                is_async: true,
                metadata: Some(
                    serde_json::json!({
                        "file_path": req.file_path,
                        "total": total,
                        "speed_mode": speed_mode.to_string(),
                        "start_at": req.start_at.map(|d| d.to_string()),
                    })
                    .to_string(),
                ),
            })
            .await?;

        // Otro request pudo ganar la sesión mientras se cargaba el archivo
        let guard = match self.reserve(&op.id, total) {
            Ok(guard) => guard,
            Err(e) => {
                let _ = self
                    .operation_service
                    .mark_operation_failed(&op.id, e.to_string())
                    .await;
                return Err(e);
            }
        };

        log::info!(
            "(start_broadcast) Corrida {} creada: {} contactos, modo={}, demora={:.1}-{:.1}s",
            op.id,
            total,
            speed_mode,
            min_delay_secs,
            max_delay_secs
        );

        let service = self.clone();
        let file_path = req.file_path.clone();
        tokio::spawn(async move {
            service
                .execute_run(guard, recipients, settings, file_path)
                .await;
        });

        Ok(BroadcastResponse {
            success: true,
            operation_id: op.id,
            total,
            message: "Broadcast queued".to_string(),
        })
    }

    async fn execute_run(
        &self,
        guard: ActiveRunGuard,
        recipients: Vec<Recipient>,
        settings: RunSettings,
        file_path: String,
    ) {
        let handle = guard.handle().clone();
        let op_id = handle.operation_id.clone();
        handle.set_status("running");
        if let Err(e) = self
            .operation_service
            .update_operation_status(&op_id, "running", None)
            .await
        {
            log::error!("(execute_run) {:#}", e);
        }

        let runner = BroadcastRunner::new(self.config.clone(), settings.speed_mode);
        let mut session = BrowserSession::new(&self.config);
        let outcome = runner
            .run(
                &mut session,
                &recipients,
                &settings,
                handle.as_ref(),
                &handle.cancel,
            )
            .await;

        let (status, error) = final_status(&outcome);
        let summary = outcome.aggregator.summary();
        {
            let mut st = handle.state.lock();
            st.report_path = outcome.report_path.clone();
            st.report_error = outcome.report_error.as_ref().map(|e| e.to_string());
            if outcome.report_error.is_some() {
                st.pending_export = Some(outcome.aggregator.clone());
            }
        }

        let metadata = serde_json::json!({
            "file_path": file_path,
            "total": summary.total,
            "sent": summary.sent,
            "failed": summary.failed,
            "success_rate": summary.success_rate,
            "cancelled": outcome.cancelled,
            "output_dir": outcome.output_dir.as_ref().map(|p| p.display().to_string()),
            "report_error": outcome.report_error.as_ref().map(|e| e.to_string()),
        });
        if let Err(e) = self
            .operation_service
            .finish_operation(&op_id, status, error.as_deref(), &metadata)
            .await
        {
            log::error!("(execute_run) No se pudo cerrar la operación {}: {:#}", op_id, e);
        }

        // El estado final se publica recién con el historial escrito y la sesión liberada
        guard.finish(status);
        log::info!("(execute_run) Corrida {} finalizada con estado '{}'", op_id, status);
    }

    pub fn state(&self, op_id: &str) -> Option<BroadcastStateResponse> {
        self.handle(op_id).map(|h| h.snapshot())
    }

    pub fn results(&self, op_id: &str) -> Option<Vec<SendResult>> {
        self.handle(op_id).map(|h| h.state.lock().results.clone())
    }

    /// `Some(true)` si se pidió la cancelación, `None` si la corrida no existe.
    pub fn cancel(&self, op_id: &str) -> Option<bool> {
        let handle = self.handle(op_id)?;
        let st = handle.state.lock();
        if matches!(st.status.as_str(), "pending" | "running") {
            handle.cancel.cancel();
            log::info!("(cancel) Cancelación pedida para {}", op_id);
            Some(true)
        } else {
            Some(false)
        }
    }

    pub fn report_path(&self, op_id: &str) -> Option<PathBuf> {
        self.handle(op_id)
            .and_then(|h| h.state.lock().report_path.clone())
    }

    /// Reintenta escribir el reporte con los resultados retenidos.
    pub fn retry_export(&self, op_id: &str) -> Result<PathBuf, StartError> {
        let handle = self
            .handle(op_id)
            .ok_or_else(|| StartError::Invalid(format!("Corrida no encontrada: {}", op_id)))?;

        let mut st = handle.state.lock();
        let aggregator = st.pending_export.clone().ok_or_else(|| {
            StartError::Invalid("No hay reporte pendiente de exportar".to_string())
        })?;
        let dir = match st.output_dir.clone() {
            Some(dir) => dir,
            None => crate::services::attempt_log::make_run_output_dir(&self.config.output_root)?,
        };

        let runner = BroadcastRunner::new(self.config.clone(), self.config.default_speed_mode);
        match runner.export(&aggregator, &dir) {
            Ok(path) => {
                st.output_dir = Some(dir);
                st.report_path = Some(path.clone());
                st.report_error = None;
                st.pending_export = None;
                Ok(path)
            }
            Err(e) => {
                st.report_error = Some(e.to_string());
                Err(StartError::Internal(anyhow::Error::new(e)))
            }
        }
    }

    fn handle(&self, op_id: &str) -> Option<Arc<RunHandle>> {
        self.registry.lock().runs.get(op_id).cloned()
    }
}

fn final_status(outcome: &RunOutcome) -> (&'static str, Option<String>) {
    if let Some(fatal) = &outcome.fatal {
        return ("failed", Some(fatal.to_string()));
    }
    if outcome.cancelled {
        return ("cancelled", None);
    }
    ("done", outcome.report_error.as_ref().map(|e| e.to_string()))
}
