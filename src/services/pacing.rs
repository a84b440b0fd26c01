//! services/pacing.rs
//! Esperas entre envíos, troceadas para poder cancelarlas rápido.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime};
use rand::Rng;

/// Bandera de cancelación compartida entre quien controla y el worker.
/// Es solo una pista que se consulta en cada punto de espera.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tope de cualquier espera configurable (una hora).
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Segundos -> `Duration`, acotado a `[0, MAX_DELAY_SECS]`. NaN e infinitos no llegan a `Duration`.
pub fn secs_to_duration(secs: f64) -> Duration {
    let secs = if secs.is_nan() { 0.0 } else { secs.clamp(0.0, MAX_DELAY_SECS) };
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct PacingController {
    poll_interval: Duration,
}

impl PacingController {
    pub fn new(poll_interval: Duration) -> Self {
        // Un intervalo cero haría un bucle ocupado
        let poll_interval = poll_interval.max(Duration::from_millis(10));
        PacingController { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Demora aleatoria uniforme en `[min, max]` segundos, acotada a `MAX_DELAY_SECS`.
    pub fn pick_delay(min_secs: f64, max_secs: f64) -> Duration {
        let lo = secs_to_duration(min_secs.min(max_secs)).as_secs_f64();
        let hi = secs_to_duration(min_secs.max(max_secs)).as_secs_f64();
        let secs = if hi > lo {
            rand::thread_rng().gen_range(lo..=hi)
        } else {
            lo
        };
        secs_to_duration(secs)
    }

    /// Espera aleatoria entre dos envíos.
    pub async fn wait_between_sends(
        &self,
        min_secs: f64,
        max_secs: f64,
        should_stop: &CancelFlag,
    ) -> WaitOutcome {
        let delay = Self::pick_delay(min_secs, max_secs);
        log::debug!("(wait_between_sends) Esperando {:.1}s", delay.as_secs_f64());
        self.wait_for(delay, should_stop).await
    }

    /// Espera `total` en pasos de `poll_interval`, revisando la cancelación entre pasos.
    pub async fn wait_for(&self, total: Duration, should_stop: &CancelFlag) -> WaitOutcome {
        let start = Instant::now();
        loop {
            if should_stop.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            let elapsed = start.elapsed();
            if elapsed >= total {
                return WaitOutcome::Completed;
            }
            let step = (total - elapsed).min(self.poll_interval);
            tokio::time::sleep(step).await;
        }
    }

    /// Espera hasta una hora local (arranque programado).
    pub async fn wait_until(&self, start_at: NaiveDateTime, should_stop: &CancelFlag) -> WaitOutcome {
        loop {
            if should_stop.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            if Local::now().naive_local() >= start_at {
                return WaitOutcome::Completed;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
