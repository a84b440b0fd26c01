//! services/send_engine.rs
//! Un intento de envío por destinatario: abrir el chat, reescribir la caja de
//! texto y disparar el envío con una cadena de estrategias.

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use crate::config::selectors::WebClientSelectors;
use crate::errors::SendFailure;
use crate::services::session_service::{ChatPage, KeyPress};

/// Una forma de disparar el envío. Devuelve `Ok(true)` si encontró y activó su control.
#[async_trait]
pub trait SubmitStrategy: Send + Sync {
    fn name(&self) -> &str;
    async fn try_activate(&self, page: &dyn ChatPage) -> Result<bool>;
}

/// Botón de envío actual (varios marcadores, incluidas etiquetas traducidas).
pub struct SendButtonStrategy {
    markers: Vec<String>,
}

impl SendButtonStrategy {
    pub fn new(markers: Vec<String>) -> Self {
        SendButtonStrategy { markers }
    }
}

#[async_trait]
impl SubmitStrategy for SendButtonStrategy {
    fn name(&self) -> &str {
        "send-button"
    }

    async fn try_activate(&self, page: &dyn ChatPage) -> Result<bool> {
        for marker in &self.markers {
            if page.click(marker).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Ícono de envío de versiones anteriores del cliente.
pub struct LegacyIconStrategy {
    selector: String,
}

impl LegacyIconStrategy {
    pub fn new(selector: impl Into<String>) -> Self {
        LegacyIconStrategy {
            selector: selector.into(),
        }
    }
}

#[async_trait]
impl SubmitStrategy for LegacyIconStrategy {
    fn name(&self) -> &str {
        "legacy-icon"
    }

    async fn try_activate(&self, page: &dyn ChatPage) -> Result<bool> {
        page.click(&self.selector).await
    }
}

/// Último recurso: ENTER sobre la caja de texto.
pub struct EnterKeyStrategy {
    compose_selector: String,
}

impl EnterKeyStrategy {
    pub fn new(compose_selector: impl Into<String>) -> Self {
        EnterKeyStrategy {
            compose_selector: compose_selector.into(),
        }
    }
}

#[async_trait]
impl SubmitStrategy for EnterKeyStrategy {
    fn name(&self) -> &str {
        "enter-key"
    }

    async fn try_activate(&self, page: &dyn ChatPage) -> Result<bool> {
        if !page.is_present(&self.compose_selector).await? {
            return Ok(false);
        }
        page.press_key(&self.compose_selector, KeyPress::Enter).await?;
        Ok(true)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SendTimings {
    /// Pausa tras navegar al deep link.
    pub open_delay: Duration,
    /// Máximo a esperar por la caja de texto.
    pub chat_load_timeout: Duration,
    pub poll_interval: Duration,
    /// Pausa tras disparar el envío.
    pub settle_delay: Duration,
}

pub struct SendEngine {
    selectors: WebClientSelectors,
    deep_link_template: String,
    timings: SendTimings,
    strategies: Vec<Box<dyn SubmitStrategy>>,
}

impl SendEngine {
    /// Motor con la cadena por defecto: botón actual → ícono legacy → ENTER.
    pub fn new(
        selectors: WebClientSelectors,
        deep_link_template: impl Into<String>,
        timings: SendTimings,
    ) -> Self {
        let strategies: Vec<Box<dyn SubmitStrategy>> = vec![
            Box::new(SendButtonStrategy::new(selectors.send_buttons.clone())),
            Box::new(LegacyIconStrategy::new(selectors.legacy_send_icon.clone())),
            Box::new(EnterKeyStrategy::new(selectors.compose_box.clone())),
        ];
        SendEngine {
            selectors,
            deep_link_template: deep_link_template.into(),
            timings,
            strategies,
        }
    }

    /// Reemplaza la cadena de estrategias (se prueban en orden).
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn SubmitStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn deep_link(&self, phone: &str, message: &str) -> String {
        self.deep_link_template
            .replace("{phone}", phone)
            .replace("{text}", &urlencoding::encode(message))
    }

    /// Un solo intento, sin reintentos.
    pub async fn send_one(
        &self,
        page: &dyn ChatPage,
        phone: &str,
        message: &str,
    ) -> Result<(), SendFailure> {
        if message.trim().is_empty() {
            return Err(SendFailure::Automation("message is empty".to_string()));
        }

        let link = self.deep_link(phone, message);
        page.navigate(&link)
            .await
            .map_err(|e| SendFailure::Automation(format!("{:#}", e)))?;
        sleep_if_needed(self.timings.open_delay).await;

        // 1) Esperar a que el chat cargue
        if !self.wait_for_compose_box(page).await {
            let secs = self.timings.chat_load_timeout.as_secs();
            return Err(self.classify(page, SendFailure::ChatLoadTimeout(secs)).await);
        }

        // 2) Limpiar y reescribir siempre: el texto del deep link más el tipeado
        //    terminaban duplicados en el mensaje.
        self.write_message(page, message)
            .await
            .map_err(|e| SendFailure::Automation(format!("{:#}", e)))?;

        // 3) Disparar el envío
        for strategy in &self.strategies {
            match strategy.try_activate(page).await {
                Ok(true) => {
                    log::info!(
                        "(send_one) Envío disparado a {} con estrategia '{}'",
                        phone,
                        strategy.name()
                    );
                    sleep_if_needed(self.timings.settle_delay).await;
                    return Ok(());
                }
                Ok(false) => {
                    log::debug!(
                        "(send_one) Estrategia '{}' sin control para {}",
                        strategy.name(),
                        phone
                    );
                }
                Err(e) => {
                    log::warn!(
                        "(send_one) Estrategia '{}' falló para {}: {:#}",
                        strategy.name(),
                        phone,
                        e
                    );
                }
            }
        }

        Err(self.classify(page, SendFailure::SendControlNotFound).await)
    }

    async fn wait_for_compose_box(&self, page: &dyn ChatPage) -> bool {
        let start = Instant::now();
        loop {
            match page.is_present(&self.selectors.compose_box).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => log::debug!("(wait_for_compose_box) {:#}", e),
            }
            if start.elapsed() >= self.timings.chat_load_timeout {
                return false;
            }
            tokio::time::sleep(self.timings.poll_interval).await;
        }
    }

    async fn write_message(&self, page: &dyn ChatPage, message: &str) -> Result<()> {
        let compose = &self.selectors.compose_box;
        page.clear_input(compose).await?;

        let lines: Vec<&str> = message.split('\n').collect();
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            page.insert_text(compose, line.trim_end_matches('\r')).await?;
            if i < last {
                page.press_key(compose, KeyPress::ShiftEnter).await?;
            }
        }
        Ok(())
    }

    /// Si la página muestra el aviso de número inválido, ese es el motivo real.
    async fn classify(&self, page: &dyn ChatPage, fallback: SendFailure) -> SendFailure {
        match page.contains_text(&self.selectors.invalid_number_texts).await {
            Ok(true) => SendFailure::InvalidNumber,
            Ok(false) => fallback,
            Err(e) => {
                log::debug!("(classify) No se pudo revisar el aviso de número inválido: {:#}", e);
                fallback
            }
        }
    }
}

async fn sleep_if_needed(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}
