//! services/session_service.rs
//! Sesión de navegador automatizado (Chrome vía CDP) con perfil persistente.
//!
//! El resto del servicio no habla con chromiumoxide directamente: usa los traits
//! `ChatSession` (ciclo de vida) y `ChatPage` (operaciones sobre la pestaña).
//! Así los tests pueden reemplazar el navegador por una página simulada.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::Page;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::config::broadcast_config::BroadcastGlobalConfig;
use crate::config::selectors::WebClientSelectors;

/// Modificador "Shift" en el protocolo CDP.
const SHIFT_MODIFIER: i64 = 8;

/// Binarios que se buscan en PATH si no se configuró uno.
const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
    /// Dispara el envío.
    Enter,
    /// Salto de línea "suave" (no envía).
    ShiftEnter,
}

/// Operaciones mínimas que el motor necesita sobre la pestaña del cliente web.
#[async_trait]
pub trait ChatPage: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;
    async fn is_present(&self, selector: &str) -> Result<bool>;
    /// `Ok(false)` si no hay elemento que clickear.
    async fn click(&self, selector: &str) -> Result<bool>;
    /// Selecciona todo el contenido del elemento editable y lo borra.
    async fn clear_input(&self, selector: &str) -> Result<()>;
    async fn insert_text(&self, selector: &str, text: &str) -> Result<()>;
    async fn press_key(&self, selector: &str, key: KeyPress) -> Result<()>;
    /// ¿Aparece alguno de los textos en la página visible?
    async fn contains_text(&self, needles: &[String]) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Venció el timeout. `login_pending` indica que se vio el código de login.
    TimedOut { login_pending: bool },
}

#[async_trait]
pub trait ChatSession: Send {
    async fn start(&mut self) -> Result<()>;
    async fn wait_until_ready(&mut self, timeout: Duration) -> Result<Readiness>;
    /// Idempotente: cerrar algo ya cerrado (o nunca abierto) no hace nada.
    async fn stop(&mut self);
    fn state(&self) -> SessionState;
    fn page(&self) -> Option<&dyn ChatPage>;
}

/// Sondea la página hasta ver la superficie principal (búsqueda) o vencer el timeout.
pub async fn wait_for_ready_marker(
    page: &dyn ChatPage,
    selectors: &WebClientSelectors,
    timeout: Duration,
    poll_interval: Duration,
) -> Readiness {
    let start = Instant::now();
    let mut login_pending = false;

    loop {
        if page.is_present(&selectors.search_box).await.unwrap_or(false) {
            return Readiness::Ready;
        }
        if !login_pending && page.is_present(&selectors.login_canvas).await.unwrap_or(false) {
            log::info!("(wait_for_ready_marker) Código de login visible, esperando escaneo...");
            login_pending = true;
        }
        if start.elapsed() >= timeout {
            return Readiness::TimedOut { login_pending };
        }
        tokio::time::sleep(poll_interval).await;
    }
}

// --------------------------------------------------------------------------------
// Implementación real con chromiumoxide
// --------------------------------------------------------------------------------

pub struct BrowserSession {
    profile_dir: PathBuf,
    chrome_executable: Option<PathBuf>,
    headless: bool,
    home_url: String,
    selectors: WebClientSelectors,
    poll_interval: Duration,

    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    page: Option<CdpChatPage>,
}

impl BrowserSession {
    pub fn new(config: &BroadcastGlobalConfig) -> Self {
        BrowserSession {
            profile_dir: config.profile_dir.clone(),
            chrome_executable: config.chrome_executable.clone(),
            headless: config.headless,
            home_url: config.home_url.clone(),
            selectors: config.selectors.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            browser: None,
            handler_task: None,
            page: None,
        }
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(self.profile_dir.clone())
            .window_size(1280, 900)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-session-crashed-bubble")
            .arg("--disable-dev-shm-usage")
            .arg("--password-store=basic");

        if !self.headless {
            builder = builder.with_head();
        }

        let executable = self
            .chrome_executable
            .clone()
            .or_else(|| CHROME_CANDIDATES.iter().find_map(|c| which::which(c).ok()));
        match executable {
            Some(path) => {
                log::info!("(browser_config) Usando Chrome en {:?}", path);
                builder = builder.chrome_executable(path);
            }
            None => {
                log::warn!("(browser_config) No se encontró Chrome en PATH, se usa la detección por defecto");
            }
        }

        builder
            .build()
            .map_err(|e| anyhow!("Configuración de navegador inválida: {}", e))
    }
}

#[async_trait]
impl ChatSession for BrowserSession {
    async fn start(&mut self) -> Result<()> {
        if self.browser.is_some() {
            return Ok(());
        }

        // El perfil persistente evita escanear el código de login en cada corrida.
        fs::create_dir_all(&self.profile_dir)
            .with_context(|| format!("No se pudo crear el perfil {:?}", self.profile_dir))?;

        let config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("No se pudo lanzar el navegador")?;

        let handler_task = tokio::spawn(async move {
            while let Some(evt) = handler.next().await {
                if let Err(e) = evt {
                    log::debug!("(browser handler) {}", e);
                }
            }
            log::debug!("(browser handler) Finalizado");
        });

        let page = browser
            .new_page(self.home_url.as_str())
            .await
            .context("No se pudo abrir la pestaña del cliente web")?;

        log::info!("(start) Navegador abierto con perfil {:?}", self.profile_dir);
        self.browser = Some(browser);
        self.handler_task = Some(handler_task);
        self.page = Some(CdpChatPage { page });
        Ok(())
    }

    async fn wait_until_ready(&mut self, timeout: Duration) -> Result<Readiness> {
        let page = self
            .page
            .as_ref()
            .ok_or_else(|| anyhow!("La sesión no está abierta"))?;
        Ok(wait_for_ready_marker(page, &self.selectors, timeout, self.poll_interval).await)
    }

    async fn stop(&mut self) {
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                log::warn!("(stop) Error cerrando navegador: {}", e);
            }
            let _ = browser.wait().await;
            log::info!("(stop) Navegador cerrado");
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }

    fn state(&self) -> SessionState {
        if self.browser.is_some() {
            SessionState::Open
        } else {
            SessionState::Closed
        }
    }

    fn page(&self) -> Option<&dyn ChatPage> {
        self.page.as_ref().map(|p| p as &dyn ChatPage)
    }
}

pub struct CdpChatPage {
    page: Page,
}

impl CdpChatPage {
    async fn eval_bool(&self, js: String) -> Result<bool> {
        let value = self
            .page
            .evaluate(js)
            .await
            .context("Fallo evaluando script en la página")?;
        Ok(value.into_value::<bool>().unwrap_or(false))
    }

    async fn dispatch_enter(&self, kind: DispatchKeyEventType, modifiers: i64) -> Result<()> {
        let mut builder = DispatchKeyEventParams::builder()
            .r#type(kind.clone())
            .modifiers(modifiers)
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13);
        if kind == DispatchKeyEventType::KeyDown {
            builder = builder.text("\r").unmodified_text("\r");
        }
        let params = builder.build().map_err(|e| anyhow!(e))?;
        self.page
            .execute(params)
            .await
            .context("Fallo enviando tecla Enter")?;
        Ok(())
    }
}

fn js_string(s: &str) -> Result<String> {
    serde_json::to_string(s).context("No se pudo serializar texto para JS")
}

#[async_trait]
impl ChatPage for CdpChatPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("No se pudo navegar a {}", url))?;
        Ok(())
    }

    async fn is_present(&self, selector: &str) -> Result<bool> {
        Ok(self.page.find_element(selector).await.is_ok())
    }

    async fn click(&self, selector: &str) -> Result<bool> {
        let element = match self.page.find_element(selector).await {
            Ok(el) => el,
            Err(_) => return Ok(false),
        };
        if element.click().await.is_ok() {
            return Ok(true);
        }
        // Click por JS cuando el elemento está tapado o fuera de vista
        let js = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
            js_string(selector)?
        );
        self.eval_bool(js).await
    }

    async fn clear_input(&self, selector: &str) -> Result<()> {
        let js = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.focus(); \
             document.execCommand('selectAll', false, null); document.execCommand('delete', false, null); \
             return true; }})()",
            js_string(selector)?
        );
        if !self.eval_bool(js).await? {
            return Err(anyhow!("No se encontró la caja de texto para limpiar"));
        }
        Ok(())
    }

    async fn insert_text(&self, selector: &str, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let js = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.focus(); \
             return document.execCommand('insertText', false, {}); }})()",
            js_string(selector)?,
            js_string(text)?
        );
        if self.eval_bool(js).await? {
            return Ok(());
        }
        // execCommand no disponible: se tipea carácter por carácter
        let element = self
            .page
            .find_element(selector)
            .await
            .context("No se encontró la caja de texto")?;
        element.type_str(text).await.context("Fallo escribiendo texto")?;
        Ok(())
    }

    async fn press_key(&self, selector: &str, key: KeyPress) -> Result<()> {
        if let Ok(element) = self.page.find_element(selector).await {
            let _ = element.focus().await;
        }
        let modifiers = match key {
            KeyPress::Enter => 0,
            KeyPress::ShiftEnter => SHIFT_MODIFIER,
        };
        self.dispatch_enter(DispatchKeyEventType::KeyDown, modifiers)
            .await?;
        self.dispatch_enter(DispatchKeyEventType::KeyUp, modifiers)
            .await
    }

    async fn contains_text(&self, needles: &[String]) -> Result<bool> {
        let body = self
            .page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .context("No se pudo leer el texto de la página")?
            .into_value::<String>()
            .unwrap_or_default();
        Ok(needles.iter().any(|n| !n.is_empty() && body.contains(n.as_str())))
    }
}
