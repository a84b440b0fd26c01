//! services/mod.rs
//! Capas de negocio: carga de contactos, sesión de navegador, envío,
//! ritmo entre envíos, reporte y el registro de corridas para la API.

pub mod attempt_log;
pub mod broadcast_runner;
pub mod broadcast_service;
pub mod contact_loader;
pub mod message_resolver;
pub mod operation_service;
pub mod pacing;
pub mod result_aggregator;
pub mod send_engine;
pub mod session_service;
