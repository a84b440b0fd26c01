//! handlers/mod.rs
//! Handlers HTTP (envío masivo e historial de operaciones).
pub mod broadcast_handler;
pub mod operation_handler;
