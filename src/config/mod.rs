//! config/mod.rs
//! Configuración global del servicio (perfil del navegador, tiempos, selectores).

pub mod broadcast_config;
pub mod selectors;
pub mod speed_mode;
