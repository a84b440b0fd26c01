//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod broadcast_model;
pub mod operation_model;
pub mod recipient_model;
pub mod report_model;
