//! tests/mod.rs
//! Pruebas unitarias. El navegador se reemplaza por páginas simuladas (`fakes`).

mod broadcast_service_tests;
mod message_resolver_tests;
mod pacing_tests;
mod result_aggregator_tests;
