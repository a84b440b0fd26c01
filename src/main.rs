use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Pool, Sqlite};

use crate::config::broadcast_config::BroadcastGlobalConfig;
use crate::logger::init_logger;
use crate::services::broadcast_service::BroadcastService;
use crate::services::operation_service::OperationService;

mod app;
mod config;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(config: &BroadcastGlobalConfig) -> Pool<Sqlite> {
    // 1) Crear carpeta de la base
    if let Some(parent) = config.database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).expect("No se pudo crear directorio de la base");
        }
    }

    log::info!("Conectando a SQLite en {:?}", config.database_path);

    // 2) Conectarnos con SQLx (crea el archivo si no existe)
    let options = SqliteConnectOptions::new()
        .filename(&config.database_path)
        .create_if_missing(true);
    Pool::<Sqlite>::connect_with(options)
        .await
        .expect("No se pudo conectar a la base de datos SQLite.")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = Arc::new(BroadcastGlobalConfig::from_env());
    log::info!(
        "Configuración: modo={}, prefijo={}, salida={:?}",
        config.default_speed_mode,
        config.country_prefix,
        config.output_root
    );

    // Conectarnos a la DB
    let db_pool = setup_database(&config).await;

    // OperationService
    let operation_service = OperationService::new(db_pool.clone());
    if let Err(e) = operation_service.run_migrations().await {
        panic!("Fallo en migraciones de 'operations': {:?}", e);
    }

    // BroadcastService
    let broadcast_service = BroadcastService::new(config.clone(), operation_service.clone());

    // Levantar servidor
    let bind = (config.bind_host.clone(), config.bind_port);
    log::info!("Levantando servidor en {}:{}", bind.0, bind.1);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(operation_service.clone()))
            .app_data(web::Data::new(broadcast_service.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind(bind)?
    .run()
    .await
}
