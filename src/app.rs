//! app.rs
use crate::handlers::{broadcast_handler, operation_handler};
use actix_web::web;

pub fn init_app(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::scope("/broadcast")
                    .route(
                        "",
                        web::post().to(broadcast_handler::start_broadcast_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(broadcast_handler::broadcast_state_endpoint),
                    )
                    .route(
                        "/{id}/cancel",
                        web::post().to(broadcast_handler::cancel_broadcast_endpoint),
                    )
                    .route(
                        "/{id}/results",
                        web::get().to(broadcast_handler::broadcast_results_endpoint),
                    )
                    .route(
                        "/{id}/report",
                        web::get().to(broadcast_handler::broadcast_report_endpoint),
                    )
                    .route(
                        "/{id}/export",
                        web::post().to(broadcast_handler::export_broadcast_endpoint),
                    ),
            )
            .service(
                web::scope("/operations")
                    .route(
                        "",
                        web::get().to(operation_handler::list_operations_endpoint),
                    )
                    .route(
                        "/{id}",
                        web::get().to(operation_handler::get_operation_endpoint),
                    ),
            ),
    );
}
