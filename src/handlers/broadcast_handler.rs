//! handlers/broadcast_handler.rs
//! Endpoints del envío masivo: lanzar, consultar, cancelar y bajar el reporte.

use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde_json::json;

use crate::models::broadcast_model::{BroadcastRequest, BroadcastResultsResponse};
use crate::services::broadcast_service::{BroadcastService, StartError};

fn not_found(op_id: &str) -> HttpResponse {
    HttpResponse::NotFound().json(json!({
        "error": "Broadcast not found",
        "details": format!("No hay corrida con id {}", op_id)
    }))
}

/// POST /api/broadcast
pub async fn start_broadcast_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    body: web::Json<BroadcastRequest>,
) -> HttpResponse {
    let req_data = body.into_inner();
    log::info!("(start_broadcast_endpoint) Archivo: {}", req_data.file_path);

    match broadcast_service.start_broadcast(req_data).await {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(StartError::Invalid(msg)) => HttpResponse::BadRequest().json(json!({
            "error": "Invalid request",
            "details": msg
        })),
        Err(StartError::Busy(msg)) => HttpResponse::Conflict().json(json!({
            "error": "Broadcast already running",
            "details": msg
        })),
        Err(StartError::Internal(e)) => {
            log::error!("(start_broadcast_endpoint) {:?}", e);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error",
                "details": format!("{:#}", e)
            }))
        }
    }
}

/// GET /api/broadcast/{id}
pub async fn broadcast_state_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    path: web::Path<String>,
) -> HttpResponse {
    let op_id = path.into_inner();
    match broadcast_service.state(&op_id) {
        Some(state) => HttpResponse::Ok().json(state),
        None => not_found(&op_id),
    }
}

/// POST /api/broadcast/{id}/cancel
pub async fn cancel_broadcast_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    path: web::Path<String>,
) -> HttpResponse {
    let op_id = path.into_inner();
    match broadcast_service.cancel(&op_id) {
        Some(true) => HttpResponse::Accepted().json(json!({
            "success": true,
            "operation_id": op_id,
            "message": "Cancellation requested"
        })),
        Some(false) => HttpResponse::Conflict().json(json!({
            "error": "Broadcast already finished",
            "details": format!("La corrida {} ya terminó", op_id)
        })),
        None => not_found(&op_id),
    }
}

/// GET /api/broadcast/{id}/results
pub async fn broadcast_results_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    path: web::Path<String>,
) -> HttpResponse {
    let op_id = path.into_inner();
    match broadcast_service.results(&op_id) {
        Some(results) => HttpResponse::Ok().json(BroadcastResultsResponse {
            operation_id: op_id,
            results,
        }),
        None => not_found(&op_id),
    }
}

/// GET /api/broadcast/{id}/report
/// Sirve el Excel de resultados de la corrida.
pub async fn broadcast_report_endpoint(
    req: HttpRequest,
    broadcast_service: web::Data<BroadcastService>,
    path: web::Path<String>,
) -> HttpResponse {
    let op_id = path.into_inner();
    let report_path = match broadcast_service.report_path(&op_id) {
        Some(p) => p,
        None => {
            return HttpResponse::NotFound().json(json!({
                "error": "Report not available",
                "details": format!("La corrida {} no tiene reporte", op_id)
            }))
        }
    };

    match NamedFile::open(&report_path) {
        Ok(file) => file.respond_to(&req).map_into_boxed_body(),
        Err(e) => {
            log::error!("(broadcast_report_endpoint) {:?}: {}", report_path, e);
            HttpResponse::NotFound().json(json!({
                "error": "Report not available",
                "details": e.to_string()
            }))
        }
    }
}

/// POST /api/broadcast/{id}/export
/// Reintenta escribir el reporte si falló al final de la corrida.
pub async fn export_broadcast_endpoint(
    broadcast_service: web::Data<BroadcastService>,
    path: web::Path<String>,
) -> HttpResponse {
    let op_id = path.into_inner();
    match broadcast_service.retry_export(&op_id) {
        Ok(report_path) => HttpResponse::Ok().json(json!({
            "success": true,
            "operation_id": op_id,
            "report_path": report_path.display().to_string()
        })),
        Err(StartError::Invalid(msg)) | Err(StartError::Busy(msg)) => {
            HttpResponse::BadRequest().json(json!({
                "error": "Export not possible",
                "details": msg
            }))
        }
        Err(StartError::Internal(e)) => HttpResponse::InternalServerError().json(json!({
            "error": "Internal server error",
            "details": format!("{:#}", e)
        })),
    }
}
