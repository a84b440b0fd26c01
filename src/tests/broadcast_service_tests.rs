//! tests/broadcast_service_tests.rs
//! Validaciones de la API y ciclo de vida de una corrida programada.
//! Las corridas se programan a futuro y se cancelan antes de abrir el navegador.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Local;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::{Pool, Sqlite};
    use tempfile::tempdir;

    use crate::config::broadcast_config::BroadcastGlobalConfig;
    use crate::models::broadcast_model::BroadcastRequest;
    use crate::models::operation_model::CreateOperationRequest;
    use crate::services::broadcast_service::{BroadcastService, StartError};
    use crate::services::operation_service::OperationService;
    use crate::tests::fakes::test_config;

    async fn create_test_services(root: &Path) -> (BroadcastService, OperationService) {
        create_services_with(test_config(root)).await
    }

    async fn create_services_with(
        config: BroadcastGlobalConfig,
    ) -> (BroadcastService, OperationService) {
        let options = SqliteConnectOptions::new()
            .filename(&config.database_path)
            .create_if_missing(true);
        let pool = Pool::<Sqlite>::connect_with(options)
            .await
            .expect("no se pudo abrir sqlite");
        let op_service = OperationService::new(pool);
        op_service.run_migrations().await.expect("migraciones");
        (
            BroadcastService::new(Arc::new(config), op_service.clone()),
            op_service,
        )
    }

    fn request(file_path: &Path) -> BroadcastRequest {
        BroadcastRequest {
            file_path: file_path.to_string_lossy().to_string(),
            template: Some("Hola {name}".to_string()),
            message_override: None,
            speed_mode: Some("turbo".to_string()),
            min_delay_secs: None,
            max_delay_secs: None,
            only_unsent: false,
            start_at: Some(Local::now().naive_local() + chrono::Duration::hours(1)),
        }
    }

    fn contacts(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("contacts.csv");
        fs::write(&path, "phone,name,status\n5551112233,Ana,Sent\n5552223344,Bob,\n").unwrap();
        path
    }

    async fn wait_for_status(service: &BroadcastService, op_id: &str, wanted: &str) -> bool {
        for _ in 0..200 {
            if service.state(op_id).map(|s| s.status) == Some(wanted.to_string()) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[actix_rt::test]
    async fn test_rejects_invalid_requests() {
        let dir = tempdir().unwrap();
        let (service, _) = create_test_services(dir.path()).await;
        let file = contacts(dir.path());

        let mut req = request(&file);
        req.speed_mode = Some("ludicrous".to_string());
        assert!(matches!(service.start_broadcast(req).await, Err(StartError::Invalid(_))));

        let mut req = request(&file);
        req.min_delay_secs = Some(-1.0);
        assert!(matches!(service.start_broadcast(req).await, Err(StartError::Invalid(_))));

        // Demoras enormes o no finitas no llegan a la corrida
        for bad_delay in [1e300, f64::NAN, f64::INFINITY] {
            let mut req = request(&file);
            req.max_delay_secs = Some(bad_delay);
            assert!(matches!(service.start_broadcast(req).await, Err(StartError::Invalid(_))));
        }

        let mut req = request(&file);
        req.start_at = Some(Local::now().naive_local() - chrono::Duration::minutes(1));
        assert!(matches!(service.start_broadcast(req).await, Err(StartError::Invalid(_))));

        let req = request(&dir.path().join("no_existe.csv"));
        assert!(matches!(service.start_broadcast(req).await, Err(StartError::Invalid(_))));

        let bad = dir.path().join("bad.csv");
        fs::write(&bad, "name\nAna\n").unwrap();
        match service.start_broadcast(request(&bad)).await {
            Err(StartError::Invalid(msg)) => assert!(msg.contains("missing required column: phone")),
            other => panic!("se esperaba Invalid, llegó {:?}", other.map(|r| r.operation_id)),
        }
    }

    #[actix_rt::test]
    async fn test_only_unsent_counts_after_filter() {
        let dir = tempdir().unwrap();
        let (service, _) = create_test_services(dir.path()).await;
        let mut req = request(&contacts(dir.path()));
        req.only_unsent = true;

        let resp = service.start_broadcast(req).await.unwrap();
        assert_eq!(resp.total, 1);
        assert_eq!(service.cancel(&resp.operation_id), Some(true));
        assert!(wait_for_status(&service, &resp.operation_id, "cancelled").await);
    }

    #[actix_rt::test]
    async fn test_second_run_is_busy_until_first_finishes() {
        let dir = tempdir().unwrap();
        let (service, op_service) = create_test_services(dir.path()).await;
        let file = contacts(dir.path());

        let first = service.start_broadcast(request(&file)).await.unwrap();
        assert_eq!(first.total, 2);
        assert!(wait_for_status(&service, &first.operation_id, "running").await);

        assert!(matches!(
            service.start_broadcast(request(&file)).await,
            Err(StartError::Busy(_))
        ));

        let state = service.state(&first.operation_id).unwrap();
        assert_eq!(state.total, 2);
        assert_eq!(state.processed, 0);
        assert!(!state.cancel_requested);

        assert_eq!(service.cancel(&first.operation_id), Some(true));
        assert!(wait_for_status(&service, &first.operation_id, "cancelled").await);
        assert_eq!(service.cancel(&first.operation_id), Some(false));
        assert_eq!(service.cancel("no-existe"), None);

        // Historial persistido
        let record = op_service.get_operation(&first.operation_id).await.unwrap();
        assert_eq!(record.status, "cancelled");
        assert_eq!(record.operation_type, "broadcast");
        let metadata: serde_json::Value =
            serde_json::from_str(&record.metadata.unwrap()).unwrap();
        assert_eq!(metadata["total"], 0);
        assert_eq!(metadata["cancelled"], true);

        // Libre para otra corrida
        let second = service.start_broadcast(request(&file)).await.unwrap();
        assert_ne!(second.operation_id, first.operation_id);
        service.cancel(&second.operation_id);
        assert!(wait_for_status(&service, &second.operation_id, "cancelled").await);

        let list = op_service.list_operations(1, 10).await.unwrap();
        assert_eq!(list.total, 2);
    }

    #[actix_rt::test]
    async fn test_panicking_run_releases_active_slot() {
        let dir = tempdir().unwrap();
        let (service, _) = create_test_services(dir.path()).await;

        let guard = service.reserve("op-roto", 3).unwrap();
        assert!(matches!(service.reserve("op-otro", 1), Err(StartError::Busy(_))));

        let task = tokio::spawn(async move {
            let _guard = guard;
            panic!("fallo inesperado dentro de la corrida");
        });
        assert!(task.await.is_err());

        assert_eq!(service.state("op-roto").unwrap().status, "failed");
        let next = service.reserve("op-otro", 1).unwrap();
        next.finish("done");
        assert_eq!(service.state("op-otro").unwrap().status, "done");
    }

    #[actix_rt::test]
    async fn test_finished_runs_are_evicted_beyond_limit() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.retained_runs = 1;
        let (service, _) = create_services_with(config).await;

        service.reserve("op-1", 1).unwrap().finish("done");
        assert!(service.state("op-1").is_some());

        let second = service.reserve("op-2", 1).unwrap();
        // La activa nunca se poda
        assert!(service.state("op-1").is_some());
        assert_eq!(service.state("op-2").unwrap().status, "pending");
        second.finish("cancelled");

        assert!(service.state("op-1").is_none());
        assert_eq!(service.state("op-2").unwrap().status, "cancelled");
    }

    #[actix_rt::test]
    async fn test_create_operation_returns_only_id() {
        let dir = tempdir().unwrap();
        let (_, op_service) = create_test_services(dir.path()).await;
        let op = op_service
            .create_operation(CreateOperationRequest {
                operation_type: "broadcast".to_string(),
                is_async: true,
                metadata: None,
            })
            .await
            .unwrap();

        let body = serde_json::to_value(&op).unwrap();
        assert_eq!(body, serde_json::json!({ "id": op.id }));
        assert_eq!(op_service.get_operation(&op.id).await.unwrap().status, "pending");
    }

    #[actix_rt::test]
    async fn test_unknown_run_lookups() {
        let dir = tempdir().unwrap();
        let (service, _) = create_test_services(dir.path()).await;
        assert!(service.state("x").is_none());
        assert!(service.results("x").is_none());
        assert!(service.report_path("x").is_none());
        assert!(matches!(service.retry_export("x"), Err(StartError::Invalid(_))));
    }
}
