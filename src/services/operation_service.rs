use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::models::operation_model::{
    CreateOperationRequest, CreateOperationResponse, ListOperationsResponse, OperationRecord,
    OperationStatusResponse,
};

/// Historial persistente de corridas (tabla `operations`).
#[derive(Clone, Debug)]
pub struct OperationService {
    db_pool: Pool<Sqlite>,
}

impl OperationService {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        OperationService { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Fallo en migraciones de 'operations'")?;
        Ok(())
    }

    /// Crea la operación en DB con estado "pending"
    pub async fn create_operation(
        &self,
        req: CreateOperationRequest,
    ) -> Result<CreateOperationResponse> {
        let op_id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO operations (
                id, operation_type, status, error_message,
                is_async, created_at, updated_at, metadata
            )
            VALUES (?1, ?2, 'pending', NULL, ?3, ?4, ?4, ?5)
            "#,
        )
        .bind(&op_id)
        .bind(&req.operation_type)
        .bind(req.is_async as i32)
        .bind(&now)
        .bind(&req.metadata)
        .execute(&self.db_pool)
        .await
        .context("Fallo al insertar operation")?;

        Ok(CreateOperationResponse { id: op_id })
    }

    /// Actualiza estado y error
    pub async fn update_operation_status(
        &self,
        op_id: &str,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE operations
            SET status = ?2,
                error_message = ?3,
                updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(op_id)
        .bind(status)
        .bind(error_message)
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al actualizar operación")?;

        Ok(())
    }

    /// Estado final + metadata (conteos, carpeta de salida) en una sola escritura.
    pub async fn finish_operation(
        &self,
        op_id: &str,
        status: &str,
        error_message: Option<&str>,
        metadata: &serde_json::Value,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE operations
            SET status = ?2,
                error_message = ?3,
                metadata = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(op_id)
        .bind(status)
        .bind(error_message)
        .bind(metadata.to_string())
        .bind(&now)
        .execute(&self.db_pool)
        .await
        .context("Fallo al cerrar operación")?;

        Ok(())
    }

    /// Obtiene la info de una operación
    pub async fn get_operation(&self, op_id: &str) -> Result<OperationRecord> {
        let row = sqlx::query(
            r#"
            SELECT
                id, operation_type, status, error_message,
                is_async, created_at, updated_at, metadata
            FROM operations
            WHERE id = ?1
            "#,
        )
        .bind(op_id)
        .fetch_one(&self.db_pool)
        .await
        .context("No se encontró operación con ese id")?;

        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        Ok(OperationRecord {
            id: row.try_get("id")?,
            operation_type: row.try_get("operation_type")?,
            status: row.try_get("status")?,
            error_message: row.try_get("error_message")?,
            is_async: row.try_get::<i64, _>("is_async")? != 0,
            created_at: created_at.parse::<DateTime<Utc>>()?,
            updated_at: updated_at.parse::<DateTime<Utc>>()?,
            metadata: row.try_get("metadata")?,
        })
    }

    /// Lista operaciones con paginación
    pub async fn list_operations(
        &self,
        page: u64,
        page_size: u64,
    ) -> Result<ListOperationsResponse> {
        let page = page.max(1);
        let offset = (page - 1) * page_size;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM operations")
            .fetch_one(&self.db_pool)
            .await?;

        let rows = sqlx::query(
            r#"
            SELECT
                id, operation_type, status, error_message,
                is_async, created_at, updated_at, metadata
            FROM operations
            ORDER BY created_at DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(page_size as i64)
        .bind(offset as i64)
        .fetch_all(&self.db_pool)
        .await?;

        let items = rows
            .iter()
            .map(status_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(ListOperationsResponse {
            total: total as u64,
            page,
            page_size,
            items,
        })
    }

    pub async fn mark_operation_failed(&self, op_id: &str, error: String) -> Result<()> {
        self.update_operation_status(op_id, "failed", Some(&error))
            .await
    }
}

fn status_from_row(r: &SqliteRow) -> Result<OperationStatusResponse> {
    Ok(OperationStatusResponse {
        id: r.try_get("id")?,
        operation_type: r.try_get("operation_type")?,
        status: r.try_get("status")?,
        error_message: r.try_get("error_message")?,
        is_async: r.try_get::<i64, _>("is_async")? != 0,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
        metadata: r.try_get("metadata")?,
    })
}
