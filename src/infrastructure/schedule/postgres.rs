//! PostgreSQL schedule repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::{DomainError, ScheduleMode, ScheduleRepository, WorkflowScheduleRecord};
use crate::infrastructure::storage::{from_bigint, to_bigint};

/// Schedule store shared by every engine instance.
///
/// `try_claim` is a single conditional UPDATE; the row lock makes it the
/// cross-process compare-and-swap.
#[derive(Debug, Clone)]
pub struct PostgresScheduleRepository {
    pool: PgPool,
}

impl PostgresScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflow_schedules (
                id TEXT PRIMARY KEY,
                workflow_key TEXT NOT NULL UNIQUE,
                mode TEXT NOT NULL,
                enabled BOOLEAN NOT NULL DEFAULT TRUE,
                interval_seconds BIGINT NOT NULL CHECK (interval_seconds > 0),
                last_run_at TIMESTAMPTZ NULL,
                next_run_at TIMESTAMPTZ NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create schedule table: {}", e)))?;

        Ok(())
    }
}

const SELECT_COLUMNS: &str = "SELECT id, workflow_key, mode, enabled, interval_seconds, \
     last_run_at, next_run_at FROM workflow_schedules";

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<WorkflowScheduleRecord, DomainError> {
    let mode: String = row.get("mode");
    let interval: i64 = row.get("interval_seconds");

    Ok(WorkflowScheduleRecord {
        id: row.get("id"),
        workflow_key: row.get("workflow_key"),
        mode: mode
            .parse::<ScheduleMode>()
            .map_err(|e| {
                DomainError::storage(format!("Invalid schedule mode in database: {}", e))
            })?,
        enabled: row.get("enabled"),
        interval_seconds: from_bigint(interval, "interval_seconds")?,
        last_run_at: row.get("last_run_at"),
        next_run_at: row.get("next_run_at"),
    })
}

fn ensure_found(rows_affected: u64, id: &str) -> Result<(), DomainError> {
    if rows_affected == 0 {
        return Err(DomainError::not_found(format!("Schedule '{}' not found", id)));
    }
    Ok(())
}

#[async_trait]
impl ScheduleRepository for PostgresScheduleRepository {
    async fn list(&self) -> Result<Vec<WorkflowScheduleRecord>, DomainError> {
        let rows = sqlx::query(&format!("{} ORDER BY id", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list schedules: {}", e)))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn list_due(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkflowScheduleRecord>, DomainError> {
        let query = format!(
            r#"{}
            WHERE mode = 'interval' AND enabled
              AND (next_run_at IS NULL OR next_run_at <= $1)
            ORDER BY id"#,
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list due schedules: {}", e)))?;

        rows.iter().map(row_to_record).collect()
    }

    async fn find_by_key(
        &self,
        workflow_key: &str,
    ) -> Result<Option<WorkflowScheduleRecord>, DomainError> {
        let row = sqlx::query(&format!("{} WHERE workflow_key = $1", SELECT_COLUMNS))
            .bind(workflow_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get schedule: {}", e)))?;

        match row {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(
        &self,
        record: WorkflowScheduleRecord,
    ) -> Result<WorkflowScheduleRecord, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO workflow_schedules
                (id, workflow_key, mode, enabled, interval_seconds, last_run_at, next_run_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET workflow_key = EXCLUDED.workflow_key,
                mode = EXCLUDED.mode,
                enabled = EXCLUDED.enabled,
                interval_seconds = EXCLUDED.interval_seconds,
                last_run_at = EXCLUDED.last_run_at,
                next_run_at = EXCLUDED.next_run_at
            "#,
        )
        .bind(&record.id)
        .bind(&record.workflow_key)
        .bind(record.mode.as_str())
        .bind(record.enabled)
        .bind(to_bigint(record.interval_seconds, "interval_seconds")?)
        .bind(record.last_run_at)
        .bind(record.next_run_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                DomainError::conflict(format!(
                    "Workflow '{}' already has a schedule",
                    record.workflow_key
                ))
            } else {
                DomainError::storage(format!("Failed to save schedule: {}", e))
            }
        })?;

        Ok(record)
    }

    async fn try_claim(&self, id: &str, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_schedules
            SET last_run_at = $2,
                next_run_at = $2 + interval_seconds * INTERVAL '1 second'
            WHERE id = $1
              AND enabled
              AND mode = 'interval'
              AND (next_run_at IS NULL OR next_run_at <= $2)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to claim schedule: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_run(&self, id: &str, now: DateTime<Utc>) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_schedules
            SET last_run_at = $2,
                next_run_at = $2 + interval_seconds * INTERVAL '1 second'
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to record schedule run: {}", e)))?;

        ensure_found(result.rows_affected(), id)
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE workflow_schedules SET enabled = $2 WHERE id = $1")
            .bind(id)
            .bind(enabled)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update schedule: {}", e)))?;

        ensure_found(result.rows_affected(), id)
    }

    async fn set_interval(&self, id: &str, interval_seconds: u64) -> Result<(), DomainError> {
        if interval_seconds == 0 {
            return Err(DomainError::validation("Interval must be at least one second"));
        }

        let result =
            sqlx::query("UPDATE workflow_schedules SET interval_seconds = $2 WHERE id = $1")
            .bind(id)
            .bind(to_bigint(interval_seconds, "interval_seconds")?)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update schedule: {}", e)))?;

        ensure_found(result.rows_affected(), id)
    }
}
