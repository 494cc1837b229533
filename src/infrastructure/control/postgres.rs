//! PostgreSQL control repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::{ControlRepository, ControlState, CycleBudget, DomainError};
use crate::infrastructure::storage::{from_bigint, to_bigint};

/// Single-row control table; each mutation is one conditional UPDATE
#[derive(Debug, Clone)]
pub struct PostgresControlRepository {
    pool: PgPool,
}

impl PostgresControlRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the table and seed its only row with `budget_tokens`
    pub async fn ensure_table(&self, budget_tokens: u64) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agent_control (
                id SMALLINT PRIMARY KEY CHECK (id = 1),
                scheduler_enabled BOOLEAN NOT NULL DEFAULT TRUE,
                agents_enabled BOOLEAN NOT NULL DEFAULT TRUE,
                paused_until TIMESTAMPTZ NULL,
                budget_limit BIGINT NOT NULL CHECK (budget_limit >= 0),
                budget_reserved BIGINT NOT NULL DEFAULT 0 CHECK (budget_reserved >= 0),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create control table: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO agent_control (id, budget_limit)
            VALUES (1, $1)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(to_bigint(budget_tokens, "budget_limit")?)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to seed control row: {}", e)))?;

        Ok(())
    }

    async fn update_flag(&self, column: &str, value: bool) -> Result<(), DomainError> {
        let query = format!(
            "UPDATE agent_control SET {} = $1, updated_at = NOW() WHERE id = 1",
            column
        );

        let result = sqlx::query(&query)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to update {}: {}", column, e)))?;

        ensure_seeded(result.rows_affected())
    }
}

fn ensure_seeded(rows_affected: u64) -> Result<(), DomainError> {
    if rows_affected == 0 {
        return Err(DomainError::storage("Control row is missing; run ensure_table first"));
    }
    Ok(())
}

fn row_to_state(row: &sqlx::postgres::PgRow) -> Result<ControlState, DomainError> {
    let limit: i64 = row.get("budget_limit");
    let reserved: i64 = row.get("budget_reserved");

    Ok(ControlState {
        scheduler_enabled: row.get("scheduler_enabled"),
        agents_enabled: row.get("agents_enabled"),
        paused_until: row.get("paused_until"),
        budget: CycleBudget {
            limit_tokens: from_bigint(limit, "budget_limit")?,
            reserved_tokens: from_bigint(reserved, "budget_reserved")?,
        },
    })
}

#[async_trait]
impl ControlRepository for PostgresControlRepository {
    async fn get(&self) -> Result<ControlState, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT scheduler_enabled, agents_enabled, paused_until,
                   budget_limit, budget_reserved
            FROM agent_control
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to load control state: {}", e)))?;

        match row {
            Some(row) => row_to_state(&row),
            None => Err(DomainError::storage(
                "Control row is missing; run ensure_table first",
            )),
        }
    }

    async fn set_scheduler_enabled(&self, enabled: bool) -> Result<(), DomainError> {
        self.update_flag("scheduler_enabled", enabled).await
    }

    async fn set_agents_enabled(&self, enabled: bool) -> Result<(), DomainError> {
        self.update_flag("agents_enabled", enabled).await
    }

    async fn set_paused_until(&self, until: Option<DateTime<Utc>>) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE agent_control SET paused_until = $1, updated_at = NOW() WHERE id = 1",
        )
        .bind(until)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update pause window: {}", e)))?;

        ensure_seeded(result.rows_affected())
    }

    async fn try_reserve_budget(&self, tokens: u64) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE agent_control
            SET budget_reserved = budget_reserved + $1, updated_at = NOW()
            WHERE id = 1 AND budget_limit - budget_reserved >= $1
            "#,
        )
        .bind(to_bigint(tokens, "tokens")?)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to reserve budget: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    async fn settle_budget(&self, reserved: u64, actual: u64) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE agent_control
            SET budget_reserved = GREATEST(budget_reserved - $1, 0) + $2, updated_at = NOW()
            WHERE id = 1
            "#,
        )
        .bind(to_bigint(reserved, "reserved")?)
        .bind(to_bigint(actual, "actual")?)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to settle budget: {}", e)))?;

        ensure_seeded(result.rows_affected())
    }

    async fn reset_budget(&self, limit_tokens: Option<u64>) -> Result<(), DomainError> {
        let limit = limit_tokens
            .map(|limit| to_bigint(limit, "budget_limit"))
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE agent_control
            SET budget_limit = COALESCE($1, budget_limit), budget_reserved = 0, updated_at = NOW()
            WHERE id = 1
            "#,
        )
        .bind(limit)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to reset budget: {}", e)))?;

        ensure_seeded(result.rows_affected())
    }
}
