//! Policy persistence.
//!
//! Policies live in one JSONB-backed table; the spec is immutable only in
//! its target, the status is written exclusively through the status
//! sub-endpoint, and every admission re-validates through the compiler.

use crate::compile::{compile_policy, validate_policy, CompiledPolicy};
use activity_core::{
    ActivityError, ActivityPolicy, ActivityPolicySpec, ActivityPolicyStatus, ActivityResult,
    ObjectMeta,
};
use activity_filter::FilterCache;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;

pub struct PolicyStore {
    pool: PgPool,
}

impl PolicyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> ActivityResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS activity_policies (
                name TEXT PRIMARY KEY,
                generation BIGINT NOT NULL DEFAULT 1,
                created_at TIMESTAMPTZ NOT NULL,
                spec JSONB NOT NULL,
                status JSONB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    /// Admission: validate, compile, persist. The new policy starts in
    /// `Pending`; the reconciler moves it from there.
    pub async fn create(
        &self,
        policy: ActivityPolicy,
        cache: &FilterCache,
    ) -> ActivityResult<ActivityPolicy> {
        if policy.metadata.name.trim().is_empty() {
            return Err(ActivityError::invalid("metadata.name", "name is required"));
        }
        validate_policy(&policy.spec, cache)?;

        let created_at = Utc::now();
        let spec = serde_json::to_value(&policy.spec)?;
        let status = serde_json::to_value(ActivityPolicyStatus::default())?;
        let inserted = sqlx::query(
            "INSERT INTO activity_policies (name, generation, created_at, spec, status)
             SELECT $1, 1, $2, $3, $4
             WHERE NOT EXISTS (SELECT 1 FROM activity_policies WHERE name = $1)",
        )
        .bind(&policy.metadata.name)
        .bind(created_at)
        .bind(&spec)
        .bind(&status)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        if inserted.rows_affected() == 0 {
            return Err(ActivityError::invalid(
                "metadata.name",
                format!("policy {:?} already exists", policy.metadata.name),
            ));
        }

        self.get(&policy.metadata.name).await
    }

    pub async fn get(&self, name: &str) -> ActivityResult<ActivityPolicy> {
        let row = sqlx::query(
            "SELECT name, generation, created_at, spec, status
             FROM activity_policies WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        match row {
            Some(row) => policy_from_row(&row),
            None => Err(ActivityError::NotFound(format!(
                "activitypolicies.{} {:?} not found",
                activity_core::API_GROUP,
                name
            ))),
        }
    }

    pub async fn list(&self) -> ActivityResult<Vec<ActivityPolicy>> {
        let rows = sqlx::query(
            "SELECT name, generation, created_at, spec, status
             FROM activity_policies ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.iter().map(policy_from_row).collect()
    }

    /// Spec update. The target is immutable after create; everything else
    /// re-validates and bumps the generation.
    pub async fn update(
        &self,
        name: &str,
        spec: ActivityPolicySpec,
        cache: &FilterCache,
    ) -> ActivityResult<ActivityPolicy> {
        let existing = self.get(name).await?;
        if existing.spec.target != spec.target {
            return Err(ActivityError::invalid(
                "spec.target",
                "target is immutable after create",
            ));
        }
        validate_policy(&spec, cache)?;

        let value = serde_json::to_value(&spec)?;
        sqlx::query(
            "UPDATE activity_policies SET spec = $2, generation = generation + 1 WHERE name = $1",
        )
        .bind(name)
        .bind(&value)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        self.get(name).await
    }

    /// Status sub-endpoint write.
    pub async fn update_status(
        &self,
        name: &str,
        status: ActivityPolicyStatus,
    ) -> ActivityResult<ActivityPolicy> {
        // Existence check first for a proper 404.
        self.get(name).await?;
        let value = serde_json::to_value(&status)?;
        sqlx::query("UPDATE activity_policies SET status = $2 WHERE name = $1")
            .bind(name)
            .bind(&value)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        self.get(name).await
    }

    pub async fn delete(&self, name: &str) -> ActivityResult<()> {
        let result = sqlx::query("DELETE FROM activity_policies WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(ActivityError::NotFound(format!(
                "activitypolicies.{} {:?} not found",
                activity_core::API_GROUP,
                name
            )));
        }
        Ok(())
    }

    /// Compile every stored policy for the evaluator snapshot. Policies
    /// that no longer compile are skipped here; their status shows
    /// `Failed` through reconciliation.
    pub async fn load_compiled(
        &self,
        cache: &FilterCache,
    ) -> ActivityResult<Vec<Arc<CompiledPolicy>>> {
        let mut compiled = Vec::new();
        for policy in self.list().await? {
            match compile_policy(&policy, cache) {
                Ok(ready) => compiled.push(Arc::new(ready)),
                Err(diagnostics) => {
                    log::warn!(
                        "policy {} skipped from snapshot: {}",
                        policy.metadata.name,
                        diagnostics
                            .first()
                            .map(|d| d.message.as_str())
                            .unwrap_or("compile failed")
                    );
                }
            }
        }
        Ok(compiled)
    }
}

fn store_error(err: sqlx::Error) -> ActivityError {
    log::error!("policy store error: {}", err);
    ActivityError::ServiceUnavailable("policy store unavailable".to_string())
}

fn policy_from_row(row: &sqlx::postgres::PgRow) -> ActivityResult<ActivityPolicy> {
    let name: String = row.try_get("name").map_err(store_error)?;
    let generation: i64 = row.try_get("generation").map_err(store_error)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_error)?;
    let spec: serde_json::Value = row.try_get("spec").map_err(store_error)?;
    let status: serde_json::Value = row.try_get("status").map_err(store_error)?;
    Ok(ActivityPolicy {
        metadata: ObjectMeta {
            name,
            namespace: None,
            uid: None,
            resource_version: None,
            creation_timestamp: Some(created_at),
            generation: Some(generation),
        },
        spec: serde_json::from_value(spec)?,
        status: serde_json::from_value(status)?,
    })
}
