use async_trait::async_trait;
use cadence_core::models::{OnboardingStatus, WorkItem};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use crate::{CatalogError, CatalogResult, WorkQueue};

/// Onboarding queue over the `tracks` table.
///
/// Claims use `FOR UPDATE SKIP LOCKED`, so any number of worker loops across
/// processes can poll the same table without handing out an item twice.
#[derive(Clone)]
pub struct OnboardingQueue {
    pool: PgPool,
}

impl OnboardingQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_status(&self, id: Uuid) -> CatalogResult<Option<OnboardingStatus>> {
        let status: Option<OnboardingStatus> =
            sqlx::query_scalar::<Postgres, OnboardingStatus>(
                "SELECT onboarding_status FROM tracks WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(status)
    }

    async fn state_error(&self, id: Uuid, expected: &'static str) -> CatalogError {
        match self.current_status(id).await {
            Ok(Some(actual)) => CatalogError::InvalidState {
                id,
                expected,
                actual: actual.to_string(),
            },
            Ok(None) => CatalogError::TrackNotFound(id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl WorkQueue for OnboardingQueue {
    #[tracing::instrument(skip(self))]
    async fn claim_next(&self) -> CatalogResult<Option<WorkItem>> {
        let mut tx = self.pool.begin().await?;

        let id: Option<Uuid> = sqlx::query_scalar::<Postgres, Uuid>(
            r#"
            SELECT id
            FROM tracks
            WHERE onboarding_status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = id else {
            tx.rollback().await.ok();
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE tracks
            SET onboarding_status = 'claimed',
                claimed_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await.map_err(|e| {
            tracing::error!(error = %e, track_id = %id, "Failed to commit claim");
            e
        })?;

        tracing::debug!(track_id = %id, "Work item claimed");

        Ok(Some(WorkItem::new(id)))
    }

    #[tracing::instrument(skip(self))]
    async fn release_complete(&self, id: Uuid) -> CatalogResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tracks
            SET onboarding_status = 'onboarded',
                claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND onboarding_status = 'claimed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.state_error(id, "claimed").await);
        }

        tracing::debug!(track_id = %id, "Work item released");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn reset_status(&self, id: Uuid) -> CatalogResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tracks
            SET onboarding_status = 'pending',
                claimed_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND onboarding_status = 'claimed'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.state_error(id, "claimed").await);
        }

        tracing::info!(track_id = %id, "Work item claim reset");
        Ok(())
    }
}
