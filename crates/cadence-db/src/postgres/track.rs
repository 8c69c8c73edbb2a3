use async_trait::async_trait;
use cadence_core::models::{
    AudioProperties, OnboardingStatus, Quality, StoredQuality, Track,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::{CatalogError, CatalogResult, TrackCatalog};

#[derive(Debug, FromRow)]
struct TrackRow {
    id: Uuid,
    hash: Option<String>,
    original_bitrate: Option<i32>,
    sample_rate: Option<i32>,
    mimetype: Option<String>,
    original_stored: bool,
    onboarding_status: OnboardingStatus,
    created_at: DateTime<Utc>,
}

const TRACK_COLUMNS: &str = r#"
    id,
    hash,
    original_bitrate,
    sample_rate,
    mimetype,
    original_stored,
    onboarding_status,
    created_at
"#;

#[derive(Clone)]
pub struct TrackRepository {
    pool: PgPool,
}

impl TrackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: TrackRow) -> CatalogResult<Track> {
        let metadata: Vec<(i32, String)> = sqlx::query_as::<Postgres, (i32, String)>(
            "SELECT field_id, value FROM track_metadata WHERE track_id = $1",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let quality_ids: Vec<i32> = sqlx::query_scalar::<Postgres, i32>(
            "SELECT quality_id FROM track_qualities WHERE track_id = $1 ORDER BY quality_id",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;

        let mut qualities: Vec<StoredQuality> = Vec::with_capacity(quality_ids.len() + 1);
        if row.original_stored {
            qualities.push(StoredQuality::Original);
        }
        qualities.extend(quality_ids.into_iter().map(StoredQuality::Variant));

        Ok(Track {
            id: row.id,
            hash: row.hash,
            original_bitrate: row.original_bitrate,
            sample_rate: row.sample_rate,
            mimetype: row.mimetype,
            onboarding_status: row.onboarding_status,
            metadata: metadata.into_iter().collect(),
            qualities,
            created_at: row.created_at,
        })
    }

    fn ensure_updated(rows_affected: u64, id: Uuid) -> CatalogResult<()> {
        if rows_affected == 0 {
            Err(CatalogError::TrackNotFound(id))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TrackCatalog for TrackRepository {
    #[tracing::instrument(skip(self))]
    async fn create_initial_track_record(&self, id: Uuid) -> CatalogResult<()> {
        sqlx::query("INSERT INTO tracks (id, onboarding_status) VALUES ($1, 'pending')")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, track_id = %id, "Failed to insert track record");
                e
            })?;

        tracing::info!(track_id = %id, "Track record created");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_track_by_hash(&self, hash: &str) -> CatalogResult<Option<Track>> {
        let row: Option<TrackRow> = sqlx::query_as::<Postgres, TrackRow>(&format!(
            "SELECT {} FROM tracks WHERE hash = $1 ORDER BY created_at ASC LIMIT 1",
            TRACK_COLUMNS
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn set_hash(&self, id: Uuid, hash: &str) -> CatalogResult<()> {
        let result = sqlx::query("UPDATE tracks SET hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?;

        Self::ensure_updated(result.rows_affected(), id)
    }

    async fn get_all_qualities(&self) -> CatalogResult<Vec<Quality>> {
        let qualities = sqlx::query_as::<Postgres, Quality>(
            "SELECT id, bitrate, codec, extension, directory FROM qualities ORDER BY bitrate ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(qualities)
    }

    #[tracing::instrument(skip(self))]
    async fn get_track_by_id(&self, id: Uuid) -> CatalogResult<Option<Track>> {
        let row: Option<TrackRow> = sqlx::query_as::<Postgres, TrackRow>(&format!(
            "SELECT {} FROM tracks WHERE id = $1",
            TRACK_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, metadata), fields(fields = metadata.len()))]
    async fn store_metadata(&self, id: Uuid, metadata: &BTreeMap<i32, String>) -> CatalogResult<()> {
        let (field_ids, values): (Vec<i32>, Vec<String>) =
            metadata.iter().map(|(k, v)| (*k, v.clone())).unzip();

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM track_metadata WHERE track_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO track_metadata (track_id, field_id, value)
            SELECT $1, field_id, value
            FROM UNNEST($2::int4[], $3::text[]) AS m(field_id, value)
            "#,
        )
        .bind(id)
        .bind(field_ids)
        .bind(values)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn store_audio_properties(&self, id: Uuid, properties: &AudioProperties) -> CatalogResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tracks
            SET original_bitrate = $2,
                sample_rate = $3,
                mimetype = $4,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(properties.bitrate)
        .bind(properties.sample_rate)
        .bind(&properties.mimetype)
        .execute(&self.pool)
        .await?;

        Self::ensure_updated(result.rows_affected(), id)
    }

    #[tracing::instrument(skip(self))]
    async fn store_quality_record(&self, id: Uuid, quality: StoredQuality) -> CatalogResult<()> {
        match quality {
            StoredQuality::Original => {
                let result = sqlx::query(
                    "UPDATE tracks SET original_stored = TRUE, updated_at = NOW() WHERE id = $1",
                )
                .bind(id)
                .execute(&self.pool)
                .await?;
                Self::ensure_updated(result.rows_affected(), id)
            }
            StoredQuality::Variant(quality_id) => {
                sqlx::query(
                    r#"
                    INSERT INTO track_qualities (track_id, quality_id)
                    VALUES ($1, $2)
                    ON CONFLICT (track_id, quality_id) DO NOTHING
                    "#,
                )
                .bind(id)
                .bind(quality_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    let violation = e.as_database_error().and_then(|db| {
                        db.is_foreign_key_violation()
                            .then(|| db.constraint().unwrap_or_default().to_string())
                    });
                    match violation {
                        Some(constraint) if constraint.contains("quality_id") => {
                            CatalogError::UnknownQuality(quality_id)
                        }
                        Some(_) => CatalogError::TrackNotFound(id),
                        None => CatalogError::Database(e),
                    }
                })?;
                Ok(())
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_track(&self, id: Uuid) -> CatalogResult<()> {
        let result = sqlx::query("DELETE FROM tracks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        tracing::info!(
            track_id = %id,
            deleted = result.rows_affected() > 0,
            "Track record deleted"
        );
        Ok(())
    }

    async fn get_allowed_metadata_fields(&self) -> CatalogResult<HashMap<String, i32>> {
        let rows: Vec<(String, i32)> =
            sqlx::query_as::<Postgres, (String, i32)>("SELECT name, id FROM metadata_fields")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().collect())
    }
}
