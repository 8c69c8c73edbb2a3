//! Rollback of a failed onboarding
//!
//! Removes every artifact a track could have produced, whether or not it got
//! that far: the local original, the local rendition for every known quality,
//! the remote original and the remote object for every known quality. All of
//! these deletes are no-ops for absent keys, so compensation can be re-run.
//! The catalog row goes last and only when every storage delete succeeded; a
//! partial failure leaves the row claimed for manual recovery.

use cadence_core::models::Quality;
use cadence_core::{OnboardingError, OnboardingResult};
use cadence_storage::keys::{original_local_key, original_remote_key, remote_key, variant_local_key};
use uuid::Uuid;

use crate::mover::delete_with_retry;
use crate::services::OnboardingServices;

#[tracing::instrument(skip(services), fields(track_id = %track_id))]
pub async fn compensate(services: &OnboardingServices, track_id: Uuid) -> OnboardingResult<()> {
    let qualities: Vec<Quality> = services
        .catalog
        .get_all_qualities()
        .await
        .map_err(|e| OnboardingError::Catalog(e.to_string()))?;

    let policy = services.delete_policy();
    let mut failures: Vec<String> = Vec::new();

    let mut local_keys = vec![original_local_key(track_id)];
    local_keys.extend(qualities.iter().map(|q| variant_local_key(track_id, q)));

    let mut remote_keys = vec![original_remote_key(track_id)];
    remote_keys.extend(qualities.iter().map(|q| remote_key(&q.directory, track_id)));

    for key in &local_keys {
        if let Err(e) = delete_with_retry(&services.local, key, policy).await {
            tracing::error!(error = %e, key = %key, "Compensation failed to delete local file");
            failures.push(format!("local {}: {}", key, e));
        }
    }

    for key in &remote_keys {
        if let Err(e) = services.remote.delete(key).await {
            tracing::error!(error = %e, key = %key, "Compensation failed to delete remote object");
            failures.push(format!("remote {}: {}", key, e));
        }
    }

    if !failures.is_empty() {
        tracing::error!(
            failures = failures.len(),
            "Compensation incomplete; track left claimed for manual recovery"
        );
        return Err(OnboardingError::StorageFailure(failures.join("; ")));
    }

    services
        .catalog
        .delete_track(track_id)
        .await
        .map_err(|e| OnboardingError::Catalog(e.to_string()))?;

    tracing::info!(
        local_keys = local_keys.len(),
        remote_keys = remote_keys.len(),
        "Compensation complete"
    );
    Ok(())
}
