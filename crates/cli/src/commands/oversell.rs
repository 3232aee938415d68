//! Oversell maintenance.

use liveshop_admin::db::{LiveOrderRepository, RepositoryError};
use liveshop_core::LivePhaseId;
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum OversellError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Recompute failed: {0}")]
    Repository(#[from] RepositoryError),
}

/// Rebuild sold quantities and oversell flags for every product of a phase.
pub async fn recompute(phase: i32) -> Result<(), OversellError> {
    let pool = connect().await?;
    let phase_id = LivePhaseId::new(phase);

    let reports = LiveOrderRepository::new(&pool)
        .recompute_phase(phase_id)
        .await?;

    for (product_id, report) in &reports {
        tracing::info!(
            product_id = product_id.as_i32(),
            total_ordered = report.total_ordered,
            oversold_units = report.oversold_units,
            "Recomputed product"
        );
    }
    tracing::info!("Recomputed {} products in phase {}", reports.len(), phase_id);
    Ok(())
}
