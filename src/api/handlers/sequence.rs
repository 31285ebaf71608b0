use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{CreateSequenceRequest, SequenceValue};
use crate::services::database::PostgresExecutor;

/// Create a named sequence if it does not exist yet
pub async fn create_sequence(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(payload): Json<CreateSequenceRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("Ensuring sequence {}", name);

    if payload.increment < 1 {
        return Err(AppError::Validation(
            "Sequence increment must be at least 1".to_string(),
        ));
    }

    let pool = state.postgres_pool()?;
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    state
        .sequences
        .create_if_not_exists(&PostgresExecutor::new(&tx), &name, payload.start, payload.increment)
        .await?;
    tx.commit().await?;

    Ok(Json(serde_json::json!({
        "name": name,
        "start": payload.start,
        "increment": payload.increment,
    })))
}

/// Draw the next value of a named sequence
pub async fn next_sequence_value(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<SequenceValue>, AppError> {
    let pool = state.postgres_pool()?;
    let mut client = pool.get().await?;
    let tx = client.transaction().await?;
    let value = state
        .sequences
        .next_value(&PostgresExecutor::new(&tx), &name)
        .await?;
    tx.commit().await?;

    Ok(Json(SequenceValue { name, value }))
}
