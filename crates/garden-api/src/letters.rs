use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use garden_db::models::LetterRow;
use garden_db::{format_timestamp, parse_timestamp};
use garden_types::api::{Claims, CreateLetterRequest, UpdateLetterRequest};
use garden_types::models::Letter;

use crate::error::ApiError;
use crate::{AppState, run_db};

const NOT_FOUND: &str = "Letter not found";

/// GET /api/letters: most recently touched first.
pub async fn list_letters(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, |db| db.list_letters()).await?;
    let letters: Vec<Letter> = rows.into_iter().map(letter).collect();
    Ok(Json(letters))
}

pub async fn create_letter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateLetterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let (title, content) = match (req.title, req.content) {
        (Some(t), Some(c)) if !t.trim().is_empty() && !c.trim().is_empty() => (t, c),
        _ => return Err(ApiError::Validation("Title and content are required".into())),
    };

    let now = format_timestamp(Utc::now());
    let row = LetterRow {
        id: Uuid::new_v4().to_string(),
        title,
        content,
        created_at: now.clone(),
        updated_at: now,
    };

    let insert = row.clone();
    run_db(&state, move |db| db.insert_letter(&insert)).await?;

    info!("Letter {} written by {}", row.id, claims.username);
    Ok((StatusCode::CREATED, Json(letter(row))))
}

/// PUT /api/letters/{id}: fields left out of the body keep their value.
pub async fn update_letter(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateLetterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    if req.title.is_none() && req.content.is_none() {
        return Err(ApiError::Validation("Title or content is required".into()));
    }
    let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&req.title) || blank(&req.content) {
        return Err(ApiError::Validation("Title and content must not be empty".into()));
    }

    let updated = run_db(&state, move |db| {
        db.update_letter(&id, req.title.as_deref(), req.content.as_deref(), Utc::now())
    })
    .await?
    .ok_or(ApiError::NotFound(NOT_FOUND))?;

    info!("Letter {} updated", updated.id);
    Ok(Json(letter(updated)))
}

pub async fn delete_letter(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let delete_id = id.clone();
    let deleted = run_db(&state, move |db| db.delete_letter(&delete_id)).await?;
    if !deleted {
        return Err(ApiError::NotFound(NOT_FOUND));
    }

    info!("Letter {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

fn letter(row: LetterRow) -> Letter {
    let timestamp = |raw: &str| {
        parse_timestamp(raw).unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on letter {}: {}", raw, row.id, e);
            Default::default()
        })
    };

    Letter {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt letter id '{}': {}", row.id, e);
            Uuid::default()
        }),
        created_at: timestamp(&row.created_at),
        updated_at: timestamp(&row.updated_at),
        title: row.title,
        content: row.content,
    }
}
