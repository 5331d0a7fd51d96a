use std::path::PathBuf;

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use garden_db::models::MediaRow;
use garden_db::{format_timestamp, parse_timestamp};
use garden_types::api::Claims;
use garden_types::models::{MediaItem, MediaKind};

use crate::error::ApiError;
use crate::storage::{Storage, stored_name_for};
use crate::{AppState, run_db};

/// A file received in the current request, still in the staging directory.
struct StagedFile {
    path: PathBuf,
    original_name: String,
}

/// Routes for one media kind: `/api/{photos|videos}` and `/api/{..}/{id}`.
pub fn routes(kind: MediaKind) -> Router<AppState> {
    let collection = format!("/api/{}", kind.plural());
    let item = format!("{}/{{id}}", collection);

    Router::new()
        .route(&collection, get(list_media).post(upload_media))
        .route(&item, delete(delete_media))
        .layer(Extension(kind))
        .layer(DefaultBodyLimit::max(kind.max_body_bytes()))
}

/// GET /api/{kind}: newest first.
pub async fn list_media(
    State(state): State<AppState>,
    Extension(kind): Extension<MediaKind>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = run_db(&state, move |db| db.list_media(kind)).await?;
    let items: Vec<MediaItem> = rows.into_iter().map(media_item).collect();
    Ok(Json(items))
}

/// POST /api/{kind}: multipart upload of up to `kind.max_files()` files
/// sharing one `category`.
///
/// Files are streamed to the staging directory while the form is read. Only
/// once the whole form is valid are they renamed into the public directory
/// and recorded in one transaction. On any failure every file written for
/// this request is removed again and no rows are committed.
pub async fn upload_media(
    State(state): State<AppState>,
    Extension(kind): Extension<MediaKind>,
    Extension(claims): Extension<Claims>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart?;
    let mut staged: Vec<StagedFile> = Vec::new();

    let category = match receive_form(&state.storage, kind, &mut multipart, &mut staged).await {
        Ok(category) => category,
        Err(e) => {
            discard_staged(&state.storage, &staged).await;
            return Err(e);
        }
    };

    if staged.is_empty() {
        return Err(ApiError::Validation("No files uploaded".into()));
    }
    let category = match category {
        Some(c) if !c.trim().is_empty() => c.trim().to_string(),
        _ => {
            discard_staged(&state.storage, &staged).await;
            return Err(ApiError::Validation("Category is required".into()));
        }
    };

    let now = Utc::now();
    let created_at = format_timestamp(now);
    let mut promoted: Vec<PathBuf> = Vec::with_capacity(staged.len());
    let mut rows: Vec<MediaRow> = Vec::with_capacity(staged.len());

    for file in &staged {
        let stored_name = stored_name_for(&file.original_name, now);
        match state.storage.promote(&file.path, kind, &stored_name).await {
            Ok(path) => promoted.push(path),
            Err(e) => {
                error!("Failed to move staged {} into place: {}", kind, e);
                discard_staged(&state.storage, &staged).await;
                discard_paths(&state.storage, &promoted).await;
                return Err(ApiError::Storage(e));
            }
        }
        rows.push(MediaRow {
            id: Uuid::new_v4().to_string(),
            name: file.original_name.clone(),
            url: kind.public_url(&stored_name),
            stored_name,
            category: category.clone(),
            created_at: created_at.clone(),
        });
    }

    let batch = rows.clone();
    if let Err(e) = run_db(&state, move |db| db.insert_media_batch(kind, &batch)).await {
        discard_paths(&state.storage, &promoted).await;
        return Err(e);
    }

    info!(
        "Stored {} {} file(s) in category '{}' for {}",
        rows.len(),
        kind,
        category,
        claims.username
    );

    let items: Vec<MediaItem> = rows.into_iter().map(media_item).collect();
    Ok((StatusCode::CREATED, Json(items)))
}

/// DELETE /api/{kind}/{id}: removes the stored file, then the record.
pub async fn delete_media(
    State(state): State<AppState>,
    Extension(kind): Extension<MediaKind>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let lookup_id = id.clone();
    let row = run_db(&state, move |db| db.get_media(kind, &lookup_id))
        .await?
        .ok_or(ApiError::NotFound(kind.not_found_message()))?;

    // A file that cannot be removed is left behind as a logged orphan; the
    // record goes regardless.
    if let Err(e) = state.storage.delete_file(kind, &row.stored_name).await {
        warn!("Failed to delete {} file {}: {}", kind, row.stored_name, e);
    }

    let delete_id = id.clone();
    let deleted = run_db(&state, move |db| db.delete_media(kind, &delete_id)).await?;
    if !deleted {
        return Err(ApiError::NotFound(kind.not_found_message()));
    }

    info!("Deleted {} {}", kind, id);
    Ok(StatusCode::NO_CONTENT)
}

/// Reads the multipart form, streaming each file part into staging.
/// Returns the `category` field if one was sent.
async fn receive_form(
    storage: &Storage,
    kind: MediaKind,
    multipart: &mut Multipart,
    staged: &mut Vec<StagedFile>,
) -> Result<Option<String>, ApiError> {
    let mut category = None;

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == "category" {
            category = Some(field.text().await?);
            continue;
        }
        if !is_file_field(kind, &name) {
            debug!("Ignoring multipart field '{}'", name);
            continue;
        }

        // Browsers send an empty part for an untouched file input.
        let original_name = match field.file_name() {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => continue,
        };

        if staged.len() >= kind.max_files() {
            return Err(ApiError::Validation(format!(
                "At most {} {} can be uploaded at once",
                kind.max_files(),
                kind.plural()
            )));
        }

        let (path, mut file) = storage.create_staged().await?;
        staged.push(StagedFile {
            path: path.clone(),
            original_name,
        });

        while let Some(chunk) = field.chunk().await? {
            file.write_all(&chunk).await.map_err(anyhow::Error::from)?;
        }
        file.flush().await.map_err(anyhow::Error::from)?;
        debug!("Staged {} upload at {}", kind, path.display());
    }

    Ok(category)
}

/// File parts may be named `files`, `files[]` or after the kind itself.
fn is_file_field(kind: MediaKind, name: &str) -> bool {
    name == "files" || name == "files[]" || name == kind.plural()
}

async fn discard_staged(storage: &Storage, staged: &[StagedFile]) {
    for file in staged {
        storage.discard(&file.path).await;
    }
}

async fn discard_paths(storage: &Storage, paths: &[PathBuf]) {
    for path in paths {
        storage.discard(path).await;
    }
}

fn media_item(row: MediaRow) -> MediaItem {
    MediaItem {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt media id '{}': {}", row.id, e);
            Uuid::default()
        }),
        created_at: parse_timestamp(&row.created_at).unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on media {}: {}", row.created_at, row.id, e);
            Default::default()
        }),
        name: row.name,
        url: row.url,
        category: row.category,
    }
}
