use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two binary content kinds. Each has its own table, upload directory
/// and per-request file cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub const ALL: [MediaKind; 2] = [MediaKind::Photo, MediaKind::Video];

    /// Plural name, used for the table, the upload directory and the URL segment.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Photo => "photos",
            Self::Video => "videos",
        }
    }

    /// Maximum number of files accepted in a single upload request.
    pub fn max_files(self) -> usize {
        match self {
            Self::Photo => 10,
            Self::Video => 5,
        }
    }

    /// Maximum request body size for an upload of this kind.
    pub fn max_body_bytes(self) -> usize {
        match self {
            Self::Photo => 512 * 1024 * 1024,
            // Saturates where usize cannot hold 4 GiB.
            Self::Video => usize::try_from(4u64 << 30).unwrap_or(usize::MAX),
        }
    }

    /// Public URL under which a stored file of this kind is served.
    pub fn public_url(self, stored_name: &str) -> String {
        format!("/uploads/{}/{}", self.plural(), stored_name)
    }

    pub fn not_found_message(self) -> &'static str {
        match self {
            Self::Photo => "Photo not found",
            Self::Video => "Video not found",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Photo => "photo",
            Self::Video => "video",
        })
    }
}

/// A stored photo or video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: Uuid,
    /// Original filename as sent by the client.
    pub name: String,
    pub url: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Letter {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_uses_plural_directory() {
        assert_eq!(
            MediaKind::Photo.public_url("1-ab-beach.jpg"),
            "/uploads/photos/1-ab-beach.jpg"
        );
        assert_eq!(MediaKind::Video.public_url("x.mp4"), "/uploads/videos/x.mp4");
    }

    #[test]
    fn video_limit_exceeds_photo_limit() {
        assert_eq!(MediaKind::Photo.max_body_bytes(), 512 * 1024 * 1024);
        assert!(MediaKind::Video.max_body_bytes() > MediaKind::Photo.max_body_bytes());
        if usize::BITS >= 64 {
            assert_eq!(MediaKind::Video.max_body_bytes() as u64, 4u64 << 30);
        }
    }

    #[test]
    fn media_item_serializes_camel_case() {
        let item = MediaItem {
            id: Uuid::new_v4(),
            name: "beach.jpg".into(),
            url: "/uploads/photos/beach.jpg".into(),
            category: "beach".into(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("created_at").is_none());
    }
}
