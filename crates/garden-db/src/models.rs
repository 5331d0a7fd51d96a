/// Database row types, mapping directly to SQLite rows.
/// Distinct from garden-types API models to keep the DB layer independent.

pub struct AccountRow {
    pub id: String,
    pub username: String,
    /// PHC-formatted password hash.
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MediaRow {
    pub id: String,
    pub name: String,
    /// File name inside the kind's upload directory.
    pub stored_name: String,
    pub url: String,
    pub category: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct LetterRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}
