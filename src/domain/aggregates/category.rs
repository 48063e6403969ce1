//! Product groupings.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Category { pub id: Uuid, pub name: String, pub created_at: DateTime<Utc> }

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
}

/// Trims a submitted category name; `None` when nothing is left.
pub fn normalize_name(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}
