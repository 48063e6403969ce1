//! Wish list entries.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::product::Product;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Favorite { pub id: Uuid, pub user_id: Uuid, pub product_id: Uuid, pub created_at: DateTime<Utc> }

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteWithProduct {
    #[serde(flatten)]
    pub favorite: Favorite,
    pub product: Product,
}
