//! Product Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Money,
    /// Price before discount, shown struck through.
    pub original_price: Option<Money>,
    pub stock: i32,
    pub is_active: bool,
    pub is_customizable: bool,
    pub customization_options: Option<Json<CustomizationOptions>>,
    pub images: Vec<String>,
    pub category_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a buyer may personalise on a customizable product.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_text_length: Option<usize>,
    #[serde(default)]
    pub allow_image_upload: bool,
}

/// Per-item personalisation chosen by the buyer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Reference to an already uploaded image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Customization {
    pub fn is_empty(&self) -> bool { self.text.is_none() && self.color.is_none() && self.image.is_none() }
}

impl Product {
    pub fn options(&self) -> Option<&CustomizationOptions> { self.customization_options.as_ref().map(|j| &j.0) }

    /// Loose check of a customization against the product's option schema.
    pub fn validate_customization(&self, customization: Option<&Customization>) -> Result<(), ProductError> {
        let Some(c) = customization.filter(|c| !c.is_empty()) else { return Ok(()) };
        if !self.is_customizable {
            return Err(self.invalid_customization("ce produit n'est pas personnalisable"));
        }
        let options = self.options().cloned().unwrap_or_default();
        if let (Some(text), Some(max)) = (&c.text, options.max_text_length) {
            if text.chars().count() > max {
                return Err(self.invalid_customization(&format!("texte limité à {max} caractères")));
            }
        }
        if let (Some(color), Some(colors)) = (&c.color, &options.colors) {
            if !colors.iter().any(|allowed| allowed == color) {
                return Err(self.invalid_customization(&format!("couleur {color} indisponible")));
            }
        }
        if c.image.is_some() && !options.allow_image_upload {
            return Err(self.invalid_customization("image non autorisée"));
        }
        Ok(())
    }

    fn invalid_customization(&self, reason: &str) -> ProductError {
        ProductError::InvalidCustomization { product: self.name.clone(), reason: reason.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    InvalidCustomization { product: String, reason: String },
}
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCustomization { product, reason } => write!(f, "Personnalisation invalide pour {product}: {reason}"),
        }
    }
}

/// Catalog view of a product for the current visitor.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub is_favorite: bool,
}
