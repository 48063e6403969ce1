//! Address book entries and shipping destinations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
use crate::domain::value_objects::{Governorate, GovernorateError, PhoneNumber};

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub label: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub governorate: String,
    pub city: String,
    pub street: String,
    pub postal_code: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields of a new address, shared by the address book and checkout.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[serde(default)]
    pub label: Option<String>,
    #[validate(length(min = 1, message = "Le prénom est requis"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Le nom est requis"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Le téléphone est requis"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Le gouvernorat est requis"))]
    pub governorate: String,
    #[validate(length(min = 1, message = "La ville est requise"))]
    pub city: String,
    #[validate(length(min = 1, message = "L'adresse est requise"))]
    pub street: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressInput {
    pub fn governorate(&self) -> Result<Governorate, GovernorateError> { self.governorate.parse() }

    /// Phone stored in international form.
    pub fn normalized_phone(&self) -> String { PhoneNumber::normalize(&self.phone).into_inner() }
}

/// Partial update of an address book entry. A field that is present must
/// not be blank, as on creation.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressUpdate {
    pub label: Option<String>,
    #[validate(length(min = 1, message = "Le prénom est requis"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, message = "Le nom est requis"))]
    pub last_name: Option<String>,
    #[validate(length(min = 1, message = "Le téléphone est requis"))]
    pub phone: Option<String>,
    #[validate(length(min = 1, message = "Le gouvernorat est requis"))]
    pub governorate: Option<String>,
    #[validate(length(min = 1, message = "La ville est requise"))]
    pub city: Option<String>,
    #[validate(length(min = 1, message = "L'adresse est requise"))]
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub is_default: Option<bool>,
}

impl AddressUpdate {
    pub fn makes_default(&self) -> bool { self.is_default == Some(true) }

    /// Same update with surrounding whitespace removed; run before `validate`.
    #[must_use]
    pub fn trimmed(self) -> Self {
        let trim = |v: Option<String>| v.map(|s| s.trim().to_string());
        Self {
            label: trim(self.label),
            first_name: trim(self.first_name),
            last_name: trim(self.last_name),
            phone: trim(self.phone),
            governorate: trim(self.governorate),
            city: trim(self.city),
            street: trim(self.street),
            postal_code: trim(self.postal_code),
            is_default: self.is_default,
        }
    }

    pub fn apply(self, mut address: Address) -> Address {
        if let Some(v) = self.label { address.label = Some(v) }
        if let Some(v) = self.first_name { address.first_name = v }
        if let Some(v) = self.last_name { address.last_name = v }
        if let Some(v) = self.phone { address.phone = PhoneNumber::normalize(&v).into_inner() }
        if let Some(v) = self.governorate { address.governorate = v }
        if let Some(v) = self.city { address.city = v }
        if let Some(v) = self.street { address.street = v }
        if let Some(v) = self.postal_code { address.postal_code = Some(v) }
        if let Some(v) = self.is_default { address.is_default = v }
        address
    }
}
