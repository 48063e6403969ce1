//! Storefront domain model: entities, value objects and pricing rules.
pub mod aggregates;
pub mod shipping;
pub mod value_objects;
