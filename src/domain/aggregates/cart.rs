//! Cart Aggregate
//!
//! The cart lives on the client for a browsing session. `CartStore` is the
//! explicit value a client holds, mutates and persists between page loads;
//! the server never trusts its subtotal and recomputes totals at checkout.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::aggregates::order::CheckoutItem;
use crate::domain::aggregates::product::Customization;
use crate::domain::value_objects::{Money, Quantity};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartStore {
    items: Vec<CartItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: Uuid,
    pub product_name: String,
    #[serde(default)]
    pub product_image: Option<String>,
    pub price: Money,
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization: Option<Customization>,
}

impl CartItem {
    pub fn line_total(&self) -> Money { self.price.multiply(self.quantity.value()) }

    fn same_line(&self, other: &CartItem) -> bool {
        self.product_id == other.product_id && self.customization == other.customization
    }
}

impl CartStore {
    pub fn new() -> Self { Self::default() }

    /// Restores a persisted cart; unreadable data yields an empty cart.
    pub fn from_json(raw: &str) -> Self { serde_json::from_str(raw).unwrap_or_default() }

    pub fn to_json(&self) -> String { serde_json::to_string(self).unwrap_or_else(|_| "[]".to_string()) }

    pub fn items(&self) -> &[CartItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Number of units across all lines.
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity.value()).sum() }

    pub fn subtotal(&self) -> Money { self.items.iter().map(CartItem::line_total).sum() }

    /// Same product with the same customization merges into one line.
    pub fn add_item(&mut self, item: CartItem) {
        if let Some(existing) = self.items.iter_mut().find(|i| i.same_line(&item)) {
            existing.quantity = existing.quantity.add(item.quantity);
        } else {
            self.items.push(item);
        }
    }

    /// Removes every line of the product.
    pub fn remove_item(&mut self, product_id: Uuid) { self.items.retain(|i| i.product_id != product_id); }

    /// A quantity of zero or less removes the product.
    pub fn update_quantity(&mut self, product_id: Uuid, quantity: i64) {
        match Quantity::try_from(quantity) {
            Ok(q) => self.items.iter_mut().filter(|i| i.product_id == product_id).for_each(|i| i.quantity = q),
            Err(_) => self.remove_item(product_id),
        }
    }

    pub fn clear(&mut self) { self.items.clear(); }

    /// Lines to submit to `POST /checkout/create`.
    pub fn checkout_items(&self) -> Vec<CheckoutItem> {
        self.items
            .iter()
            .map(|i| CheckoutItem { product_id: i.product_id, quantity: i.quantity, price: i.price, customization: i.customization.clone() })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn item(product_id: Uuid, qty: u32, text: Option<&str>) -> CartItem {
        CartItem {
            product_id, product_name: "Widget".into(), product_image: None,
            price: Money::new(Decimal::new(10, 0)), quantity: Quantity::new(qty).unwrap(),
            customization: text.map(|t| Customization { text: Some(t.into()), ..Default::default() }),
        }
    }

    #[test]
    fn test_cart_operations() {
        let p1 = Uuid::new_v4();
        let mut cart = CartStore::new();
        cart.add_item(item(p1, 2, None));
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.subtotal(), Money::dinars(20));
        cart.add_item(item(p1, 1, None));
        assert_eq!(cart.items()[0].quantity.value(), 3); // Merged
        cart.add_item(item(p1, 1, Some("Sami")));
        assert_eq!(cart.items().len(), 2);
        assert_eq!(cart.item_count(), 4);
    }

    #[test]
    fn test_update_to_zero_removes() {
        let (p1, p2) = (Uuid::new_v4(), Uuid::new_v4());
        let mut cart = CartStore::new();
        cart.add_item(item(p1, 1, None));
        cart.add_item(item(p2, 1, None));
        cart.update_quantity(p1, 5);
        assert_eq!(cart.subtotal(), Money::dinars(60));
        cart.update_quantity(p2, 0);
        assert_eq!(cart.items().len(), 1);
        cart.remove_item(p1);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_persistence_round_trip_and_corruption() {
        let mut cart = CartStore::new();
        cart.add_item(item(Uuid::new_v4(), 2, Some("Lina")));
        assert_eq!(CartStore::from_json(&cart.to_json()), cart);
        assert!(CartStore::from_json("{not json").is_empty());
    }

    #[test]
    fn test_checkout_items_mirror_lines() {
        let mut cart = CartStore::new();
        cart.add_item(item(Uuid::new_v4(), 2, Some("Lina")));
        let lines = cart.checkout_items();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].line_total(), Money::dinars(20));
        assert_eq!(lines[0].customization.as_ref().and_then(|c| c.text.as_deref()), Some("Lina"));
        cart.clear();
        assert!(cart.checkout_items().is_empty());
    }
}
