//! Aggregates module
pub mod address;
pub mod cart;
pub mod category;
pub mod favorite;
pub mod order;
pub mod product;
pub mod user;

pub use address::{Address, AddressInput, AddressUpdate};
pub use cart::{CartItem, CartStore};
pub use category::{Category, CategoryWithCount};
pub use favorite::{Favorite, FavoriteWithProduct};
pub use order::{CheckoutItem, Order, OrderDetail, OrderItem, OrderItemDetail, OrderStatus, OrderSummary, OrderTotals};
pub use product::{Customization, CustomizationOptions, Product, ProductDetail, ProductError};
pub use user::{Profile, Role, User};
