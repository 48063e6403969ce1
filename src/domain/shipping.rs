//! Delivery pricing by governorate.

use crate::domain::value_objects::{Governorate, Money};

/// Flat fee for the optional gift wrap.
pub const GIFT_WRAP_FEE_DINARS: i64 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShippingZone {
    /// Greater Tunis.
    Capital,
    Coastal,
    Interior,
}

impl ShippingZone {
    pub fn of(governorate: Governorate) -> Self {
        use Governorate::*;
        match governorate {
            Tunis | Ariana | BenArous | Manouba => Self::Capital,
            Sfax | Sousse | Monastir | Nabeul | Bizerte => Self::Coastal,
            _ => Self::Interior,
        }
    }

    pub fn cost(&self) -> Money {
        match self {
            Self::Capital => Money::dinars(5),
            Self::Coastal => Money::dinars(8),
            Self::Interior => Money::dinars(12),
        }
    }
}

pub fn shipping_cost(governorate: Governorate) -> Money {
    ShippingZone::of(governorate).cost()
}

pub fn gift_wrap_cost(gift_wrap: bool) -> Money {
    if gift_wrap { Money::dinars(GIFT_WRAP_FEE_DINARS) } else { Money::zero() }
}
