//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

/// ISO code of the shop currency.
pub const CURRENCY: &str = "TND";

/// The dinar is divided into 1000 millimes.
pub const MINOR_UNITS_PER_UNIT: i64 = 1000;

/// Money value object, always in Tunisian dinars.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn dinars(amount: i64) -> Self { Self(Decimal::from(amount)) }
    pub fn zero() -> Self { Self(Decimal::ZERO) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_negative(&self) -> bool { self.0.is_sign_negative() && !self.0.is_zero() }
    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }

    /// Amount in millimes, rounded half away from zero.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        let scaled = (self.0 * Decimal::from(MINOR_UNITS_PER_UNIT))
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        scaled.to_i64().ok_or(MoneyError::Overflow)
    }
}

impl Add for Money {
    type Output = Money;
    fn add(self, other: Money) -> Money { Money(self.0 + other.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::zero(), Add::add) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Self(amount) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.3} {}", self.0, CURRENCY) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum MoneyError { Overflow }
impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Amount out of range") }
}

/// Strictly positive item count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    pub fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }
    pub fn value(&self) -> u32 { self.0 }
    pub fn add(&self, other: Quantity) -> Self { Self(self.0.saturating_add(other.0)) }
}

impl TryFrom<i64> for Quantity {
    type Error = QuantityError;
    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value).ok().and_then(Quantity::new).ok_or(QuantityError::NotPositive)
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> u32 { q.0 }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum QuantityError { NotPositive }
impl std::error::Error for QuantityError {}
impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "quantity must be a positive integer") }
}

pub const INVALID_PHONE: &str = "Numéro de téléphone invalide";

/// Tunisian phone number in `+216XXXXXXXX` form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Normalizes any input to the international form without validating it.
    pub fn normalize(raw: &str) -> Self {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if digits.starts_with("216") {
            Self(format!("+{digits}"))
        } else if let Some(rest) = digits.strip_prefix('0') {
            Self(format!("+216{rest}"))
        } else {
            Self(format!("+216{digits}"))
        }
    }

    /// Eight local digits starting with 2, 4, 5, 7 or 9, optionally prefixed by 216.
    pub fn is_valid(raw: &str) -> bool {
        let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        let mobile_prefix = |s: &str| s.starts_with(['2', '4', '5', '7', '9']);
        match digits.len() {
            8 => mobile_prefix(digits.as_str()),
            11 => digits.strip_prefix("216").is_some_and(mobile_prefix),
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str { &self.0 }
    pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Top-level administrative divisions of Tunisia.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Governorate {
    Ariana, Beja, BenArous, Bizerte, Gabes, Gafsa, Jendouba, Kairouan, Kasserine, Kebili,
    Kef, Mahdia, Manouba, Medenine, Monastir, Nabeul, Sfax, SidiBouzid, Siliana, Sousse,
    Tataouine, Tozeur, Tunis, Zaghouan,
}

impl Governorate {
    pub const ALL: [Governorate; 24] = [
        Self::Ariana, Self::Beja, Self::BenArous, Self::Bizerte, Self::Gabes, Self::Gafsa,
        Self::Jendouba, Self::Kairouan, Self::Kasserine, Self::Kebili, Self::Kef, Self::Mahdia,
        Self::Manouba, Self::Medenine, Self::Monastir, Self::Nabeul, Self::Sfax, Self::SidiBouzid,
        Self::Siliana, Self::Sousse, Self::Tataouine, Self::Tozeur, Self::Tunis, Self::Zaghouan,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ariana => "Ariana", Self::Beja => "Béja", Self::BenArous => "Ben Arous",
            Self::Bizerte => "Bizerte", Self::Gabes => "Gabès", Self::Gafsa => "Gafsa",
            Self::Jendouba => "Jendouba", Self::Kairouan => "Kairouan", Self::Kasserine => "Kasserine",
            Self::Kebili => "Kébili", Self::Kef => "Kef", Self::Mahdia => "Mahdia",
            Self::Manouba => "Manouba", Self::Medenine => "Médenine", Self::Monastir => "Monastir",
            Self::Nabeul => "Nabeul", Self::Sfax => "Sfax", Self::SidiBouzid => "Sidi Bouzid",
            Self::Siliana => "Siliana", Self::Sousse => "Sousse", Self::Tataouine => "Tataouine",
            Self::Tozeur => "Tozeur", Self::Tunis => "Tunis", Self::Zaghouan => "Zaghouan",
        }
    }
}

impl FromStr for Governorate {
    type Err = GovernorateError;

    /// Accepts the official spelling, case-insensitively, with or without accents.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = fold_accents(s.trim());
        Self::ALL
            .into_iter()
            .find(|g| fold_accents(g.name()) == wanted)
            .ok_or_else(|| GovernorateError(s.to_string()))
    }
}

impl fmt::Display for Governorate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'é' | 'è' | 'É' | 'È' => 'e',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct GovernorateError(pub String);
impl std::error::Error for GovernorateError {}
impl fmt::Display for GovernorateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Gouvernorat inconnu: {}", self.0) }
}
