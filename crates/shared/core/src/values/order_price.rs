use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Literal the venue sends in place of a price for market orders
pub const MARKET_PRICE_SENTINEL: &str = "market_price";

/// Price attached to an order.
///
/// Market orders carry no limit price; the venue reports them with the
/// `"market_price"` string where a number is expected. The variant is kept
/// through parsing and only collapses to zero when the value is read as a
/// number or serialized back out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderPrice {
    Market,
    Fixed(Decimal),
}

impl OrderPrice {
    /// Numeric value, with the market sentinel resolved to zero
    pub fn value(&self) -> Decimal {
        match self {
            OrderPrice::Market => Decimal::ZERO,
            OrderPrice::Fixed(price) => *price,
        }
    }

    pub fn is_market(&self) -> bool {
        matches!(self, OrderPrice::Market)
    }

    /// The limit price, if the order has one
    pub fn limit(&self) -> Option<Decimal> {
        match self {
            OrderPrice::Market => None,
            OrderPrice::Fixed(price) => Some(*price),
        }
    }
}

impl From<Decimal> for OrderPrice {
    fn from(price: Decimal) -> Self {
        OrderPrice::Fixed(price)
    }
}

impl fmt::Display for OrderPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderPrice::Market => f.write_str(MARKET_PRICE_SENTINEL),
            OrderPrice::Fixed(price) => write!(f, "{}", price),
        }
    }
}

impl Serialize for OrderPrice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The venue speaks JSON floats; market orders go out as 0
        serializer.serialize_f64(self.value().to_f64().unwrap_or(0.0))
    }
}

impl<'de> Deserialize<'de> for OrderPrice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(OrderPriceVisitor)
    }
}

struct OrderPriceVisitor;

impl Visitor<'_> for OrderPriceVisitor {
    type Value = OrderPrice;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a price number or \"{}\"", MARKET_PRICE_SENTINEL)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<OrderPrice, E> {
        if v == MARKET_PRICE_SENTINEL {
            return Ok(OrderPrice::Market);
        }
        Decimal::from_str(v)
            .map(OrderPrice::Fixed)
            .map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<OrderPrice, E> {
        Decimal::from_str(&v.to_string())
            .map(OrderPrice::Fixed)
            .map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<OrderPrice, E> {
        Ok(OrderPrice::Fixed(Decimal::from(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<OrderPrice, E> {
        Ok(OrderPrice::Fixed(Decimal::from(v)))
    }
}
