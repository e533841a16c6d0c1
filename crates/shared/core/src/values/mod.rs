use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

mod order_price;

pub use order_price::{MARKET_PRICE_SENTINEL, OrderPrice};

/// Price value - uses Decimal for precision
pub type Price = Decimal;

/// Quantity value - uses Decimal for precision
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Convert a venue millisecond timestamp to UTC, falling back to the epoch
/// for values chrono cannot represent
pub fn timestamp_from_millis(millis: u64) -> Timestamp {
    i64::try_from(millis)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
}
