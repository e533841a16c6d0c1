//! Logical subject names
//!
//! Each event topic travels on its own channel; subjects tag the individual
//! messages so logs and future distributed transports can route them.

/// Subjects for logical message routing
pub struct Subjects;

impl Subjects {
    // Market Data (Exchange → Internal)

    /// Order book updates for a specific instrument: `md.book.BTC-PERPETUAL`
    pub fn book(instrument: &str) -> String {
        format!("md.book.{}", instrument)
    }

    /// Public trades for a specific instrument: `trades.BTC-PERPETUAL`
    pub fn trades(instrument: &str) -> String {
        format!("trades.{}", instrument)
    }

    /// Ticker snapshots: `md.ticker.BTC-PERPETUAL`
    pub fn ticker(instrument: &str) -> String {
        format!("md.ticker.{}", instrument)
    }

    /// Index price ticks: `md.index.btc_usd`
    pub fn index(index_name: &str) -> String {
        format!("md.index.{}", index_name)
    }

    // Account (Exchange → Order management)

    /// Order changes on the account
    pub const ORDERS: &'static str = "account.orders";

    /// Fills on the account
    pub const USER_TRADES: &'static str = "account.trades";

    /// Portfolio changes for a currency: `account.portfolio.btc`
    pub fn portfolio(currency: &str) -> String {
        format!("account.portfolio.{}", currency.to_lowercase())
    }

    // Control

    /// Session lifecycle changes
    pub const STATUS: &'static str = "control.status";

    /// Errors surfaced while handling pushes
    pub const ERRORS: &'static str = "control.errors";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subjects() {
        assert_eq!(Subjects::book("BTC-PERPETUAL"), "md.book.BTC-PERPETUAL");
        assert_eq!(Subjects::trades("ETH-PERPETUAL"), "trades.ETH-PERPETUAL");
        assert_eq!(Subjects::portfolio("BTC"), "account.portfolio.btc");
    }
}
