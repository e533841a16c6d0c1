//! Channel name grammar: `<topic>.<symbol>.<topic-specific...>`

/// Builders for subscribable channel names
pub struct ChannelName;

impl ChannelName {
    /// Grouped book: `book.BTC-PERPETUAL.none.10.100ms`
    pub fn book(instrument: &str, group: &str, depth: u32, interval: &str) -> String {
        format!("book.{}.{}.{}.{}", instrument, group, depth, interval)
    }

    pub fn trades(instrument: &str, interval: &str) -> String {
        format!("trades.{}.{}", instrument, interval)
    }

    pub fn ticker(instrument: &str, interval: &str) -> String {
        format!("ticker.{}.{}", instrument, interval)
    }

    /// Index price: `deribit_price_index.btc_usd`
    pub fn index(index_name: &str) -> String {
        format!("deribit_price_index.{}", index_name)
    }

    pub fn user_orders() -> String {
        "user.orders.any.any.raw".to_string()
    }

    pub fn user_trades() -> String {
        "user.trades.any.any.raw".to_string()
    }

    pub fn user_portfolio(currency: &str) -> String {
        format!("user.portfolio.{}", currency.to_lowercase())
    }
}

/// Routing target of a push, derived from the channel prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTopic {
    Book,
    Trades,
    Ticker,
    Index,
    UserOrders,
    UserTrades,
    UserPortfolio,
}

impl ChannelTopic {
    pub fn parse(name: &str) -> Option<Self> {
        let (topic, rest) = name.split_once('.')?;
        match topic {
            "book" => Some(Self::Book),
            "trades" => Some(Self::Trades),
            "ticker" => Some(Self::Ticker),
            "deribit_price_index" => Some(Self::Index),
            "user" => match rest.split('.').next()? {
                "orders" => Some(Self::UserOrders),
                "trades" => Some(Self::UserTrades),
                "portfolio" => Some(Self::UserPortfolio),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Channels under `user.` must go through the private API
pub fn is_private_channel(name: &str) -> bool {
    name.starts_with("user.")
}

/// Second segment of a market data channel, the instrument or index name
pub fn channel_symbol(name: &str) -> &str {
    name.split('.').nth(1).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        assert_eq!(
            ChannelName::book("BTC-PERPETUAL", "none", 10, "100ms"),
            "book.BTC-PERPETUAL.none.10.100ms"
        );
        assert_eq!(ChannelName::trades("ETH-PERPETUAL", "raw"), "trades.ETH-PERPETUAL.raw");
        assert_eq!(ChannelName::index("btc_usd"), "deribit_price_index.btc_usd");
        assert_eq!(ChannelName::user_portfolio("BTC"), "user.portfolio.btc");
    }

    #[test]
    fn test_topic_parse() {
        assert_eq!(
            ChannelTopic::parse("book.BTC-PERPETUAL.none.10.100ms"),
            Some(ChannelTopic::Book)
        );
        assert_eq!(
            ChannelTopic::parse("ticker.BTC-PERPETUAL.100ms"),
            Some(ChannelTopic::Ticker)
        );
        assert_eq!(
            ChannelTopic::parse("deribit_price_index.btc_usd"),
            Some(ChannelTopic::Index)
        );
        assert_eq!(
            ChannelTopic::parse("user.orders.any.any.raw"),
            Some(ChannelTopic::UserOrders)
        );
        assert_eq!(
            ChannelTopic::parse("user.trades.any.any.raw"),
            Some(ChannelTopic::UserTrades)
        );
        assert_eq!(
            ChannelTopic::parse("user.portfolio.btc"),
            Some(ChannelTopic::UserPortfolio)
        );
        assert_eq!(ChannelTopic::parse("user.changes.any.any.raw"), None);
        assert_eq!(ChannelTopic::parse("quote"), None);
    }

    #[test]
    fn test_symbol() {
        assert_eq!(channel_symbol("trades.BTC-PERPETUAL.raw"), "BTC-PERPETUAL");
        assert_eq!(channel_symbol("deribit_price_index.btc_usd"), "btc_usd");
        assert_eq!(channel_symbol("platform_state"), "");
        assert!(is_private_channel("user.orders.any.any.raw"));
    }
}
