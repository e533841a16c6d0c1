//! Connectivity runner
//!
//! Starts a Deribit session from a JSON config, subscribes the configured
//! instruments and the account streams, and logs every event until Ctrl-C.

use anyhow::{Context, Result};
use kestrel_gateway::{
    ConnectivityConfig, DeribitSession, GatewayError, RestClient, SessionEvents, SessionFeeds,
    SessionStatus, Subscriber,
};
use log::{error, info, warn};

const BOOK_DEPTH: u32 = 10;

fn print_help() {
    eprintln!(
        r#"Kestrel runner - Deribit connectivity session

USAGE:
    kestrel-runner <CONFIG>

ARGS:
    <CONFIG>    JSON configuration file

ENVIRONMENT VARIABLES:
    KESTREL_CLIENT_ID        Overrides credentials.client_id
    KESTREL_CLIENT_SECRET    Overrides credentials.client_secret
    RUST_LOG                 Log level filter (default: info)
"#
    );
}

fn load_config() -> Result<Option<ConnectivityConfig>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let path = match args.as_slice() {
        [flag] if flag == "--help" || flag == "-h" => return Ok(None),
        [path] => path,
        _ => {
            print_help();
            anyhow::bail!("expected exactly one config path");
        }
    };

    info!("Loading configuration from: {}", path);
    let mut config = ConnectivityConfig::from_file(path)?;
    if let Ok(client_id) = std::env::var("KESTREL_CLIENT_ID") {
        config.credentials.client_id = client_id;
    }
    if let Ok(client_secret) = std::env::var("KESTREL_CLIENT_SECRET") {
        config.credentials.client_secret = client_secret;
    }
    config.validate()?;
    Ok(Some(config))
}

/// Balances and open orders, logged at start and after every reconnect
async fn log_account_state(rest: &RestClient, config: &ConnectivityConfig) {
    for currency in &config.session.portfolio_currencies {
        match rest.get_account_summary(currency).await {
            Ok(summary) => info!(
                "{} equity {} available {}",
                currency, summary.balances.equity, summary.balances.available_funds
            ),
            Err(e) => warn!("Account summary for {} failed: {}", currency, e),
        }
    }
    for instrument in &config.instruments {
        match rest.get_open_orders(instrument).await {
            Ok(orders) => info!("{} open orders on {}", orders.len(), instrument),
            Err(e) => warn!("Open orders for {} failed: {}", instrument, e),
        }
    }
}

/// Build the REST client and start the session with every configured channel
async fn connect(
    config: &ConnectivityConfig,
) -> Result<(RestClient, DeribitSession, SessionFeeds), GatewayError> {
    let rest = RestClient::new(&config.rest, config.credentials.clone())?;
    let (events, feeds) = SessionEvents::channels(config.session.event_capacity);

    let session = DeribitSession::start(config, events).await?;
    for instrument in &config.instruments {
        session.subscribe_book(instrument, BOOK_DEPTH);
        session.subscribe_trades(instrument);
        session.subscribe_ticker(instrument);
    }
    session.subscribe_account();
    Ok((rest, session, feeds))
}

async fn run_event_loop(feeds: &mut SessionFeeds, rest: &RestClient, config: &ConnectivityConfig) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received");
                return;
            }
            Ok(status) = feeds.status.next() => {
                info!("Session status: {:?}", status);
                if status == SessionStatus::Reconnected {
                    log_account_state(rest, config).await;
                }
            }
            Ok(update) = feeds.book.next() => {
                info!(
                    "Book {} change {} ({})",
                    update.instrument(),
                    update.change_id(),
                    if update.is_snapshot() { "snapshot" } else { "delta" }
                );
            }
            Ok(trade) = feeds.trades.next() => {
                info!(
                    "Trade {} {} {} @ {}",
                    trade.instrument, trade.direction.as_str(), trade.quantity, trade.price
                );
            }
            Ok(ticker) = feeds.ticker.next() => {
                info!("Ticker {} mark {} mid {:?}", ticker.instrument, ticker.mark_price, ticker.mid_price());
            }
            Ok(index) = feeds.index.next() => {
                info!("Index {} {}", index.index_name, index.price);
            }
            Ok(order) = feeds.orders.next() => {
                info!(
                    "Order {} {:?} filled {}/{} at {}",
                    order.order_id, order.order_state, order.filled_amount, order.amount, order.price
                );
            }
            Ok(fill) = feeds.user_trades.next() => {
                info!("Fill {} on order {}: {} @ {}", fill.trade_id, fill.order_id, fill.amount, fill.price);
            }
            Ok(portfolio) = feeds.portfolio.next() => {
                info!("Portfolio {} equity {}", portfolio.currency, portfolio.equity);
            }
            Ok(event) = feeds.errors.next() => {
                error!("Session error on {:?}: {}", event.channel, event.message);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(config) = load_config()? else {
        print_help();
        return Ok(());
    };

    let (rest, session, mut feeds) = connect(&config)
        .await
        .context("failed to connect to Deribit")?;
    info!(
        "Following {} channels for {} instruments",
        session.channels().len(),
        config.instruments.len()
    );

    log_account_state(&rest, &config).await;
    run_event_loop(&mut feeds, &rest, &config).await;

    session.shutdown().await;
    Ok(())
}
