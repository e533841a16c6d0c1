//! Rate-limited Deribit REST client
//!
//! Every call is a GET on `/api/v2/<method>` with the parameters in the query
//! string. `private/*` methods carry basic auth.

use super::http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use super::rate_limiter::RateLimiter;
use crate::config::{Credentials, RestConfig};
use crate::error::RestError;
use crate::messages::rpc::RpcResponse;
use crate::messages::{
    AccountSummary, CandleData, EditParams, InstrumentMessage, OrderMessage, OrderParams,
    OrderResponse, PositionMessage, StopOrderHistory, TickerMessage, UserTradeMessage,
    UserTradesPage,
};
use kestrel_core::Side;
use log::{debug, error, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

type Query = Vec<(String, String)>;

fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_string(), value.to_string())
}

/// Flatten a parameter struct into query pairs, skipping nulls
fn to_query<P: Serialize>(params: &P) -> Result<Query, RestError> {
    let value = serde_json::to_value(params).map_err(|e| RestError::Parse(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(RestError::Parse("parameters must be an object".to_string()));
    };
    Ok(fields
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((key, text)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

pub struct RestClient<T = ReqwestTransport> {
    transport: T,
    limiter: RateLimiter,
    max_429_retries: u32,
}

impl RestClient<ReqwestTransport> {
    pub fn new(config: &RestConfig, credentials: Credentials) -> Result<Self, RestError> {
        let transport = ReqwestTransport::new(config, credentials)?;
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: HttpTransport> RestClient<T> {
    pub fn with_transport(transport: T, config: &RestConfig) -> Self {
        Self {
            transport,
            limiter: RateLimiter::new(config.requests_per_second),
            max_429_retries: config.max_429_retries,
        }
    }

    /// Send under the rate limiter, retrying while the venue answers 429.
    ///
    /// Any other non-2xx status is returned as `RestError::Status`.
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RestError> {
        let mut attempts = 0;
        loop {
            if !self.limiter.try_acquire() {
                debug!("Rate limit reached, waiting for a permit");
                self.limiter.acquire().await;
            }
            attempts += 1;

            let response = self.transport.send(request).await?;
            if response.status == HTTP_TOO_MANY_REQUESTS {
                if attempts > self.max_429_retries {
                    error!("{} still rate limited after {} attempts", request.path, attempts);
                    return Err(RestError::RateLimited { attempts });
                }
                warn!(
                    "{} rate limited, retry {}/{}",
                    request.path, attempts, self.max_429_retries
                );
                continue;
            }

            if !response.is_success() {
                error!("{} failed with HTTP {}", request.path, response.status);
                return Err(RestError::Status {
                    status: response.status,
                    body: response.body,
                });
            }
            return Ok(response);
        }
    }

    /// Call a JSON-RPC method and decode its `result`
    pub async fn call<R: DeserializeOwned>(&self, method: &str, query: Query) -> Result<R, RestError> {
        let request = HttpRequest {
            path: format!("/api/v2/{}", method),
            query,
            authenticated: method.starts_with("private/"),
        };
        let response = self.execute(&request).await?;

        let envelope: RpcResponse<R> = serde_json::from_str(&response.body)
            .map_err(|e| RestError::Parse(format!("{}: {}", method, e)))?;
        if let Some(err) = envelope.error {
            return Err(RestError::Api {
                code: err.code,
                message: err.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| RestError::Parse(format!("{}: reply has no result", method)))
    }

    // Account

    /// Open positions, optionally filtered by kind (`future`, `option`, ...)
    pub async fn get_positions(
        &self,
        currency: &str,
        kind: Option<&str>,
    ) -> Result<Vec<PositionMessage>, RestError> {
        let mut query = vec![param("currency", currency)];
        if let Some(kind) = kind {
            query.push(param("kind", kind));
        }
        self.call("private/get_positions", query).await
    }

    pub async fn get_account_summary(&self, currency: &str) -> Result<AccountSummary, RestError> {
        self.call(
            "private/get_account_summary",
            vec![param("currency", currency), param("extended", true)],
        )
        .await
    }

    // Market data

    /// OHLCV bars between two millisecond timestamps. `resolution` is minutes
    /// (`1`, `60`, ...) or `1D`.
    pub async fn get_candles(
        &self,
        instrument: &str,
        start_ms: i64,
        end_ms: i64,
        resolution: &str,
    ) -> Result<CandleData, RestError> {
        self.call(
            "public/get_tradingview_chart_data",
            vec![
                param("instrument_name", instrument),
                param("start_timestamp", start_ms),
                param("end_timestamp", end_ms),
                param("resolution", resolution),
            ],
        )
        .await
    }

    pub async fn get_ticker(&self, instrument: &str) -> Result<TickerMessage, RestError> {
        self.call("public/ticker", vec![param("instrument_name", instrument)])
            .await
    }

    pub async fn get_instruments(
        &self,
        currency: &str,
        kind: Option<&str>,
        expired: bool,
    ) -> Result<Vec<InstrumentMessage>, RestError> {
        let mut query = vec![param("currency", currency), param("expired", expired)];
        if let Some(kind) = kind {
            query.push(param("kind", kind));
        }
        self.call("public/get_instruments", query).await
    }

    // Orders

    pub async fn get_order_state(&self, order_id: &str) -> Result<OrderMessage, RestError> {
        self.call("private/get_order_state", vec![param("order_id", order_id)])
            .await
    }

    pub async fn get_order_history(
        &self,
        instrument: &str,
        count: u32,
    ) -> Result<Vec<OrderMessage>, RestError> {
        self.call(
            "private/get_order_history_by_instrument",
            vec![param("instrument_name", instrument), param("count", count)],
        )
        .await
    }

    pub async fn get_open_orders(&self, instrument: &str) -> Result<Vec<OrderMessage>, RestError> {
        self.call(
            "private/get_open_orders_by_instrument",
            vec![param("instrument_name", instrument)],
        )
        .await
    }

    /// One page of stop-order history; pass the returned continuation to get
    /// the next one
    pub async fn get_stop_order_history(
        &self,
        currency: &str,
        instrument: Option<&str>,
        count: u32,
        continuation: Option<&str>,
    ) -> Result<StopOrderHistory, RestError> {
        let mut query = vec![param("currency", currency), param("count", count)];
        if let Some(instrument) = instrument {
            query.push(param("instrument_name", instrument));
        }
        if let Some(continuation) = continuation {
            query.push(param("continuation", continuation));
        }
        self.call("private/get_stop_order_history", query).await
    }

    pub async fn place_order(
        &self,
        side: Side,
        params: &OrderParams,
    ) -> Result<OrderResponse, RestError> {
        let method = match side {
            Side::Buy => "private/buy",
            Side::Sell => "private/sell",
        };
        self.call(method, to_query(params)?).await
    }

    pub async fn buy(&self, params: &OrderParams) -> Result<OrderResponse, RestError> {
        self.place_order(Side::Buy, params).await
    }

    pub async fn sell(&self, params: &OrderParams) -> Result<OrderResponse, RestError> {
        self.place_order(Side::Sell, params).await
    }

    pub async fn cancel(&self, order_id: &str) -> Result<OrderMessage, RestError> {
        self.call("private/cancel", vec![param("order_id", order_id)])
            .await
    }

    pub async fn edit(&self, params: &EditParams) -> Result<OrderResponse, RestError> {
        self.call("private/edit", to_query(params)?).await
    }

    // Fills

    pub async fn get_user_trades_by_currency(
        &self,
        currency: &str,
        count: u32,
    ) -> Result<UserTradesPage, RestError> {
        self.call(
            "private/get_user_trades_by_currency",
            vec![param("currency", currency), param("count", count)],
        )
        .await
    }

    pub async fn get_user_trades_by_currency_and_time(
        &self,
        currency: &str,
        start_ms: i64,
        end_ms: i64,
        count: u32,
    ) -> Result<UserTradesPage, RestError> {
        self.call(
            "private/get_user_trades_by_currency_and_time",
            vec![
                param("currency", currency),
                param("start_timestamp", start_ms),
                param("end_timestamp", end_ms),
                param("count", count),
            ],
        )
        .await
    }

    pub async fn get_user_trades_by_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<UserTradeMessage>, RestError> {
        self.call(
            "private/get_user_trades_by_order",
            vec![param("order_id", order_id)],
        )
        .await
    }
}
