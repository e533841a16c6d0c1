//! JSON-RPC 2.0 envelope shared by the WebSocket and REST surfaces

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const JSONRPC_VERSION: &str = "2.0";

/// The operation a WebSocket request id stands for.
///
/// All traffic shares one connection and replies only need to be told apart by
/// operation, so every request of a kind reuses the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Subscribe = 1,
    Unsubscribe = 2,
    Authenticate = 3,
    RefreshToken = 4,
    SetHeartbeat = 5,
    Test = 6,
}

impl RequestKind {
    pub fn id(self) -> u64 {
        self as u64
    }

    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            1 => Some(Self::Subscribe),
            2 => Some(Self::Unsubscribe),
            3 => Some(Self::Authenticate),
            4 => Some(Self::RefreshToken),
            5 => Some(Self::SetHeartbeat),
            6 => Some(Self::Test),
            _ => None,
        }
    }
}

/// Outbound request frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(kind: RequestKind, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: kind.id(),
            method: method.into(),
            params,
        }
    }

    /// Client-credentials grant sent right after the socket opens
    pub fn authenticate(client_id: &str, client_secret: &str) -> Self {
        Self::new(
            RequestKind::Authenticate,
            "public/auth",
            json!({
                "grant_type": "client_credentials",
                "client_id": client_id,
                "client_secret": client_secret,
            }),
        )
    }

    pub fn refresh(refresh_token: &str) -> Self {
        Self::new(
            RequestKind::RefreshToken,
            "public/auth",
            json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
            }),
        )
    }

    pub fn subscribe(private: bool, channels: &[String]) -> Self {
        let method = if private {
            "private/subscribe"
        } else {
            "public/subscribe"
        };
        Self::new(
            RequestKind::Subscribe,
            method,
            json!({ "channels": channels }),
        )
    }

    pub fn unsubscribe(private: bool, channels: &[String]) -> Self {
        let method = if private {
            "private/unsubscribe"
        } else {
            "public/unsubscribe"
        };
        Self::new(
            RequestKind::Unsubscribe,
            method,
            json!({ "channels": channels }),
        )
    }

    pub fn set_heartbeat(interval_secs: u64) -> Self {
        Self::new(
            RequestKind::SetHeartbeat,
            "public/set_heartbeat",
            json!({ "interval": interval_secs }),
        )
    }

    pub fn test() -> Self {
        Self::new(RequestKind::Test, "public/test", json!({}))
    }

    pub fn kind(&self) -> Option<RequestKind> {
        RequestKind::from_id(self.id)
    }

    /// Channel names carried by a subscribe/unsubscribe request
    pub fn channels(&self) -> Vec<String> {
        self.params
            .get("channels")
            .and_then(Value::as_array)
            .map(|channels| {
                channels
                    .iter()
                    .filter_map(|c| c.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Error object inside a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Reply envelope as returned by the REST surface
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    pub id: Option<u64>,
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

/// Result of `public/auth`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResult {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub token_type: String,
}

/// Payload of a server heartbeat frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatKind {
    Heartbeat,
    /// The server expects a `public/test` in reply
    TestRequest,
    #[serde(other)]
    Other,
}

/// An inbound WebSocket frame after envelope parsing
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Reply to one of our requests
    Response {
        id: u64,
        result: Option<Value>,
        error: Option<RpcError>,
    },
    /// Push on a subscribed channel
    Notification { channel: String, data: Value },
    Heartbeat { kind: HeartbeatKind },
    /// Valid JSON we have no handler for
    Unknown(Value),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct NotificationParams {
    channel: String,
    data: Value,
}

#[derive(Deserialize)]
struct HeartbeatParams {
    #[serde(rename = "type")]
    kind: HeartbeatKind,
}

/// Parse one text frame into its envelope shape
pub fn parse_frame(text: &str) -> Result<InboundFrame, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let raw: RawFrame = serde_json::from_value(value.clone())?;

    if let Some(id) = raw.id {
        return Ok(InboundFrame::Response {
            id,
            result: raw.result,
            error: raw.error,
        });
    }

    match (raw.method.as_deref(), raw.params) {
        (Some("subscription"), Some(params)) => {
            let params: NotificationParams = serde_json::from_value(params)?;
            Ok(InboundFrame::Notification {
                channel: params.channel,
                data: params.data,
            })
        }
        (Some("heartbeat"), Some(params)) => {
            let params: HeartbeatParams = serde_json::from_value(params)?;
            Ok(InboundFrame::Heartbeat { kind: params.kind })
        }
        _ => Ok(InboundFrame::Unknown(value)),
    }
}

/// Decode the `result` of a reply, mapping a missing result to `null`
pub fn decode_result<T: DeserializeOwned>(result: Option<Value>) -> Result<T, serde_json::Error> {
    serde_json::from_value(result.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_fixed() {
        assert_eq!(RpcRequest::subscribe(false, &[]).id, 1);
        assert_eq!(RpcRequest::unsubscribe(true, &[]).id, 2);
        assert_eq!(RpcRequest::authenticate("id", "secret").id, 3);
        assert_eq!(RpcRequest::refresh("token").id, 4);
        assert_eq!(RpcRequest::set_heartbeat(10).id, 5);
        assert_eq!(RpcRequest::test().id, 6);
        assert_eq!(RequestKind::from_id(7), None);
    }

    #[test]
    fn test_subscribe_wire_format() {
        let channels = vec!["ticker.BTC-PERPETUAL.100ms".to_string()];
        let request = RpcRequest::subscribe(false, &channels);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "public/subscribe");
        assert_eq!(json["params"]["channels"][0], "ticker.BTC-PERPETUAL.100ms");
        assert_eq!(request.channels(), channels);

        let private = RpcRequest::subscribe(true, &["user.orders.any.any.raw".to_string()]);
        assert_eq!(private.method, "private/subscribe");
    }

    #[test]
    fn test_parse_response() {
        let frame = parse_frame(r#"{"jsonrpc":"2.0","id":6,"result":{"version":"1.2.26"}}"#)
            .unwrap();
        match frame {
            InboundFrame::Response { id, result, error } => {
                assert_eq!(id, 6);
                assert!(result.is_some());
                assert!(error.is_none());
            }
            other => panic!("unexpected frame {:?}", other),
        }

        let frame = parse_frame(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":13004,"message":"invalid_credentials"}}"#,
        )
        .unwrap();
        assert!(matches!(
            frame,
            InboundFrame::Response { id: 3, error: Some(RpcError { code: 13004, .. }), .. }
        ));
    }

    #[test]
    fn test_parse_notification_and_heartbeat() {
        let frame = parse_frame(
            r#"{"jsonrpc":"2.0","method":"subscription","params":{"channel":"ticker.BTC-PERPETUAL.100ms","data":{"a":1}}}"#,
        )
        .unwrap();
        assert!(matches!(
            frame,
            InboundFrame::Notification { ref channel, .. } if channel == "ticker.BTC-PERPETUAL.100ms"
        ));

        let frame =
            parse_frame(r#"{"jsonrpc":"2.0","method":"heartbeat","params":{"type":"test_request"}}"#)
                .unwrap();
        assert_eq!(
            frame,
            InboundFrame::Heartbeat {
                kind: HeartbeatKind::TestRequest
            }
        );

        let frame = parse_frame(r#"{"jsonrpc":"2.0","method":"announcement"}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Unknown(_)));

        assert!(parse_frame("not json").is_err());
    }
}
