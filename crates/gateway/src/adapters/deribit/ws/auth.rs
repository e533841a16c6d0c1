//! Credential state for the WebSocket session

use super::outbound::Outbound;
use crate::config::Credentials;
use crate::error::SessionError;
use crate::messages::RpcRequest;
use crate::messages::rpc::AuthResult;
use arc_swap::ArcSwapOption;
use kestrel_core::Timestamp;
use log::{debug, info, warn};
use std::sync::Arc;

/// Access/refresh token pair from `public/auth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub issued_at: Timestamp,
}

impl AuthToken {
    pub fn from_result(result: AuthResult) -> Self {
        Self {
            access_token: result.access_token,
            refresh_token: result.refresh_token,
            expires_in: result.expires_in,
            issued_at: chrono::Utc::now(),
        }
    }

    /// None when `expires_in` is beyond what a timestamp can hold
    pub fn expires_at(&self) -> Option<Timestamp> {
        let lifetime = i64::try_from(self.expires_in)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)?;
        self.issued_at.checked_add_signed(lifetime)
    }
}

/// Holds the current token.
///
/// Readers take a snapshot; a refresh swaps in a new token without touching
/// the one a reader may still hold.
#[derive(Debug)]
pub struct AuthSession {
    credentials: Credentials,
    token: ArcSwapOption<AuthToken>,
}

impl AuthSession {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            token: ArcSwapOption::empty(),
        }
    }

    /// Send the client-credentials grant
    pub fn authenticate(&self, outbound: &Outbound) -> Result<(), SessionError> {
        if self.credentials.is_empty() {
            return Err(SessionError::MissingCredentials);
        }
        debug!("Authenticating as {}", self.credentials.client_id);
        outbound.send(&RpcRequest::authenticate(
            &self.credentials.client_id,
            &self.credentials.client_secret,
        ))
    }

    /// Send the refresh-token grant. Returns false when there is no token to refresh.
    pub fn refresh(&self, outbound: &Outbound) -> Result<bool, SessionError> {
        let Some(token) = self.current() else {
            return Ok(false);
        };
        outbound.send(&RpcRequest::refresh(&token.refresh_token))?;
        Ok(true)
    }

    /// Replace the current token
    pub fn store(&self, result: AuthResult) -> Arc<AuthToken> {
        let token = Arc::new(AuthToken::from_result(result));
        self.token.store(Some(Arc::clone(&token)));
        match token.expires_at() {
            Some(at) => info!("Token stored, expires at {}", at),
            None => warn!("Token stored, expiry out of range ({}s)", token.expires_in),
        }
        token
    }

    pub fn invalidate(&self) {
        self.token.store(None);
    }

    pub fn current(&self) -> Option<Arc<AuthToken>> {
        self.token.load_full()
    }

    pub fn has_token(&self) -> bool {
        self.token.load().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn auth_result(access: &str, refresh: &str) -> AuthResult {
        AuthResult {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            expires_in: 900,
            scope: "session:test".to_string(),
            token_type: "bearer".to_string(),
        }
    }

    #[test]
    fn test_missing_credentials() {
        let auth = AuthSession::new(Credentials::default());
        let outbound = Outbound::new();
        assert!(matches!(
            auth.authenticate(&outbound),
            Err(SessionError::MissingCredentials)
        ));
    }

    #[test]
    fn test_refresh_uses_current_token() {
        let auth = AuthSession::new(Credentials::new("id", "secret"));
        let outbound = Outbound::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        outbound.attach(tx);

        assert!(!auth.refresh(&outbound).unwrap());
        assert!(rx.try_recv().is_err());

        let first = auth.store(auth_result("a1", "r1"));
        assert!(auth.refresh(&outbound).unwrap());
        let sent: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(sent["id"], 4);
        assert_eq!(sent["params"]["refresh_token"], "r1");

        // A reader's snapshot survives the swap
        auth.store(auth_result("a2", "r2"));
        assert_eq!(first.access_token, "a1");
        assert_eq!(auth.current().unwrap().access_token, "a2");

        auth.invalidate();
        assert!(!auth.has_token());
    }

    #[test]
    fn test_oversized_lifetime_is_stored() {
        // Formatting the expiry in the log line must not overflow
        let _ = env_logger::builder()
            .is_test(true)
            .filter_level(log::LevelFilter::Trace)
            .try_init();
        let auth = AuthSession::new(Credentials::new("id", "secret"));

        let normal = auth.store(auth_result("a1", "r1"));
        assert_eq!(
            normal.expires_at(),
            Some(normal.issued_at + chrono::TimeDelta::seconds(900))
        );

        for expires_in in [10_000_000_000_000, u64::MAX] {
            let mut result = auth_result("a2", "r2");
            result.expires_in = expires_in;
            let token = auth.store(result);
            assert_eq!(token.expires_at(), None);
            assert_eq!(auth.current().unwrap().access_token, "a2");
        }
    }
}
