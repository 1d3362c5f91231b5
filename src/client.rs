//! JSON-RPC client for the I2PControl endpoint.
//!
//! [`ControlClient`] wraps `reqwest::Client` and provides a typed method for
//! each I2PControl operation the command layer uses. Lifecycle actions go
//! through the `RouterManager` method, status queries through `RouterInfo`,
//! and rate queries through `GetRate`.
//!
//! ## Authentication
//!
//! `Authenticate` exchanges the password for a session token. Every other
//! method injects that token into its params; calling one before
//! [`ControlClient::authenticate`] fails with [`ClientError::Unauthenticated`]
//! without touching the network.
//!
//! ## Error handling
//!
//! Transport failures surface as [`ClientError::Request`], a JSON-RPC `error`
//! member as [`ClientError::Rpc`] (the router uses -32001 for a wrong
//! password and -32002/-32003 for missing or expired tokens), and anything
//! else unexpected in the response as [`ClientError::Protocol`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;

/// I2PControl API version sent with `Authenticate`.
const API_VERSION: u32 = 1;

/// The post-authentication capability set of the control endpoint.
///
/// The dispatcher and the drain monitor are generic over this trait so tests
/// can drive them with scripted fakes instead of a live router.
#[allow(async_fn_in_trait)]
pub trait RouterControl {
    async fn echo(&self, text: &str) -> Result<String, ClientError>;
    async fn restart(&self) -> Result<String, ClientError>;
    async fn restart_graceful(&self) -> Result<String, ClientError>;
    async fn shutdown(&self) -> Result<String, ClientError>;
    async fn shutdown_graceful(&self) -> Result<String, ClientError>;
    async fn update(&self) -> Result<String, ClientError>;
    async fn find_updates(&self) -> Result<bool, ClientError>;
    async fn status(&self) -> Result<String, ClientError>;
    async fn net_status(&self) -> Result<String, ClientError>;
    async fn reseeding(&self) -> Result<bool, ClientError>;
    async fn participating_tunnels(&self) -> Result<i64, ClientError>;
    async fn rate_stat(&self, stat: &str, period_ms: i64) -> Result<f64, ClientError>;
}

/// JSON-RPC client for a single I2PControl endpoint.
pub struct ControlClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    token: Option<String>,
}

impl ControlClient {
    /// Create a new client for the configured endpoint. No I/O happens until
    /// the first call.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            url: config.endpoint_url(),
            next_id: AtomicU64::new(1),
            token: None,
        }
    }

    /// `Authenticate`: exchange the password for a session token.
    ///
    /// The token is stored for the lifetime of the client and injected into
    /// every subsequent call. There is no re-authentication path; the caller
    /// treats failure as fatal.
    pub async fn authenticate(&mut self, password: &str) -> Result<(), ClientError> {
        let result = self
            .call(
                "Authenticate",
                json!({ "API": API_VERSION, "Password": password }),
            )
            .await?;
        let token = result
            .get("Token")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Protocol("Authenticate response has no Token".into()))?;
        self.token = Some(token.to_string());
        Ok(())
    }

    fn token(&self) -> Result<&str, ClientError> {
        self.token.as_deref().ok_or(ClientError::Unauthenticated)
    }

    /// POST one JSON-RPC request and return its `result` member.
    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self
            .http
            .post(&self.url)
            .json(&request_envelope(id, method, params))
            .send()
            .await
            .map_err(ClientError::Request)?;
        Self::handle_response(resp).await
    }

    /// Parse an HTTP response into the JSON-RPC `result` member.
    async fn handle_response(resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        let body = resp.text().await.map_err(ClientError::Request)?;
        if !status.is_success() {
            return Err(ClientError::Protocol(format!("HTTP {status}: {body}")));
        }
        let envelope: Value = serde_json::from_str(&body)
            .map_err(|e| ClientError::Protocol(format!("Invalid JSON from router: {e}")))?;
        parse_envelope(envelope)
    }

    /// `RouterManager` with a single action key; returns the value the
    /// router reported for that key.
    async fn router_manager(&self, action: &str) -> Result<Value, ClientError> {
        let result = self
            .call("RouterManager", json!({ "Token": self.token()?, action: null }))
            .await?;
        Ok(result.get(action).cloned().unwrap_or(Value::Null))
    }

    /// Lifecycle action through `RouterManager`. The router usually answers
    /// these with `null`, so `ack` is what the operator sees in that case.
    async fn lifecycle(&self, action: &str, ack: &str) -> Result<String, ClientError> {
        match self.router_manager(action).await? {
            Value::String(s) => Ok(s),
            _ => Ok(ack.to_string()),
        }
    }

    /// `RouterInfo` with a single query key; returns the reported value.
    async fn router_info(&self, key: &str) -> Result<Value, ClientError> {
        let result = self
            .call("RouterInfo", json!({ "Token": self.token()?, key: null }))
            .await?;
        result
            .get(key)
            .cloned()
            .ok_or_else(|| ClientError::Protocol(format!("RouterInfo response missing {key}")))
    }
}

impl RouterControl for ControlClient {
    async fn echo(&self, text: &str) -> Result<String, ClientError> {
        let result = self
            .call("Echo", json!({ "Token": self.token()?, "Echo": text }))
            .await?;
        result
            .get("Result")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Protocol("Echo response has no Result".into()))
    }

    async fn restart(&self) -> Result<String, ClientError> {
        self.lifecycle("Restart", "Router restart initiated").await
    }

    async fn restart_graceful(&self) -> Result<String, ClientError> {
        self.lifecycle("RestartGraceful", "Graceful router restart initiated")
            .await
    }

    async fn shutdown(&self) -> Result<String, ClientError> {
        self.lifecycle("Shutdown", "Router shutdown initiated").await
    }

    async fn shutdown_graceful(&self) -> Result<String, ClientError> {
        self.lifecycle("ShutdownGraceful", "Graceful router shutdown initiated")
            .await
    }

    async fn update(&self) -> Result<String, ClientError> {
        self.lifecycle("Update", "Router update initiated").await
    }

    async fn find_updates(&self) -> Result<bool, ClientError> {
        self.router_manager("FindUpdates")
            .await?
            .as_bool()
            .ok_or_else(|| ClientError::Protocol("FindUpdates did not return a boolean".into()))
    }

    async fn status(&self) -> Result<String, ClientError> {
        let value = self.router_info("i2p.router.status").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ClientError::Protocol("Router status is not a string".into()))
    }

    async fn net_status(&self) -> Result<String, ClientError> {
        let value = self.router_info("i2p.router.net.status").await?;
        let code = value
            .as_i64()
            .ok_or_else(|| ClientError::Protocol("Network status is not an integer".into()))?;
        Ok(net_status_description(code)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown network status code {code}")))
    }

    async fn reseeding(&self) -> Result<bool, ClientError> {
        self.router_info("i2p.router.netdb.isreseeding")
            .await?
            .as_bool()
            .ok_or_else(|| ClientError::Protocol("Reseed state is not a boolean".into()))
    }

    async fn participating_tunnels(&self) -> Result<i64, ClientError> {
        self.router_info("i2p.router.net.tunnels.participating")
            .await?
            .as_i64()
            .ok_or_else(|| ClientError::Protocol("Tunnel count is not an integer".into()))
    }

    async fn rate_stat(&self, stat: &str, period_ms: i64) -> Result<f64, ClientError> {
        let result = self
            .call(
                "GetRate",
                json!({ "Token": self.token()?, "Stat": stat, "Period": period_ms }),
            )
            .await?;
        result
            .get("Result")
            .and_then(Value::as_f64)
            .ok_or_else(|| ClientError::Protocol("GetRate did not return a number".into()))
    }
}

/// Build a JSON-RPC 2.0 request envelope.
fn request_envelope(id: u64, method: &str, params: Value) -> Value {
    json!({
        "id": id,
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
}

/// Split a JSON-RPC response envelope into its `result`, mapping the `error`
/// member to [`ClientError::Rpc`].
fn parse_envelope(envelope: Value) -> Result<Value, ClientError> {
    if let Some(err) = envelope.get("error") {
        let rpc: RpcError = serde_json::from_value(err.clone()).unwrap_or(RpcError {
            code: 0,
            message: err.to_string(),
        });
        return Err(ClientError::Rpc {
            code: rpc.code,
            message: rpc.message,
        });
    }
    envelope
        .get("result")
        .cloned()
        .ok_or_else(|| ClientError::Protocol("Response has neither result nor error".into()))
}

/// `i2p.router.net.status` codes as reported by the router.
fn net_status_description(code: i64) -> Option<&'static str> {
    Some(match code {
        0 => "OK",
        1 => "TESTING",
        2 => "FIREWALLED",
        3 => "HIDDEN",
        4 => "WARN_FIREWALLED_AND_FAST",
        5 => "WARN_FIREWALLED_AND_FLOODFILL",
        6 => "WARN_FIREWALLED_WITH_INBOUND_TCP",
        7 => "WARN_FIREWALLED_WITH_UDP_DISABLED",
        8 => "ERROR_I2CP",
        9 => "ERROR_CLOCK_SKEW",
        10 => "ERROR_PRIVATE_TCP_ADDRESS",
        11 => "ERROR_SYMMETRIC_NAT",
        12 => "ERROR_UDP_PORT_IN_USE",
        13 => "ERROR_NO_ACTIVE_PEERS_CHECK_CONNECTION_AND_FIREWALL",
        14 => "ERROR_UDP_DISABLED_AND_TCP_UNSET",
        _ => return None,
    })
}

/// JSON-RPC `error` member.
#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Errors returned by [`ControlClient`] methods.
#[derive(Debug)]
pub enum ClientError {
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.).
    Request(reqwest::Error),
    /// The router returned a JSON-RPC error.
    Rpc { code: i64, message: String },
    /// The response was not shaped like an I2PControl answer.
    Protocol(String),
    /// A command method was called before `authenticate` succeeded.
    Unauthenticated,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Request(e) => write!(f, "HTTP request failed: {}", e),
            ClientError::Rpc { code, message } => {
                write!(f, "Router error {}: {}", code, message)
            }
            ClientError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            ClientError::Unauthenticated => write!(f, "Session is not authenticated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cli, Config};
    use clap::Parser;

    fn test_config() -> Config {
        Config::from_cli(Cli::try_parse_from(["i2pctl"]).unwrap())
    }

    #[test]
    fn envelope_carries_id_method_and_params() {
        let envelope = request_envelope(7, "Echo", json!({ "Echo": "hi" }));
        assert_eq!(envelope["id"], 7);
        assert_eq!(envelope["jsonrpc"], "2.0");
        assert_eq!(envelope["method"], "Echo");
        assert_eq!(envelope["params"]["Echo"], "hi");
    }

    #[test]
    fn parse_envelope_returns_result() {
        let result = parse_envelope(json!({ "id": 1, "result": { "Token": "t" } })).unwrap();
        assert_eq!(result["Token"], "t");
    }

    #[test]
    fn parse_envelope_maps_error_member() {
        let err = parse_envelope(json!({
            "id": 1,
            "error": { "code": -32001, "message": "Invalid password provided" }
        }))
        .unwrap_err();
        match err {
            ClientError::Rpc { code, message } => {
                assert_eq!(code, -32001);
                assert_eq!(message, "Invalid password provided");
            }
            other => panic!("expected Rpc error, got {other}"),
        }
    }

    #[test]
    fn parse_envelope_rejects_empty_response() {
        let err = parse_envelope(json!({ "id": 1 })).unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn net_status_codes() {
        assert_eq!(net_status_description(0), Some("OK"));
        assert_eq!(net_status_description(2), Some("FIREWALLED"));
        assert_eq!(net_status_description(11), Some("ERROR_SYMMETRIC_NAT"));
        assert_eq!(net_status_description(99), None);
    }

    #[tokio::test]
    async fn commands_require_authentication_first() {
        // Token is checked before any request is built, so this never
        // touches the network.
        let client = ControlClient::new(&test_config());
        let err = client.echo("hello").await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
    }
}
