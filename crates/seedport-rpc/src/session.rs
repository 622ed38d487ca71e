//! Session-credential handshake and raw control calls.
//!
//! # Design
//! - The daemon hands out its session credential by rejecting a call with `409`
//!   and a header; the handshake models that rejection as the expected state
//!   transition from "unestablished" to "established".
//! - The cached credential is the only shared mutable state. It is tagged with
//!   an epoch and replaced by compare-and-swap so a slow renewal never
//!   overwrites a newer credential installed by a faster caller.
//! - A call rejected with `409` is retried exactly once with the credential from
//!   that rejection; a second rejection is fatal.

use std::sync::{Mutex, MutexGuard};

use reqwest::{Client, Response, StatusCode};
use seedport_config::DaemonSettings;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info};
use url::Url;

use crate::error::{RpcError, RpcResult};

/// Header carrying the session credential in both directions.
pub const SESSION_HEADER: &str = "x-transmission-session-id";

const SUCCESS: &str = "success";

/// Client for the daemon's control endpoint.
pub struct SessionClient {
    http: Client,
    endpoint: Url,
    basic_auth: Option<(String, String)>,
    slot: Mutex<CredentialSlot>,
}

/// Cached credential tagged with the number of times it has been replaced.
///
/// `epoch == 0` means no handshake has completed yet. An established session
/// may legitimately carry no credential when the daemon does not require one.
#[derive(Debug, Default)]
struct CredentialSlot {
    value: Option<String>,
    epoch: u64,
}

#[derive(Debug, Clone)]
struct Established {
    credential: Option<String>,
    epoch: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    result: String,
    #[serde(default)]
    arguments: Value,
}

impl SessionClient {
    /// Build a client from daemon connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::ClientBuild`] when the HTTP client cannot be constructed.
    pub fn new(settings: &DaemonSettings) -> RpcResult<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|source| RpcError::ClientBuild { source })?;
        let basic_auth = settings
            .username
            .clone()
            .zip(settings.password.clone());
        Ok(Self {
            http,
            endpoint: settings.rpc_url.clone(),
            basic_auth,
            slot: Mutex::new(CredentialSlot::default()),
        })
    }

    /// Control endpoint this client talks to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Probe the daemon without a credential and adopt the one it hands back.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::HandshakeUnavailable`] when the probe fails without
    /// producing a credential-bearing rejection.
    pub async fn handshake(&self) -> RpcResult<Option<String>> {
        let observed = self.lock_slot().epoch;
        let established = self.probe(observed).await?;
        Ok(established.credential)
    }

    /// Invoke a control method and return its `arguments` object.
    ///
    /// # Errors
    ///
    /// - [`RpcError::HandshakeUnavailable`] when no session can be established.
    /// - [`RpcError::CredentialRejected`] after two consecutive rejections.
    /// - [`RpcError::Transport`] or [`RpcError::Status`] when the daemon is unreachable
    ///   or answers with any other non-success status.
    /// - [`RpcError::Daemon`] when the daemon reports a non-success result.
    pub async fn call(&self, method: &'static str, arguments: Value) -> RpcResult<Value> {
        let body = json!({ "method": method, "arguments": arguments });
        let session = self.established().await?;

        let response = self.send(method, &body, session.credential.as_deref()).await?;
        let response = if response.status() == StatusCode::CONFLICT {
            let Some(renewed) = credential_from(&response) else {
                error!(method, "daemon rejected the session without issuing a credential");
                return Err(RpcError::CredentialRejected { method });
            };
            let current = self.install(session.epoch, Some(renewed));
            info!(
                method,
                epoch = current.epoch,
                "session credential renewed; retrying call"
            );
            let retry = self.send(method, &body, current.credential.as_deref()).await?;
            if retry.status() == StatusCode::CONFLICT {
                if let Some(next) = credential_from(&retry) {
                    self.install(current.epoch, Some(next));
                }
                error!(method, "daemon rejected the renewed session credential");
                return Err(RpcError::CredentialRejected { method });
            }
            retry
        } else {
            response
        };

        decode(method, response).await
    }

    async fn established(&self) -> RpcResult<Established> {
        let observed = {
            let slot = self.lock_slot();
            if slot.epoch > 0 {
                return Ok(Established {
                    credential: slot.value.clone(),
                    epoch: slot.epoch,
                });
            }
            slot.epoch
        };
        self.probe(observed).await
    }

    async fn probe(&self, observed: u64) -> RpcResult<Established> {
        let endpoint = self.endpoint.to_string();
        let response = self
            .authorize(self.http.post(self.endpoint.clone()))
            .json(&json!({}))
            .send()
            .await
            .map_err(|source| {
                error!(endpoint = %endpoint, error = %source, "session handshake failed");
                RpcError::HandshakeUnavailable {
                    endpoint: endpoint.clone(),
                    status: None,
                    source: Some(source),
                }
            })?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            if let Some(credential) = credential_from(&response) {
                let current = self.install(observed, Some(credential));
                info!(epoch = current.epoch, "session credential established");
                return Ok(current);
            }
        } else if status.is_success() {
            debug!("daemon accepted a call without a session credential");
            return Ok(self.install(observed, None));
        }

        error!(
            endpoint = %endpoint,
            status = status.as_u16(),
            "session handshake was not answered with a credential"
        );
        Err(RpcError::HandshakeUnavailable {
            endpoint,
            status: Some(status.as_u16()),
            source: None,
        })
    }

    /// Replace the credential if nobody else has since `observed`; return what is current.
    fn install(&self, observed: u64, credential: Option<String>) -> Established {
        let mut slot = self.lock_slot();
        if slot.epoch == observed {
            slot.value = credential;
            slot.epoch += 1;
        } else {
            debug!(
                observed,
                current = slot.epoch,
                "discarding stale credential renewal"
            );
        }
        Established {
            credential: slot.value.clone(),
            epoch: slot.epoch,
        }
    }

    async fn send(
        &self,
        method: &'static str,
        body: &Value,
        credential: Option<&str>,
    ) -> RpcResult<Response> {
        let mut request = self.authorize(self.http.post(self.endpoint.clone())).json(body);
        if let Some(credential) = credential {
            request = request.header(SESSION_HEADER, credential);
        }
        request
            .send()
            .await
            .map_err(|source| RpcError::Transport { method, source })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.basic_auth {
            Some((username, password)) => request.basic_auth(username, Some(password)),
            None => request,
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, CredentialSlot> {
        match self.slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("session credential mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

fn credential_from(response: &Response) -> Option<String> {
    response
        .headers()
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

async fn decode(method: &'static str, response: Response) -> RpcResult<Value> {
    let status = response.status();
    if !status.is_success() {
        return Err(RpcError::Status {
            method,
            status: status.as_u16(),
        });
    }
    let envelope: Envelope = response
        .json()
        .await
        .map_err(|source| RpcError::Decode { method, source })?;
    if envelope.result == SUCCESS {
        Ok(envelope.arguments)
    } else {
        Err(RpcError::Daemon {
            method,
            result: envelope.result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::prelude::*;
    use std::time::Duration;

    const RPC_PATH: &str = "/transmission/rpc";

    fn settings_for(server: &MockServer) -> Result<DaemonSettings> {
        Ok(DaemonSettings {
            rpc_url: Url::parse(&server.url(RPC_PATH))?,
            username: None,
            password: None,
            timeout: Duration::from_secs(5),
            state_dir: None,
        })
    }

    #[tokio::test]
    async fn first_call_performs_handshake() -> Result<()> {
        let server = MockServer::start_async().await;
        let probe = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header_missing(SESSION_HEADER);
            then.status(409).header(SESSION_HEADER, "token-1");
        });
        let call = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token-1")
                .body_includes("session-get");
            then.status(200)
                .json_body(serde_json::json!({"result": "success", "arguments": {"version": "4.0"}}));
        });

        let client = SessionClient::new(&settings_for(&server)?)?;
        let arguments = client.call("session-get", json!({})).await?;
        assert_eq!(arguments["version"], "4.0");

        let again = client.call("session-get", json!({})).await?;
        assert_eq!(again["version"], "4.0");

        probe.assert_calls(1);
        call.assert_calls(2);
        Ok(())
    }

    #[tokio::test]
    async fn rotated_credential_is_retried_exactly_once() -> Result<()> {
        let server = MockServer::start_async().await;
        let probe = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header_missing(SESSION_HEADER);
            then.status(409).header(SESSION_HEADER, "token-1");
        });
        let stale = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token-1");
            then.status(409).header(SESSION_HEADER, "token-2");
        });
        let fresh = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token-2");
            then.status(200)
                .json_body(serde_json::json!({"result": "success", "arguments": {}}));
        });

        let client = SessionClient::new(&settings_for(&server)?)?;
        client.call("torrent-get", json!({"fields": ["id"]})).await?;

        probe.assert_calls(1);
        stale.assert_calls(1);
        fresh.assert_calls(1);
        Ok(())
    }

    #[tokio::test]
    async fn consecutive_rejections_are_fatal() -> Result<()> {
        let server = MockServer::start_async().await;
        let probe = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header_missing(SESSION_HEADER);
            then.status(409).header(SESSION_HEADER, "token-1");
        });
        let first = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token-1");
            then.status(409).header(SESSION_HEADER, "token-2");
        });
        let second = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token-2");
            then.status(409).header(SESSION_HEADER, "token-3");
        });

        let client = SessionClient::new(&settings_for(&server)?)?;
        let result = client.call("torrent-get", json!({})).await;
        assert!(matches!(
            result,
            Err(RpcError::CredentialRejected {
                method: "torrent-get"
            })
        ));

        probe.assert_calls(1);
        first.assert_calls(1);
        second.assert_calls(1);
        Ok(())
    }

    #[tokio::test]
    async fn daemon_result_passes_through_verbatim() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header_missing(SESSION_HEADER);
            then.status(409).header(SESSION_HEADER, "token-1");
        });
        server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token-1");
            then.status(200)
                .json_body(serde_json::json!({"result": "duplicate torrent", "arguments": {}}));
        });

        let client = SessionClient::new(&settings_for(&server)?)?;
        let result = client.call("torrent-add", json!({})).await;
        match result {
            Err(RpcError::Daemon { method, result }) => {
                assert_eq!(method, "torrent-add");
                assert_eq!(result, "duplicate torrent");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn probe_without_rejection_reports_unavailable() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path(RPC_PATH);
            then.status(500);
        });

        let client = SessionClient::new(&settings_for(&server)?)?;
        let result = client.call("torrent-get", json!({})).await;
        assert!(matches!(
            result,
            Err(RpcError::HandshakeUnavailable {
                status: Some(500),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_daemon_reports_unavailable() -> Result<()> {
        let settings = DaemonSettings {
            rpc_url: Url::parse("http://127.0.0.1:1/transmission/rpc")?,
            username: None,
            password: None,
            timeout: Duration::from_secs(2),
            state_dir: None,
        };
        let client = SessionClient::new(&settings)?;
        let result = client.handshake().await;
        assert!(matches!(
            result,
            Err(RpcError::HandshakeUnavailable {
                status: None,
                source: Some(_),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn other_statuses_propagate_without_retry() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header_missing(SESSION_HEADER);
            then.status(409).header(SESSION_HEADER, "token-1");
        });
        let failing = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header(SESSION_HEADER, "token-1");
            then.status(503);
        });

        let client = SessionClient::new(&settings_for(&server)?)?;
        let result = client.call("torrent-get", json!({})).await;
        assert!(matches!(
            result,
            Err(RpcError::Status { status: 503, .. })
        ));
        failing.assert_calls(1);
        Ok(())
    }

    #[tokio::test]
    async fn basic_credentials_are_presented() -> Result<()> {
        let server = MockServer::start_async().await;
        let probe = server.mock(|when, then| {
            when.method(POST)
                .path(RPC_PATH)
                .header("authorization", "Basic YWRtaW46c2VjcmV0");
            then.status(409).header(SESSION_HEADER, "token-1");
        });

        let mut settings = settings_for(&server)?;
        settings.username = Some("admin".to_string());
        settings.password = Some("secret".to_string());
        let client = SessionClient::new(&settings)?;
        let credential = client.handshake().await?;
        assert_eq!(credential.as_deref(), Some("token-1"));
        probe.assert();
        Ok(())
    }

    #[test]
    fn stale_renewal_does_not_clobber_newer_credential() -> Result<()> {
        let settings = DaemonSettings {
            rpc_url: Url::parse("http://localhost:9091/transmission/rpc")?,
            username: None,
            password: None,
            timeout: Duration::from_secs(1),
            state_dir: None,
        };
        let client = SessionClient::new(&settings)?;
        let first = client.install(0, Some("token-1".to_string()));
        assert_eq!(first.epoch, 1);

        let newer = client.install(1, Some("token-3".to_string()));
        assert_eq!(newer.epoch, 2);

        let stale = client.install(1, Some("token-2".to_string()));
        assert_eq!(stale.credential.as_deref(), Some("token-3"));
        assert_eq!(stale.epoch, 2);
        Ok(())
    }
}
