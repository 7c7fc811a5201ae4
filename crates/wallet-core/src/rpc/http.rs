//! HTTP JSON-RPC transport.
//!
//! Every request is a `POST` carrying the client key as a bearer token and
//! the caller identification in the `X-AppInfo` header.
//!
//! # Example
//!
//! ```no_run
//! use modular_wallet_core::config::{AppInfo, TransportConfig};
//! use modular_wallet_core::rpc::http::HttpTransport;
//!
//! let transport = HttpTransport::modular_wallet(&TransportConfig {
//!     url: "https://modular-sdk.circle.com/v1/rpc/w3s/buidl/polygonAmoy".to_string(),
//!     client_key: "TEST_CLIENT_KEY".to_string(),
//!     app_info: AppInfo::native("https://app.example.com"),
//! })
//! .unwrap();
//! ```

use std::fmt;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::{JsonRpcRequest, JsonRpcResponse, RequestIds, Transport, TransportKind};
use crate::config::{AppInfo, TransportConfig};
use crate::error::{Error, Result};

/// Name of the caller identification header.
pub const APP_INFO_HEADER: &str = "X-AppInfo";

/// A JSON-RPC transport over HTTPS.
pub struct HttpTransport {
    http: HttpClient,
    url: Url,
    client_key: String,
    app_info: AppInfo,
    kind: TransportKind,
    ids: RequestIds,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("url", &self.url.as_str())
            .field("app_info", &self.app_info)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Creates a transport to a generic JSON-RPC endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the URL does not parse.
    pub fn new(config: &TransportConfig) -> Result<Self> {
        Self::with_kind(config, TransportKind::Generic)
    }

    /// Creates a transport to the modular wallet backend.
    ///
    /// Smart accounts created over this transport validate their address
    /// against the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the URL does not parse.
    pub fn modular_wallet(config: &TransportConfig) -> Result<Self> {
        Self::with_kind(config, TransportKind::ModularWallet)
    }

    fn with_kind(config: &TransportConfig, kind: TransportKind) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                config.url,
                url.scheme()
            )));
        }

        Ok(Self {
            http: HttpClient::new(),
            url,
            client_key: config.client_key.clone(),
            app_info: config.app_info.clone(),
            kind,
            ids: RequestIds::default(),
        })
    }

    /// The endpoint URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait(?Send)]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.ids.next();
        debug!(method, id, "sending JSON-RPC request");

        let response = self
            .http
            .post(self.url.clone())
            .bearer_auth(&self.client_key)
            .header(APP_INFO_HEADER, self.app_info.header_value())
            .json(&JsonRpcRequest::new(id, method, params))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Some backends pair a non-2xx status with a JSON-RPC error body.
            if let Ok(JsonRpcResponse {
                error: Some(error), ..
            }) = serde_json::from_str::<JsonRpcResponse>(&body)
            {
                warn!(method, id, code = %error.code, "JSON-RPC error response");
                return Err(Error::Rpc(error));
            }
            warn!(method, id, status = status.as_u16(), "HTTP error response");
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let response: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("{method}: {e}")))?;
        if let Some(error) = &response.error {
            warn!(
                method,
                id,
                code = %error.code,
                message = %error.message,
                "JSON-RPC error response"
            );
        }
        response.into_result()
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }
}
