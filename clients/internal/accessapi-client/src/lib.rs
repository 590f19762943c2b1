// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! AccessAPI client library
//!
//! Hand-written client for the AccessAPI directory-and-access service.
//! AccessAPI owns the directory of principals (users and groups), the
//! catalogue of permission sets, and the per-target assignment bindings
//! between them.
//!
//! The crate exposes:
//!
//! - [`AccessApi`] -- the trait consumers program against. Anything that
//!   reads or mutates assignments (the rollback engine, the CLI) takes an
//!   `Arc<dyn AccessApi>` so tests can substitute a stub backend.
//! - [`HttpAccessApi`] -- the production implementation over the AccessAPI
//!   REST surface with bearer-token auth and a per-request timeout.
//! - [`ClientError`] -- typed failures with a transient/permanent
//!   classification ([`ClientError::is_transient`]) that retry loops key
//!   on. The client itself never retries; callers own that policy.

pub mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use types::{Assignment, PermissionSet, Principal, PrincipalType, Target};

/// Default per-request timeout. AccessAPI list calls are cheap; anything
/// slower than this is treated as a transport failure and left to the
/// caller's retry policy.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Errors returned by AccessAPI calls
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level failure: connect, TLS, or timeout
    #[error("AccessAPI transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("AccessAPI returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body did not decode as the expected shape
    #[error("invalid AccessAPI response payload: {0}")]
    Decode(String),

    /// The request was rejected before it was sent
    #[error("invalid AccessAPI request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Whether a retry of the same call has a reasonable chance of
    /// succeeding: rate limiting, server-side errors, and transport
    /// failures are transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Api { status, .. } => *status == 429 || *status >= 500,
            ClientError::Decode(_) | ClientError::InvalidRequest(_) => false,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ClientError::Transport(err.to_string())
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ClientError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

/// Trait abstraction over the AccessAPI surface consumed by this
/// repository.
#[async_trait]
pub trait AccessApi: Send + Sync {
    /// List directory principals (users and groups)
    async fn list_principals(&self) -> Result<Vec<Principal>, ClientError>;

    /// List the permission set catalogue
    async fn list_permission_sets(&self) -> Result<Vec<PermissionSet>, ClientError>;

    /// List assignable targets (accounts)
    async fn list_targets(&self) -> Result<Vec<Target>, ClientError>;

    /// List the live assignments scoped to one target
    async fn list_assignments(&self, target_id: &str) -> Result<Vec<Assignment>, ClientError>;

    /// Bind a permission set to a principal on a target. Idempotent on
    /// the service side: re-creating an existing binding succeeds.
    async fn create_assignment(
        &self,
        principal_id: &str,
        principal_type: PrincipalType,
        permission_set_id: &str,
        target_id: &str,
    ) -> Result<(), ClientError>;

    /// Remove a binding. Removing a binding that does not exist is a 404
    /// from the service, surfaced as `ClientError::Api`.
    async fn delete_assignment(
        &self,
        principal_id: &str,
        principal_type: PrincipalType,
        permission_set_id: &str,
        target_id: &str,
    ) -> Result<(), ClientError>;
}

/// Production AccessAPI client over HTTP
#[derive(Clone)]
pub struct HttpAccessApi {
    client: reqwest::Client,
    base_url: String,
    account: String,
}

impl HttpAccessApi {
    /// Create a client for `base_url`, operating as `account`, with a
    /// bearer token
    pub fn new(base_url: &str, account: &str, token: &str) -> Result<Self, ClientError> {
        use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

        if account.is_empty() {
            return Err(ClientError::InvalidRequest(
                "account must not be empty".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ClientError::InvalidRequest(format!("invalid token: {}", e)))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("accessapi-client/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account: account.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.account, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "accessapi GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn send_assignment(
        &self,
        method: reqwest::Method,
        principal_id: &str,
        principal_type: PrincipalType,
        permission_set_id: &str,
        target_id: &str,
    ) -> Result<(), ClientError> {
        let url = self.url(&format!("targets/{}/assignments", target_id));
        tracing::debug!(
            url = %url,
            method = %method,
            principal_id = %principal_id,
            permission_set_id = %permission_set_id,
            "accessapi assignment call"
        );

        let body = serde_json::json!({
            "principal_id": principal_id,
            "principal_type": principal_type,
            "permission_set_id": permission_set_id,
        });

        let response = self
            .client
            .request(method, &url)
            .json(&body)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl AccessApi for HttpAccessApi {
    async fn list_principals(&self) -> Result<Vec<Principal>, ClientError> {
        self.get_json("principals").await
    }

    async fn list_permission_sets(&self) -> Result<Vec<PermissionSet>, ClientError> {
        self.get_json("permission-sets").await
    }

    async fn list_targets(&self) -> Result<Vec<Target>, ClientError> {
        self.get_json("targets").await
    }

    async fn list_assignments(&self, target_id: &str) -> Result<Vec<Assignment>, ClientError> {
        self.get_json(&format!("targets/{}/assignments", target_id))
            .await
    }

    async fn create_assignment(
        &self,
        principal_id: &str,
        principal_type: PrincipalType,
        permission_set_id: &str,
        target_id: &str,
    ) -> Result<(), ClientError> {
        self.send_assignment(
            reqwest::Method::POST,
            principal_id,
            principal_type,
            permission_set_id,
            target_id,
        )
        .await
    }

    async fn delete_assignment(
        &self,
        principal_id: &str,
        principal_type: PrincipalType,
        permission_set_id: &str,
        target_id: &str,
    ) -> Result<(), ClientError> {
        self.send_assignment(
            reqwest::Method::DELETE,
            principal_id,
            principal_type,
            permission_set_id,
            target_id,
        )
        .await
    }
}
