//! GraphQL transport.
//!
//! One HTTP client serves the three server contracts the runtime needs:
//! token refresh, logout and cache mutations. Every call is a JSON POST of
//! `{operationName, query, variables}` to the GraphQL endpoint; the payload
//! of interest sits under `data.<operationName>`.

use std::sync::Arc;

use async_trait::async_trait;
use hearth_auth::{
    AuthError, AuthResult, LogoutClient, RefreshClient, RefreshRequest, RefreshedSession,
    TokenStore,
};
use hearth_cache::{MutationDescriptor, MutationError, MutationResponse, MutationTransport};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::CallError;

const REFRESH_OPERATION: &str = "refreshToken";
const REFRESH_DOCUMENT: &str = "mutation refreshToken($refreshToken: String!, $networkDomain: String) { \
refreshToken(refreshToken: $refreshToken, networkDomain: $networkDomain) { \
accessToken refreshToken member { id name email roleType } network { id name domain } } }";

const LOGOUT_OPERATION: &str = "logout";
const LOGOUT_DOCUMENT: &str = "mutation logout { logout { status } }";

/// Error codes the server uses for a missing or rejected session.
const AUTH_ERROR_CODES: [&str; 2] = ["UNAUTHENTICATED", "FORBIDDEN"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlRequest<'a> {
    operation_name: &'a str,
    query: &'a str,
    variables: Value,
}

#[derive(Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Deserialize)]
struct GraphqlError {
    message: String,
    #[serde(default)]
    extensions: Option<GraphqlErrorExtensions>,
}

#[derive(Deserialize)]
struct GraphqlErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}

impl GraphqlError {
    fn is_auth(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .is_some_and(|code| AUTH_ERROR_CODES.contains(&code))
    }
}

pub struct GraphqlTransport {
    http: reqwest::Client,
    endpoint: String,
    store: Arc<TokenStore>,
}

impl GraphqlTransport {
    /// Builds a transport that authenticates mutations with the bearer
    /// token currently in `store`.
    pub fn new(api: &ApiConfig, store: Arc<TokenStore>) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(api.timeout).build()?;
        Ok(Self {
            http,
            endpoint: api.endpoint(),
            store,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn execute(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
        bearer: Option<&str>,
    ) -> Result<Value, CallError> {
        let body = GraphqlRequest {
            operation_name: operation,
            query,
            variables,
        };
        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        debug!(operation, "Sending GraphQL request");
        let resp = request
            .send()
            .await
            .map_err(|e| CallError::Network(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GraphqlResponse = resp
            .json()
            .await
            .map_err(|e| CallError::Invalid(format!("{operation}: {e}")))?;
        read_payload(operation, payload)
    }
}

fn read_payload(operation: &str, payload: GraphqlResponse) -> Result<Value, CallError> {
    let data = payload
        .data
        .and_then(|mut data| data.get_mut(operation).map(Value::take))
        .filter(|v| !v.is_null());

    if !payload.errors.is_empty() {
        let messages = payload
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        if payload.errors.iter().any(GraphqlError::is_auth) {
            return Err(CallError::Unauthenticated(messages));
        }
        match data {
            Some(_) => warn!(operation, errors = %messages, "Partial GraphQL errors"),
            None => return Err(CallError::Graphql(messages)),
        }
    }

    data.ok_or_else(|| CallError::Invalid(format!("missing data.{operation}")))
}

#[async_trait]
impl RefreshClient for GraphqlTransport {
    async fn refresh(&self, request: RefreshRequest) -> AuthResult<RefreshedSession> {
        let variables =
            serde_json::to_value(&request).map_err(|e| AuthError::internal(e.to_string()))?;
        let payload = self
            .execute(REFRESH_OPERATION, REFRESH_DOCUMENT, variables, None)
            .await?;
        serde_json::from_value(payload)
            .map_err(|e| AuthError::refresh_failed(format!("unreadable refresh response: {e}")))
    }
}

#[async_trait]
impl LogoutClient for GraphqlTransport {
    async fn logout(&self, access_token: &str) -> AuthResult<()> {
        self.execute(
            LOGOUT_OPERATION,
            LOGOUT_DOCUMENT,
            Value::Object(Default::default()),
            Some(access_token),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl MutationTransport for GraphqlTransport {
    async fn dispatch(
        &self,
        mutation: &MutationDescriptor,
    ) -> Result<MutationResponse, MutationError> {
        let bearer = self
            .store
            .bearer()
            .ok_or_else(|| MutationError::unauthorized("no usable access token"))?;
        let operation = mutation.operation_name();
        let payload = self
            .execute(
                operation,
                mutation.document(),
                mutation.variables(),
                Some(&bearer),
            )
            .await?;
        mutation.read_response(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(value: Value) -> GraphqlResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_reads_operation_payload() {
        let payload = read_payload(
            "logout",
            response(json!({ "data": { "logout": { "status": "SUCCEEDED" } } })),
        )
        .unwrap();
        assert_eq!(payload, json!({ "status": "SUCCEEDED" }));
    }

    #[test]
    fn test_missing_payload() {
        let err = read_payload("logout", response(json!({ "data": { "logout": null } })));
        assert_eq!(err, Err(CallError::Invalid("missing data.logout".into())));
    }

    #[test]
    fn test_errors_without_data() {
        let err = read_payload(
            "updateNetwork",
            response(json!({
                "data": null,
                "errors": [{ "message": "a" }, { "message": "b" }]
            })),
        );
        assert_eq!(err, Err(CallError::Graphql("a; b".into())));
    }

    #[test]
    fn test_unauthenticated_code() {
        let err = read_payload(
            "updateNetwork",
            response(json!({
                "data": { "updateNetwork": { "status": "SUCCEEDED" } },
                "errors": [{ "message": "token expired", "extensions": { "code": "UNAUTHENTICATED" } }]
            })),
        );
        assert_eq!(err, Err(CallError::Unauthenticated("token expired".into())));
    }

    #[test]
    fn test_partial_errors_keep_data() {
        let payload = read_payload(
            "updateNetwork",
            response(json!({
                "data": { "updateNetwork": { "status": "SUCCEEDED" } },
                "errors": [{ "message": "description ignored" }]
            })),
        )
        .unwrap();
        assert_eq!(payload["status"], "SUCCEEDED");
    }
}
