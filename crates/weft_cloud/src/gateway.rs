//! Public API gateway: identity-checked front door for the compute unit.
//!
//! Per-request state machine:
//! `Received -> AuthorizationCheck -> (Authorized -> Invoke -> Respond)
//! | (Unauthorized -> Reject)`. The compute unit is never invoked for
//! unauthenticated traffic, and CORS headers ride on every response path
//! so a cross-origin browser client can read error bodies.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, warn};

use weft_graph::{Attr, ResourceKind, ResourceSpec};

use crate::compute::{
    invoke_with_limit, ComputeInvoker, InvocationError, InvocationOutcome, InvocationRequest,
};
use crate::identity::{AuthError, TokenValidator};

/// CORS response headers attached to every response path.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_headers: String,
    pub allow_methods: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_headers: "Content-Type,Authorization".to_string(),
            allow_methods: "OPTIONS,POST".to_string(),
        }
    }
}

impl CorsConfig {
    pub fn headers(&self) -> Vec<(String, String)> {
        vec![
            (
                "Access-Control-Allow-Origin".to_string(),
                self.allow_origin.clone(),
            ),
            (
                "Access-Control-Allow-Headers".to_string(),
                self.allow_headers.clone(),
            ),
            (
                "Access-Control-Allow-Methods".to_string(),
                self.allow_methods.clone(),
            ),
        ]
    }
}

/// Build the REST API resource spec: the identity pool bound as the
/// authorizer in front of the compute unit.
pub fn rest_api_spec(
    name: &str,
    user_pool: &str,
    compute: &str,
    cors: &CorsConfig,
) -> ResourceSpec {
    ResourceSpec::new(name, ResourceKind::RestApi)
        .with_property("authorizer_user_pool", Attr::output(user_pool, "id"))
        .with_property("target_function", Attr::output(compute, "arn"))
        .with_property("cors_allow_origin", Attr::lit(&cors.allow_origin))
        .with_property("cors_allow_headers", Attr::lit(&cors.allow_headers))
        .with_property("cors_allow_methods", Attr::lit(&cors.allow_methods))
}

/// An incoming request as seen by the gateway.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    /// Bearer token from the `Authorization` header, if any.
    pub bearer_token: Option<String>,
    pub body: String,
}

/// Response with status, headers (CORS always present) and JSON body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Request lifecycle states, logged as the machine advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    AuthorizationCheck,
    Authorized,
    Invoked,
    Responded,
    Rejected,
}

/// The live request handler bound to a validator and a compute invoker.
///
/// The assembler provisions the gateway resource; this type models the
/// request handling the platform performs once the topology exists.
pub struct Gateway {
    validator: Arc<dyn TokenValidator>,
    invoker: Arc<dyn ComputeInvoker>,
    cors: CorsConfig,
    invocation_timeout: Duration,
}

impl Gateway {
    pub fn new(
        validator: Arc<dyn TokenValidator>,
        invoker: Arc<dyn ComputeInvoker>,
        cors: CorsConfig,
        invocation_timeout: Duration,
    ) -> Self {
        Self {
            validator,
            invoker,
            cors,
            invocation_timeout,
        }
    }

    /// Run one request through the state machine.
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        debug!(method = %request.method, path = %request.path, state = ?RequestState::Received, "request received");

        // Preflight needs no authorization; it only carries CORS.
        if request.method.eq_ignore_ascii_case("OPTIONS") {
            return self.respond(204, String::new());
        }

        debug!(state = ?RequestState::AuthorizationCheck, "checking authorization");
        let claims = match &request.bearer_token {
            None => {
                warn!(state = ?RequestState::Rejected, "no bearer token");
                return self.reject(401, AuthError::MissingToken.to_string());
            }
            Some(token) => match self.validator.validate(token).await {
                Ok(claims) => claims,
                Err(e) => {
                    warn!(state = ?RequestState::Rejected, error = %e, "token rejected");
                    return self.reject(403, e.to_string());
                }
            },
        };

        debug!(state = ?RequestState::Authorized, subject = %claims.subject, "authorized");
        let mut invocation: InvocationRequest = match serde_json::from_str(&request.body) {
            Ok(req) => req,
            Err(e) => {
                return self.reject(400, format!("malformed request body: {e}"));
            }
        };
        invocation
            .auth_claims
            .insert("sub".to_string(), claims.subject.clone());
        invocation.auth_claims.extend(claims.claims.clone());

        let result = invoke_with_limit(
            self.invoker.as_ref(),
            &invocation,
            self.invocation_timeout,
        )
        .await;
        debug!(state = ?RequestState::Invoked, "compute invoked");

        match result {
            Ok(InvocationOutcome::Success { response }) => {
                info!(state = ?RequestState::Responded, "request served");
                self.respond(200, json!({ "response": response }).to_string())
            }
            // Non-2xx compute results become a client-visible envelope.
            Ok(InvocationOutcome::Failure { error_message }) => {
                self.reject(502, error_message)
            }
            Err(InvocationError::Timeout { timeout_secs }) => self.reject(
                504,
                format!("invocation exceeded the configured timeout of {timeout_secs}s"),
            ),
            Err(InvocationError::Failed(reason)) => self.reject(502, reason),
        }
    }

    fn respond(&self, status: u16, body: String) -> ApiResponse {
        ApiResponse {
            status,
            headers: self.cors.headers(),
            body,
        }
    }

    fn reject(&self, status: u16, message: String) -> ApiResponse {
        self.respond(status, json!({ "errorMessage": message }).to_string())
    }
}
