//! HTTP API for attestation verification.
//!
//! - `POST /v1/attestations/verify`: verify one agent request
//! - `GET /healthz`: liveness
//! - `GET /readyz`: readiness, including the nonce store
//!
//! Rejections are returned as `application/problem+json` bodies whose
//! `errorCode` is the verifier's failure code.

use std::{sync::Arc, time::Instant};

use agent_attestation::{AttestationVerifier, FailureCode, VerifyOutcome, VerifyRequest};
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::observability::{DependencyCheck, ReadinessReport, SERVICE_NAME};

/// Media type of error bodies.
pub const PROBLEM_JSON: &str = "application/problem+json";

/// Header carrying the distributed trace id.
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Header carrying the caller's correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const ATTESTATION_FAILED_TYPE: &str = "urn:problem-type:attestation-failed";
const VALIDATION_ERROR_TYPE: &str = "urn:problem-type:validation-error";
const VALIDATION_ERROR_CODE: &str = "VALIDATION_ERROR";

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct ApiState {
    verifier: Arc<AttestationVerifier>,
    start_time: Instant,
}

impl ApiState {
    /// Wraps a verifier for use by the handlers.
    #[must_use]
    pub fn new(verifier: Arc<AttestationVerifier>) -> Self {
        Self { verifier, start_time: Instant::now() }
    }
}

/// JSON body of `POST /v1/attestations/verify`.
///
/// Missing fields deserialize as empty strings so that they are reported by
/// [`validate`](Self::validate) rather than by the JSON extractor.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifyRequestBody {
    /// HTTP method of the agent request.
    pub method: String,
    /// `Host`/`:authority` of the agent request.
    pub authority: String,
    /// Request-target path of the agent request.
    pub path: String,
    /// Tenant resolved by the gateway.
    pub tenant_id: String,
    /// Literal `Signature-Input` header value.
    pub signature_input: String,
    /// Literal `Signature` header value.
    pub signature: String,
}

impl VerifyRequestBody {
    /// Checks that every field is present and within its size limit.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("method", &self.method, 32),
            ("authority", &self.authority, 255),
            ("path", &self.path, 2048),
            ("tenantId", &self.tenant_id, 128),
            ("signatureInput", &self.signature_input, 8192),
            ("signature", &self.signature, 8192),
        ];

        for (name, value, max_chars) in fields {
            if value.trim().is_empty() {
                return Err(format!("{name} must not be blank"));
            }
            if value.chars().count() > max_chars {
                return Err(format!("{name} must be at most {max_chars} characters"));
            }
        }
        Ok(())
    }

    fn as_verify_request(&self) -> VerifyRequest<'_> {
        VerifyRequest {
            method: &self.method,
            authority: &self.authority,
            path: &self.path,
            tenant_id: &self.tenant_id,
            signature_input: &self.signature_input,
            signature: &self.signature,
        }
    }
}

/// Success body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyResponse {
    /// Always `true`; failures use [`ProblemDetails`].
    pub verified: bool,
}

/// RFC 9457 problem details with attestation extensions.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub problem_type: &'static str,
    /// Short summary.
    pub title: &'static str,
    /// HTTP status code.
    pub status: u16,
    /// Failure detail.
    pub detail: String,
    /// Request path.
    pub instance: String,
    /// Stable machine-readable code.
    pub error_code: String,
    /// Trace id from [`TRACE_ID_HEADER`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Correlation id from [`REQUEST_ID_HEADER`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Tenant the request was made for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self)).into_response();
        response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response
    }
}

/// HTTP status for a verifier failure code.
#[must_use]
pub const fn status_for(code: FailureCode) -> StatusCode {
    match code {
        FailureCode::MissingOrInvalid | FailureCode::MissingComponent => StatusCode::BAD_REQUEST,
        FailureCode::ReplayDetected => StatusCode::CONFLICT,
        FailureCode::ReplayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        FailureCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        FailureCode::TimestampInvalid
        | FailureCode::KeyUnavailable
        | FailureCode::TenantKeyMismatch
        | FailureCode::InvalidSignature => StatusCode::UNAUTHORIZED,
    }
}

/// Builds the service router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/v1/attestations/verify", post(verify))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(state)
}

/// POST /v1/attestations/verify
async fn verify(State(state): State<ApiState>, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let trace_id = header_value(&headers, TRACE_ID_HEADER);
    let request_id = header_value(&headers, REQUEST_ID_HEADER);

    let validation_problem = |detail: String, tenant_id: Option<String>| ProblemDetails {
        problem_type: VALIDATION_ERROR_TYPE,
        title: "Request validation failed",
        status: StatusCode::BAD_REQUEST.as_u16(),
        detail,
        instance: uri.path().to_owned(),
        error_code: VALIDATION_ERROR_CODE.to_owned(),
        trace_id: trace_id.clone(),
        request_id: request_id.clone(),
        tenant_id,
    };

    let request: VerifyRequestBody = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Malformed verify request body");
            return validation_problem("request body must be a JSON object".to_owned(), None)
                .into_response();
        }
    };
    if let Err(detail) = request.validate() {
        debug!(%detail, "Verify request failed validation");
        let tenant_id = non_blank(&request.tenant_id);
        return validation_problem(detail, tenant_id).into_response();
    }

    match state.verifier.verify(&request.as_verify_request()) {
        VerifyOutcome::Verified(_) => Json(VerifyResponse { verified: true }).into_response(),
        VerifyOutcome::Failed(failure) => {
            let status = status_for(failure.code);
            ProblemDetails {
                problem_type: ATTESTATION_FAILED_TYPE,
                title: "Attestation verification failed",
                status: status.as_u16(),
                detail: failure.message,
                instance: uri.path().to_owned(),
                error_code: failure.code.as_str().to_owned(),
                trace_id,
                request_id,
                tenant_id: non_blank(&request.tenant_id),
            }
            .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct Liveness {
    status: &'static str,
    service: &'static str,
}

/// GET /healthz
async fn healthz() -> Json<Liveness> {
    Json(Liveness { status: "ok", service: SERVICE_NAME })
}

/// GET /readyz
async fn readyz(State(state): State<ApiState>) -> (StatusCode, Json<ReadinessReport>) {
    let mut checks = vec![DependencyCheck::pass("key_registry")];
    checks.push(match state.verifier.check_ready() {
        Ok(()) => DependencyCheck::pass("nonce_store"),
        Err(e) => {
            warn!(error = %e, "Readiness check failed: nonce store not reachable");
            DependencyCheck::fail("nonce_store", "nonce store not reachable")
        }
    });

    let report = ReadinessReport::from_checks(state.start_time.elapsed().as_secs(), checks);
    let status = if report.is_ready() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).and_then(non_blank)
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_owned())
}
