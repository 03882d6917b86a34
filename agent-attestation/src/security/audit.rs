//! Audit logging for attestation decisions.
//!
//! Every call to [`AttestationVerifier::verify`](crate::verify::AttestationVerifier::verify)
//! produces exactly one audit event on the `audit` tracing target, so
//! accept/reject decisions can be routed to a separate sink.

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// A signature passed every gate.
    AttestationVerified,
    /// A signature was rejected.
    AttestationRejected,
}

/// Contextual information about an audited decision.
///
/// Never holds signature bytes or key material.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditDetails {
    /// Key id from `Signature-Input`, once parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Replay nonce, once parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Stable failure code for rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_code: Option<String>,
    /// Failure message for rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Time spent verifying, in microseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_us: Option<u64>,
}

/// A single audit log entry.
///
/// # Examples
///
/// ```
/// use agent_attestation::security::audit::{AuditEvent, AuditEventType, audit_log};
/// use uuid::Uuid;
///
/// let event = AuditEvent::new(AuditEventType::AttestationRejected, "tenant-a", Uuid::new_v4())
///     .with_failure("ATTESTATION_INVALID_SIGNATURE", "signature verification failed");
///
/// audit_log(&event);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the decision was made.
    pub timestamp: SystemTime,
    /// What was decided.
    pub event_type: AuditEventType,
    /// Tenant the request was made for. May be blank for malformed requests.
    pub tenant_id: String,
    /// Per-verification correlation id.
    pub request_id: Uuid,
    /// Decision details.
    pub details: AuditDetails,
}

impl AuditEvent {
    /// Creates an event with empty details.
    #[must_use]
    pub fn new(event_type: AuditEventType, tenant_id: &str, request_id: Uuid) -> Self {
        Self {
            timestamp: SystemTime::now(),
            event_type,
            tenant_id: tenant_id.to_owned(),
            request_id,
            details: AuditDetails::default(),
        }
    }

    /// Adds the key id.
    #[must_use]
    pub fn with_key_id(mut self, key_id: &str) -> Self {
        self.details.key_id = Some(key_id.to_owned());
        self
    }

    /// Adds the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: &str) -> Self {
        self.details.nonce = Some(nonce.to_owned());
        self
    }

    /// Adds the failure code and message of a rejection.
    #[must_use]
    pub fn with_failure(mut self, code: &str, message: &str) -> Self {
        self.details.failure_code = Some(code.to_owned());
        self.details.message = Some(message.to_owned());
        self
    }

    /// Adds the verification duration.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "verification durations in microseconds fit u64"
    )]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.details.duration_us = Some(duration.as_micros() as u64);
        self
    }
}

/// Logs `event` at INFO on the `audit` target.
pub fn audit_log(event: &AuditEvent) {
    tracing::info!(
        target: "audit",
        timestamp = ?event.timestamp,
        event_type = ?event.event_type,
        tenant_id = %event.tenant_id,
        request_id = %event.request_id,
        details = ?event.details,
        "AUDIT"
    );
}
