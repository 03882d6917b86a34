//! Security controls around verification.
//!
//! The audit module records one structured event per verification decision
//! on a dedicated tracing target:
//!
//! ```rust
//! use agent_attestation::security::audit::{AuditEvent, AuditEventType};
//! use uuid::Uuid;
//!
//! let event = AuditEvent::new(AuditEventType::AttestationVerified, "tenant-a", Uuid::new_v4())
//!     .with_key_id("agent-key-1")
//!     .with_nonce("550e8400-e29b-41d4-a716-446655440000");
//!
//! agent_attestation::security::audit::audit_log(&event);
//! ```

pub mod audit;

pub use audit::{AuditDetails, AuditEvent, AuditEventType, audit_log};
