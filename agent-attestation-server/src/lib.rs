//! HTTP service for agent attestation verification.
//!
//! Wraps an [`agent_attestation::AttestationVerifier`] in an axum router so
//! that a gateway can ask, per agent request, whether its RFC 9421 signature
//! is valid for the tenant it resolved.
//!
//! - [`api`]: router, handlers, and problem-details responses
//! - [`observability`]: tracing setup and the readiness report

pub mod api;
pub mod observability;
