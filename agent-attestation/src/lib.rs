//! Agent Attestation: RFC 9421 Signature Verification for Agent Traffic
//!
//! A Rust library that verifies Ed25519 HTTP Message Signatures (RFC 9421)
//! on agent-to-merchant requests, enforcing a tenant-scoped key registry,
//! a bounded timestamp window, and at-most-once nonce admission.
//!
//! # What does it check?
//!
//! A merchant-facing gateway receives an agent request carrying
//! `Signature-Input` and `Signature` headers and asks this crate whether the
//! request is attested. Verification is a fixed gate pipeline:
//!
//! - **Headers**: exactly one signature label, same label in both headers
//! - **Profile**: required covered components and an algorithm allow-list
//! - **Timestamps**: `created <= now <= expires` within a maximum window
//! - **Key**: the `keyid` must be active, unexpired, and registered to the
//!   requesting tenant
//! - **Signature**: Ed25519 over the canonical signature base
//! - **Replay**: the nonce must not have been admitted before
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   AI Agent      │  signs @authority, @path, @signature-params
//! └────────┬────────┘
//!          │ Signature-Input + Signature
//! ┌────────▼────────┐
//! │    Gateway      │  derives tenantId
//! └────────┬────────┘
//!          │ POST /v1/attestations/verify
//! ┌────────▼────────────────────────────────────────┐
//! │          AttestationVerifier (this crate)       │
//! │  ┌──────────┐  ┌──────────────┐  ┌──────────┐   │
//! │  │ rfc9421  │  │ keys         │  │ replay   │   │
//! │  │ parsers, │  │ (tenant,     │  │ nonce    │   │
//! │  │ base     │  │  keyid) → pk │  │ store    │   │
//! │  └──────────┘  └──────────────┘  └──────────┘   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust
//! use agent_attestation::{
//!     config::AttestationConfig,
//!     rfc9421::AttestationSigner,
//!     verify::{AttestationVerifier, VerifyRequest},
//! };
//! use ed25519_dalek::SigningKey;
//!
//! # fn example() -> agent_attestation::Result<()> {
//! // RFC 8032 test vector 1; in production, agents hold their own keys.
//! let signing_key = SigningKey::from_bytes(&[
//!     0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c,
//!     0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae,
//!     0x7f, 0x60,
//! ]);
//!
//! let config = AttestationConfig::from_toml(
//!     r#"
//!     [[keys]]
//!     tenant_id = "tenant-a"
//!     key_id = "agent-key-1"
//!     public_key = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo="
//!     "#,
//! )?;
//! let verifier = AttestationVerifier::from_config(&config)?;
//!
//! let headers = AttestationSigner::new(signing_key, "agent-key-1")
//!     .sign_request("shop.example", "/v1/cart")?;
//!
//! let outcome = verifier.verify(&VerifyRequest {
//!     method: "POST",
//!     authority: "shop.example",
//!     path: "/v1/cart",
//!     tenant_id: "tenant-a",
//!     signature_input: &headers.signature_input,
//!     signature: &headers.signature,
//! });
//! assert!(outcome.is_verified());
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! # Failure Codes
//!
//! Every rejection carries exactly one [`verify::FailureCode`], chosen by the
//! first gate that fails. Codes are stable identifiers intended for clients;
//! messages are for operators.
//!
//! # Security
//!
//! - Fail-closed: parse errors, unknown keys, store outages, and internal
//!   panics all end in a rejection
//! - Failure messages never contain signature bytes, key material, or whole
//!   header values
//! - The key registry is immutable after startup and shared without locks
//! - Every decision is written to the `audit` tracing target
//!
//! # Modules
//!
//! - [`rfc9421`]: header parsers, label check, signature base, agent signer
//! - [`crypto`]: Ed25519 verification
//! - [`keys`]: tenant-scoped public key resolution
//! - [`replay`]: nonce admission
//! - [`verify`]: the orchestrating verifier and its outcome types
//! - [`config`]: TOML configuration
//! - [`security`]: audit logging

pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod replay;
pub mod rfc9421;
pub mod security;
pub mod verify;

pub use config::AttestationConfig;
pub use error::{AttestationError, Result};
pub use verify::{AttestationVerifier, FailureCode, VerifyOutcome, VerifyRequest};
