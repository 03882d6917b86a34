//! RFC 9421 HTTP Message Signatures, restricted to a bodyless Ed25519 profile.
//!
//! - [`SignatureInputParser`] and [`SignatureHeaderParser`] accept exactly one
//!   signature label per header.
//! - [`ensure_same_label`] cross-checks the two labels.
//! - [`SignatureBaseBuilder`] reproduces the exact bytes the agent signed.
//! - [`AttestationSigner`] is the agent-side counterpart used by clients and
//!   tests.

pub mod base;
mod header;
mod input;
mod label;
mod signer;

#[cfg(test)]
mod tests;

pub use base::{BaseContext, ComponentRenderer, SignatureBaseBuilder, quote, signature_params_value};
pub use header::{ParsedSignature, SignatureHeaderParser};
pub use input::{SignatureInput, SignatureInputParser, SignatureParams};
pub use label::ensure_same_label;
pub use signer::{
    ALG_ED25519, AttestationSigner, DEFAULT_LABEL, DEFAULT_TAG, DEFAULT_VALIDITY_SECS, SignedHeaders,
};
