//! Agent-side signing of attested requests.

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use ed25519_dalek::SigningKey;
use signature::Signer;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    error::{AttestationError, Result},
    rfc9421::{
        SignatureBaseBuilder, SignatureInputParser,
        base::{COMPONENT_AUTHORITY, COMPONENT_PATH, COMPONENT_SIGNATURE_PARAMS, quote},
    },
};

/// Algorithm label written into `alg`.
pub const ALG_ED25519: &str = "ed25519";

/// Label used when none is configured.
pub const DEFAULT_LABEL: &str = "sig1";

/// Tag used when none is configured.
pub const DEFAULT_TAG: &str = "agent-request";

/// `expires - created` used when none is configured.
pub const DEFAULT_VALIDITY_SECS: i64 = 480;

/// Header values for one signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    /// `Signature-Input` header value.
    pub signature_input: String,
    /// `Signature` header value.
    pub signature: String,
    /// Nonce embedded in the signature.
    pub nonce: String,
    /// `created`, epoch seconds.
    pub created: i64,
    /// `expires`, epoch seconds.
    pub expires: i64,
}

/// Produces `Signature-Input`/`Signature` header pairs an
/// [`AttestationVerifier`](crate::verify::AttestationVerifier) accepts.
///
/// The signer renders its own `Signature-Input`, parses it back, and signs
/// the base built from the parsed value, so whatever it emits goes through
/// the same parser and base builder as the verifier.
///
/// # Examples
///
/// ```
/// use agent_attestation::rfc9421::AttestationSigner;
/// use ed25519_dalek::SigningKey;
///
/// let signer = AttestationSigner::new(SigningKey::from_bytes(&[1u8; 32]), "agent-key-1");
/// let headers = signer.sign_request("shop.example", "/v1/cart")?;
///
/// assert!(headers.signature_input.starts_with("sig1=(\"@authority\" \"@path\" \"@signature-params\")"));
/// assert!(headers.signature.starts_with("sig1=:"));
/// # Ok::<(), agent_attestation::AttestationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct AttestationSigner {
    signing_key: SigningKey,
    key_id: String,
    label: String,
    tag: String,
    validity_secs: i64,
    covered_components: Vec<String>,
    clock: Arc<dyn Clock>,
    builder: SignatureBaseBuilder,
}

impl AttestationSigner {
    /// Creates a signer for `key_id` covering `@authority`, `@path` and
    /// `@signature-params`.
    #[must_use]
    pub fn new(signing_key: SigningKey, key_id: &str) -> Self {
        Self {
            signing_key,
            key_id: key_id.to_owned(),
            label: DEFAULT_LABEL.to_owned(),
            tag: DEFAULT_TAG.to_owned(),
            validity_secs: DEFAULT_VALIDITY_SECS,
            covered_components: [COMPONENT_AUTHORITY, COMPONENT_PATH, COMPONENT_SIGNATURE_PARAMS]
                .map(str::to_owned)
                .to_vec(),
            clock: Arc::new(SystemClock),
            builder: SignatureBaseBuilder::default(),
        }
    }

    /// Sets the signature label.
    #[must_use]
    pub fn with_label(mut self, label: &str) -> Self {
        label.clone_into(&mut self.label);
        self
    }

    /// Sets the `tag` parameter.
    #[must_use]
    pub fn with_tag(mut self, tag: &str) -> Self {
        tag.clone_into(&mut self.tag);
        self
    }

    /// Sets `expires - created`, in seconds.
    #[must_use]
    pub const fn with_validity_secs(mut self, validity_secs: i64) -> Self {
        self.validity_secs = validity_secs;
        self
    }

    /// Sets the covered components, in signing order.
    #[must_use]
    pub fn with_covered_components(mut self, components: &[&str]) -> Self {
        self.covered_components = components.iter().map(|c| (*c).to_owned()).collect();
        self
    }

    /// Sets the clock `created` is read from.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Signs a request with a fresh UUID v4 nonce, created now.
    ///
    /// # Errors
    ///
    /// See [`sign_request_with`](Self::sign_request_with).
    #[instrument(skip(self), fields(key_id = %self.key_id))]
    pub fn sign_request(&self, authority: &str, path: &str) -> Result<SignedHeaders> {
        let nonce = Uuid::new_v4().to_string();
        self.sign_request_with(authority, path, &nonce, self.clock.epoch_seconds())
    }

    /// Signs a request with an explicit nonce and creation time.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::InvalidSignatureInput`] when the configured
    /// label, key id, tag, or `nonce` cannot form a valid header, and
    /// [`AttestationError::SignatureBase`] when `authority` or `path` is blank
    /// or a covered component is unsupported.
    pub fn sign_request_with(
        &self,
        authority: &str,
        path: &str,
        nonce: &str,
        created: i64,
    ) -> Result<SignedHeaders> {
        let expires = created.checked_add(self.validity_secs).ok_or_else(|| {
            AttestationError::InvalidSignatureInput("expires overflows epoch seconds".to_owned())
        })?;

        let components = self.covered_components.iter().map(|c| quote(c)).collect::<Vec<_>>();
        let signature_input = format!(
            "{}=({});created={created};expires={expires};keyid={};alg={};nonce={};tag={}",
            self.label,
            components.join(" "),
            quote(&self.key_id),
            quote(ALG_ED25519),
            quote(nonce),
            quote(&self.tag),
        );

        let parsed = SignatureInputParser::parse_single(&signature_input)?;
        let base =
            self.builder.build(authority, path, parsed.covered_components(), parsed.params())?;

        let signature = self.signing_key.sign(base.as_bytes());
        let signature = format!("{}=:{}:", parsed.label(), STANDARD.encode(signature.to_bytes()));

        Ok(SignedHeaders { signature_input, signature, nonce: nonce.to_owned(), created, expires })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        crypto::verify_ed25519,
        rfc9421::{SignatureHeaderParser, ensure_same_label},
    };

    fn signer() -> AttestationSigner {
        AttestationSigner::new(SigningKey::from_bytes(&[5u8; 32]), "k1")
    }

    #[test]
    fn test_signed_headers_verify() {
        let signer = signer();
        let headers = signer.sign_request_with("Example.COM", "/a", "n-1", 1_700_000_000).unwrap();

        let input = SignatureInputParser::parse_single(&headers.signature_input).unwrap();
        let sig = SignatureHeaderParser::parse_single(&headers.signature).unwrap();
        ensure_same_label(input.label(), sig.label()).unwrap();

        assert_eq!(input.params().created(), 1_700_000_000);
        assert_eq!(input.params().expires(), 1_700_000_480);
        assert_eq!(input.params().nonce(), "n-1");
        assert_eq!(input.params().alg(), ALG_ED25519);
        assert_eq!(input.params().tag(), DEFAULT_TAG);

        let base = SignatureBaseBuilder::default()
            .build("example.com", "/a", input.covered_components(), input.params())
            .unwrap();
        assert!(verify_ed25519(
            &SigningKey::from_bytes(&[5u8; 32]).verifying_key(),
            &base,
            sig.signature_bytes()
        ));
    }

    #[test]
    fn test_fresh_nonce_per_request() {
        let signer = signer().with_clock(Arc::new(FixedClock::from_epoch_seconds(10)));
        let first = signer.sign_request("a", "/").unwrap();
        let second = signer.sign_request("a", "/").unwrap();
        assert_ne!(first.nonce, second.nonce);
        assert_eq!(first.created, 10);
        assert_eq!(first.expires, 10 + DEFAULT_VALIDITY_SECS);
    }

    #[test]
    fn test_custom_label_tag_and_components() {
        let headers = signer()
            .with_label("agent")
            .with_tag("checkout")
            .with_validity_secs(60)
            .with_covered_components(&["@path", "@authority"])
            .sign_request_with("a", "/", "n", 100)
            .unwrap();

        assert!(headers.signature_input.starts_with("agent=(\"@path\" \"@authority\");created=100;expires=160;"));
        assert!(headers.signature_input.ends_with(";tag=\"checkout\""));
        assert!(headers.signature.starts_with("agent=:"));
    }

    #[test]
    fn test_blank_nonce_rejected() {
        assert!(matches!(
            signer().sign_request_with("a", "/", "", 1),
            Err(AttestationError::InvalidSignatureInput(_))
        ));
    }

    #[test]
    fn test_unsupported_component_rejected() {
        let err = signer()
            .with_covered_components(&["content-digest"])
            .sign_request_with("a", "/", "n", 1)
            .unwrap_err();
        assert!(matches!(err, AttestationError::SignatureBase(_)));
    }
}
