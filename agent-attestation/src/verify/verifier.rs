//! The verification gate pipeline.

use std::{
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use super::{Failure, FailureCode, VerifiedAttestation, VerifyOutcome, VerifyRequest};
use crate::{
    clock::{Clock, SystemClock},
    config::{AttestationConfig, ProfileConfig},
    crypto::verify_ed25519,
    error::{AttestationError, Result},
    keys::{PublicKeyResolver, ResolveFailure, ResolveFailureCode, StaticKeyRegistry},
    replay::{InMemoryNonceStore, NonceStore, NonceStoreError, ReplayProtection, ReplayResult},
    rfc9421::{
        ParsedSignature, SignatureBaseBuilder, SignatureHeaderParser, SignatureInput,
        SignatureInputParser, SignatureParams, ensure_same_label,
    },
    security::audit::{AuditEvent, AuditEventType, audit_log},
};

const INTERNAL_ERROR_MESSAGE: &str = "internal attestation error";

/// Verifies agent attestation signatures.
///
/// Gates run in a fixed order and the first failing gate decides the
/// [`FailureCode`]:
///
/// 1. header parsing and label cross-check
/// 2. profile: required covered components, then the algorithm allow-list
/// 3. `created`/`expires` window
/// 4. tenant-scoped key resolution
/// 5. signature base and Ed25519 check
/// 6. nonce admission, when replay protection is enabled
///
/// The verifier is immutable and `Send + Sync`; share one instance behind an
/// [`Arc`] across request handlers.
///
/// # Examples
///
/// ```
/// use agent_attestation::{
///     config::AttestationConfig,
///     verify::{AttestationVerifier, FailureCode, VerifyRequest},
/// };
///
/// let verifier = AttestationVerifier::from_config(&AttestationConfig::default())?;
/// let outcome = verifier.verify(&VerifyRequest {
///     method: "POST",
///     authority: "shop.example",
///     path: "/v1/cart",
///     tenant_id: "tenant-a",
///     signature_input: "",
///     signature: "",
/// });
/// assert_eq!(outcome.failure_code(), Some(FailureCode::MissingOrInvalid));
/// # Ok::<(), agent_attestation::AttestationError>(())
/// ```
#[derive(Debug, Clone)]
pub struct AttestationVerifier {
    required_components: Vec<String>,
    allowed_algorithms: HashSet<String>,
    max_window_secs: i64,
    resolver: Arc<dyn PublicKeyResolver>,
    replay: Option<ReplayProtection>,
    clock: Arc<dyn Clock>,
    base_builder: SignatureBaseBuilder,
}

impl AttestationVerifier {
    /// Builds a verifier from configuration with the static key registry, an
    /// in-memory nonce store, and the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Config`] when the configuration does not
    /// validate.
    pub fn from_config(config: &AttestationConfig) -> Result<Self> {
        let store = Arc::new(InMemoryNonceStore::new(config.replay.capacity));
        Self::from_config_with(config, store, Arc::new(SystemClock))
    }

    /// Builds a verifier from configuration with the given nonce store and
    /// clock. The clock drives both the timestamp window and key expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AttestationError::Config`] when the configuration does not
    /// validate.
    pub fn from_config_with(
        config: &AttestationConfig,
        store: Arc<dyn NonceStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = StaticKeyRegistry::with_clock(&config.keys, Arc::clone(&clock))?;
        let replay = config.replay.enabled.then(|| {
            ReplayProtection::new(store, &config.replay.key_prefix, config.replay.default_ttl_seconds)
        });

        Ok(Self::new(&config.profile, Arc::new(registry), replay, clock))
    }

    /// Assembles a verifier from its parts. `replay: None` disables nonce
    /// admission.
    #[must_use]
    pub fn new(
        profile: &ProfileConfig,
        resolver: Arc<dyn PublicKeyResolver>,
        replay: Option<ReplayProtection>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let required_components = profile
            .required_covered_components
            .iter()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();
        let allowed_algorithms = profile
            .allowed_algorithms
            .iter()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        let max_window_secs = i64::try_from(profile.max_window_seconds).unwrap_or(i64::MAX);

        Self {
            required_components,
            allowed_algorithms,
            max_window_secs,
            resolver,
            replay,
            clock,
            base_builder: SignatureBaseBuilder::default(),
        }
    }

    /// Replaces the signature-base builder, for profiles with extra
    /// components.
    #[must_use]
    pub fn with_base_builder(mut self, base_builder: SignatureBaseBuilder) -> Self {
        self.base_builder = base_builder;
        self
    }

    /// Returns `true` when nonce admission is enabled.
    #[must_use]
    pub const fn replay_enabled(&self) -> bool {
        self.replay.is_some()
    }

    /// Checks that the nonce store is reachable. Always ready when replay
    /// protection is disabled.
    ///
    /// # Errors
    ///
    /// Returns the store's [`NonceStoreError`] when it is not reachable.
    pub fn check_ready(&self) -> std::result::Result<(), NonceStoreError> {
        self.replay.as_ref().map_or(Ok(()), |replay| replay.store().ping())
    }

    /// Runs every gate against `request`.
    ///
    /// Never panics. A panic inside a gate is caught and reported as
    /// [`FailureCode::InternalError`]. Each call emits one audit event.
    #[instrument(
        skip_all,
        fields(
            method = %request.method,
            authority = %request.authority,
            path = %request.path,
            tenant_id = %request.tenant_id,
        )
    )]
    pub fn verify(&self, request: &VerifyRequest<'_>) -> VerifyOutcome {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.run_gates(request))) {
            Ok(result) => result,
            Err(_) => {
                error!("Attestation verification panicked");
                Err(Failure::new(FailureCode::InternalError, INTERNAL_ERROR_MESSAGE).into())
            }
        };

        let event = audit_event(request.tenant_id, request_id, &result);
        audit_log(&event.with_duration(started.elapsed()));

        match result {
            Ok(verified) => VerifyOutcome::Verified(verified),
            Err(rejection) => VerifyOutcome::Failed(rejection.failure),
        }
    }

    fn run_gates(&self, request: &VerifyRequest<'_>) -> std::result::Result<VerifiedAttestation, Rejection> {
        let (input, signature) = parse_headers(request).map_err(classify_error)?;

        self.run_parsed_gates(request, &input, &signature).map_err(|failure| Rejection {
            failure,
            key_id: Some(input.params().key_id().to_owned()),
            nonce: Some(input.params().nonce().to_owned()),
        })
    }

    fn run_parsed_gates(
        &self,
        request: &VerifyRequest<'_>,
        input: &SignatureInput,
        signature: &ParsedSignature,
    ) -> std::result::Result<VerifiedAttestation, Failure> {
        let params = input.params();

        self.enforce_profile(input)?;
        self.enforce_timestamps(params.created(), params.expires())?;

        let key = self.resolver.resolve(request.tenant_id, params.key_id()).map_err(map_key_failure)?;

        let base = self
            .base_builder
            .build(request.authority, request.path, input.covered_components(), params)
            .map_err(classify_error)?;

        if !verify_ed25519(&key.public_key, &base, signature.signature_bytes()) {
            return Err(Failure::new(FailureCode::InvalidSignature, "signature verification failed"));
        }

        if let Some(replay) = &self.replay {
            self.admit_nonce(replay, request.tenant_id, params)?;
        }

        Ok(VerifiedAttestation {
            tenant_id: request.tenant_id.to_owned(),
            key_id: params.key_id().to_owned(),
            nonce: params.nonce().to_owned(),
            alg: normalize_alg(params.alg()),
            created: params.created(),
            expires: params.expires(),
        })
    }

    fn enforce_profile(&self, input: &SignatureInput) -> std::result::Result<(), Failure> {
        let covered: HashSet<String> =
            input.covered_components().iter().map(|c| c.trim().to_lowercase()).collect();

        if let Some(missing) = self.required_components.iter().find(|r| !covered.contains(*r)) {
            return Err(Failure::new(
                FailureCode::MissingComponent,
                &format!("missing required covered component: {missing}"),
            ));
        }

        let alg = normalize_alg(input.params().alg());
        if !self.allowed_algorithms.is_empty() && !self.allowed_algorithms.contains(&alg) {
            return Err(Failure::new(
                FailureCode::MissingOrInvalid,
                &format!("unsupported algorithm: {}", input.params().alg()),
            ));
        }
        Ok(())
    }

    fn enforce_timestamps(&self, created: i64, expires: i64) -> std::result::Result<(), Failure> {
        let invalid = |message: &str| Err(Failure::new(FailureCode::TimestampInvalid, message));

        if expires <= created {
            return invalid("expires must be greater than created");
        }
        if expires.checked_sub(created).is_none_or(|window| window > self.max_window_secs) {
            return invalid("created/expires window exceeds maximum");
        }

        let now = self.clock.epoch_seconds();
        if created > now {
            return invalid("created is in the future");
        }
        if expires < now {
            return invalid("signature is expired");
        }
        Ok(())
    }

    fn admit_nonce(
        &self,
        replay: &ReplayProtection,
        tenant_id: &str,
        params: &SignatureParams,
    ) -> std::result::Result<(), Failure> {
        let default_ttl = i64::try_from(replay.default_ttl().as_secs()).unwrap_or(i64::MAX);
        let ttl = replay_ttl_secs(default_ttl, params.expires(), self.clock.epoch_seconds());

        match replay.record_nonce(tenant_id, params.key_id(), params.nonce(), Some(ttl)) {
            ReplayResult::FirstSeen => Ok(()),
            ReplayResult::ReplayDetected => {
                Err(Failure::new(FailureCode::ReplayDetected, "nonce replay detected"))
            }
            ReplayResult::Unavailable => {
                Err(Failure::new(FailureCode::ReplayUnavailable, "replay protection unavailable"))
            }
            ReplayResult::InvalidInput => {
                Err(Failure::new(FailureCode::MissingOrInvalid, "invalid replay inputs"))
            }
        }
    }
}

/// A failed verification plus whatever the headers revealed about the signer.
#[derive(Debug)]
struct Rejection {
    failure: Failure,
    key_id: Option<String>,
    nonce: Option<String>,
}

impl From<Failure> for Rejection {
    fn from(failure: Failure) -> Self {
        Self { failure, key_id: None, nonce: None }
    }
}

fn audit_event(
    tenant_id: &str,
    request_id: Uuid,
    result: &std::result::Result<VerifiedAttestation, Rejection>,
) -> AuditEvent {
    match result {
        Ok(verified) => {
            debug!(key_id = %verified.key_id, "Attestation verified");
            AuditEvent::new(AuditEventType::AttestationVerified, tenant_id, request_id)
                .with_key_id(&verified.key_id)
                .with_nonce(&verified.nonce)
        }
        Err(Rejection { failure, key_id, nonce }) => {
            if matches!(failure.code, FailureCode::ReplayUnavailable | FailureCode::InternalError) {
                warn!(code = %failure.code, message = %failure.message, "Attestation rejected");
            } else {
                debug!(code = %failure.code, message = %failure.message, "Attestation rejected");
            }
            let mut event = AuditEvent::new(AuditEventType::AttestationRejected, tenant_id, request_id)
                .with_failure(failure.code.as_str(), &failure.message);
            if let Some(key_id) = key_id {
                event = event.with_key_id(key_id);
            }
            if let Some(nonce) = nonce {
                event = event.with_nonce(nonce);
            }
            event
        }
    }
}

fn parse_headers(request: &VerifyRequest<'_>) -> Result<(SignatureInput, ParsedSignature)> {
    let input = SignatureInputParser::parse_single(request.signature_input)?;
    let signature = SignatureHeaderParser::parse_single(request.signature)?;
    ensure_same_label(input.label(), signature.label())?;
    Ok((input, signature))
}

/// Request-shaped errors are the agent's fault; anything else is ours.
fn classify_error(err: AttestationError) -> Failure {
    if err.is_request_error() {
        Failure::new(FailureCode::MissingOrInvalid, &err.to_string())
    } else {
        error!(error = %err, "Unexpected error during verification");
        Failure::new(FailureCode::InternalError, INTERNAL_ERROR_MESSAGE)
    }
}

fn map_key_failure(failure: ResolveFailure) -> Failure {
    debug!(code = %failure.code, message = %failure.message, "Key resolution failed");
    let (code, message) = match failure.code {
        ResolveFailureCode::KeyNotFound => (FailureCode::KeyUnavailable, "key not found"),
        ResolveFailureCode::KeyRevoked => (FailureCode::KeyUnavailable, "key revoked"),
        ResolveFailureCode::KeyExpired => (FailureCode::KeyUnavailable, "key expired"),
        ResolveFailureCode::InvalidKeyMaterial => (FailureCode::KeyUnavailable, "invalid key material"),
        ResolveFailureCode::TenantKeyMismatch => (FailureCode::TenantKeyMismatch, "tenant/key mismatch"),
        ResolveFailureCode::InvalidInput => (FailureCode::MissingOrInvalid, "invalid key lookup input"),
    };
    Failure::new(code, message)
}

fn normalize_alg(alg: &str) -> String {
    alg.trim().to_lowercase()
}

/// Nonce TTL: the default, capped at the time left before `expires`, and at
/// least one second.
fn replay_ttl_secs(default_ttl: i64, expires: i64, now: i64) -> i64 {
    let remaining = expires.saturating_sub(now);
    if remaining <= 0 { 1 } else { default_ttl.min(remaining) }
}
