use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD};
use ed25519_dalek::SigningKey;
use proptest::prelude::*;

use crate::{
    clock::FixedClock,
    config::{AttestationConfig, KeyEntry, STATUS_ACTIVE},
    replay::InMemoryNonceStore,
    rfc9421::{AttestationSigner, SignatureBaseBuilder, SignatureInputParser},
    verify::{AttestationVerifier, FailureCode, VerifyRequest},
};

const NOW: i64 = 1_700_000_000;

fn verifier_for(signing_key: &SigningKey, tenant_id: &str, key_id: &str) -> AttestationVerifier {
    let config = AttestationConfig {
        keys: vec![KeyEntry {
            tenant_id: tenant_id.to_owned(),
            key_id: key_id.to_owned(),
            status: STATUS_ACTIVE.to_owned(),
            public_key: STANDARD.encode(signing_key.verifying_key().as_bytes()),
            not_after: None,
        }],
        ..AttestationConfig::default()
    };
    AttestationVerifier::from_config_with(
        &config,
        Arc::new(InMemoryNonceStore::new(1000)),
        Arc::new(FixedClock::from_epoch_seconds(NOW)),
    )
    .expect("valid config")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_sign_then_verify_roundtrip(
        seed in any::<[u8; 32]>(),
        tenant_id in "[a-z0-9-]{1,16}",
        key_id in "[a-zA-Z0-9_-]{1,32}",
        authority in "[a-zA-Z0-9]{1,20}\\.(com|example)",
        path in "/[a-z0-9/]{0,40}",
        nonce in "[a-f0-9-]{8,36}",
        age in 0i64..=480,
    ) {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifier = verifier_for(&signing_key, &tenant_id, &key_id);
        let headers = AttestationSigner::new(signing_key, &key_id)
            .sign_request_with(&authority, &path, &nonce, NOW - age)
            .expect("signing failed");

        let request = VerifyRequest {
            method: "GET",
            authority: &authority,
            path: &path,
            tenant_id: &tenant_id,
            signature_input: &headers.signature_input,
            signature: &headers.signature,
        };

        let outcome = verifier.verify(&request);
        prop_assert!(outcome.is_verified(), "verification failed: {:?}", outcome);

        // exactly once per nonce
        prop_assert_eq!(verifier.verify(&request).failure_code(), Some(FailureCode::ReplayDetected));
    }

    #[test]
    fn test_any_bit_flip_is_invalid_signature(
        seed in any::<[u8; 32]>(),
        bit in 0usize..512,
    ) {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifier = verifier_for(&signing_key, "t", "k");
        let headers = AttestationSigner::new(signing_key, "k")
            .sign_request_with("shop.example", "/cart", "n-1", NOW)
            .expect("signing failed");

        let encoded = headers.signature.trim_start_matches("sig1=:").trim_end_matches(':');
        let mut bytes = STANDARD.decode(encoded).expect("valid base64");
        bytes[bit / 8] ^= 1 << (bit % 8);
        let tampered = format!("sig1=:{}:", STANDARD.encode(&bytes));

        let outcome = verifier.verify(&VerifyRequest {
            method: "GET",
            authority: "shop.example",
            path: "/cart",
            tenant_id: "t",
            signature_input: &headers.signature_input,
            signature: &tampered,
        });
        prop_assert_eq!(outcome.failure_code(), Some(FailureCode::InvalidSignature));
    }

    #[test]
    fn test_changed_path_or_authority_is_invalid_signature(
        seed in any::<[u8; 32]>(),
        path in "/[a-z0-9]{1,20}",
        other_path in "/[a-z0-9]{1,20}",
        other_authority in "[a-z0-9]{1,20}\\.net",
    ) {
        prop_assume!(path != other_path);

        let signing_key = SigningKey::from_bytes(&seed);
        let verifier = verifier_for(&signing_key, "t", "k");
        let headers = AttestationSigner::new(signing_key, "k")
            .sign_request_with("shop.example", &path, "n-1", NOW)
            .expect("signing failed");

        for (authority, path) in [("shop.example", other_path.as_str()), (other_authority.as_str(), path.as_str())] {
            let outcome = verifier.verify(&VerifyRequest {
                method: "GET",
                authority,
                path,
                tenant_id: "t",
                signature_input: &headers.signature_input,
                signature: &headers.signature,
            });
            prop_assert_eq!(outcome.failure_code(), Some(FailureCode::InvalidSignature));
        }
    }

    #[test]
    fn test_signature_base_is_deterministic(
        authority in "[ a-zA-Z0-9.:]{1,30}",
        path in "[ -~]{1,60}",
        key_id in "[a-zA-Z0-9\"\\\\]{1,16}",
        created in 0i64..2_000_000_000,
    ) {
        prop_assume!(!authority.trim().is_empty() && !path.trim().is_empty());

        let header = format!(
            "sig1=(\"@authority\" \"@path\" \"@signature-params\");created={created};\
             expires={};keyid={};alg=\"ed25519\";nonce=\"n\";tag=\"t\"",
            created + 1,
            crate::rfc9421::quote(&key_id),
        );
        let input = SignatureInputParser::parse_single(&header).expect("valid header");
        prop_assert_eq!(input.params().key_id(), key_id.as_str());

        let builder = SignatureBaseBuilder::default();
        let first = builder.build(&authority, &path, input.covered_components(), input.params());
        let second = builder.build(&authority, &path, input.covered_components(), input.params());
        prop_assert_eq!(first.expect("first build"), second.expect("second build"));
    }

    #[test]
    fn test_multiple_labels_never_parse(
        first in "sig[0-9]{1,2}",
        second in "sig[0-9]{1,2}",
    ) {
        let header = format!(
            "{first}=(\"@authority\");created=1;expires=2;keyid=\"k\";alg=\"ed25519\";nonce=\"n\";tag=\"t\", \
             {second}=(\"@path\");created=1;expires=2;keyid=\"k\";alg=\"ed25519\";nonce=\"n\";tag=\"t\""
        );
        let err = SignatureInputParser::parse_single(&header).expect_err("must reject");
        prop_assert!(err.to_string().contains("multiple"));
    }
}
