//! Benchmarks for the verification pipeline.
//!
//! Measures each stage on its own and the whole pipeline, plus the cost of
//! the audit event under different log formats.
//!
//! Run with: `cargo bench --bench verify_pipeline`

#![allow(clippy::let_underscore_must_use, reason = "Criterion benchmarks ignore results")]
#![allow(missing_docs, reason = "Benchmark functions are self-documenting")]

use std::{hint::black_box, sync::Arc};

use agent_attestation::{
    AttestationConfig, AttestationVerifier, VerifyRequest,
    clock::SystemClock,
    replay::InMemoryNonceStore,
    rfc9421::{AttestationSigner, SignatureBaseBuilder, SignatureInputParser, SignedHeaders},
    security::audit::{AuditEvent, AuditEventType, audit_log},
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use ed25519_dalek::SigningKey;
use uuid::Uuid;

const AUTHORITY: &str = "merchant.example.com";
const PATH: &str = "/v1/checkout";

fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[
        0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c,
        0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae,
        0x7f, 0x60,
    ])
}

/// Verifier with replay disabled, so the same headers verify repeatedly.
fn setup_verifier() -> AttestationVerifier {
    let mut config = AttestationConfig::from_toml(
        r#"
        [[keys]]
        tenant_id = "tenant-bench"
        key_id = "bench-key"
        public_key = "11qYAYKxCrfVS/7TyWQHOg7hcvPapiMlrwIaaPcHURo="
        "#,
    )
    .expect("valid config");
    config.replay.enabled = false;

    AttestationVerifier::from_config_with(
        &config,
        Arc::new(InMemoryNonceStore::new(1)),
        Arc::new(SystemClock),
    )
    .expect("verifier")
}

fn setup_headers() -> SignedHeaders {
    AttestationSigner::new(signing_key(), "bench-key").sign_request(AUTHORITY, PATH).expect("signing")
}

fn request(headers: &SignedHeaders) -> VerifyRequest<'_> {
    VerifyRequest {
        method: "POST",
        authority: AUTHORITY,
        path: PATH,
        tenant_id: "tenant-bench",
        signature_input: &headers.signature_input,
        signature: &headers.signature,
    }
}

fn bench_stages(c: &mut Criterion) {
    let _ = tracing_subscriber::fmt().with_max_level(tracing::Level::ERROR).try_init();

    let headers = setup_headers();
    let input = SignatureInputParser::parse_single(&headers.signature_input).expect("parse");
    let builder = SignatureBaseBuilder::default();

    let mut group = c.benchmark_group("stages");
    group.bench_function("parse_signature_input", |b| {
        b.iter(|| black_box(SignatureInputParser::parse_single(black_box(&headers.signature_input))));
    });
    group.bench_function("build_signature_base", |b| {
        b.iter(|| {
            black_box(builder.build(
                black_box(AUTHORITY),
                black_box(PATH),
                input.covered_components(),
                input.params(),
            ))
        });
    });
    group.bench_function("sign_request", |b| {
        let signer = AttestationSigner::new(signing_key(), "bench-key");
        b.iter(|| black_box(signer.sign_request(black_box(AUTHORITY), black_box(PATH))));
    });
    group.finish();
}

fn bench_full_verify(c: &mut Criterion) {
    let verifier = setup_verifier();
    let headers = setup_headers();

    let mut tampered = setup_headers();
    tampered.signature_input = tampered.signature_input.replace("bench-key", "other-key");

    let mut group = c.benchmark_group("verify");
    for (name, headers) in [("accepted", &headers), ("rejected", &tampered)] {
        group.bench_with_input(BenchmarkId::new("outcome", name), headers, |b, headers| {
            b.iter(|| black_box(verifier.verify(black_box(&request(headers)))));
        });
    }
    group.finish();
}

fn bench_audit_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("audit_formatting");
    let event = AuditEvent::new(AuditEventType::AttestationVerified, "tenant-bench", Uuid::new_v4())
        .with_key_id("bench-key")
        .with_nonce("550e8400-e29b-41d4-a716-446655440000");

    group.bench_function("json_format", |b| {
        let subscriber =
            tracing_subscriber::fmt().json().with_max_level(tracing::Level::INFO).finish();
        tracing::subscriber::with_default(subscriber, || b.iter(|| audit_log(black_box(&event))));
    });

    group.bench_function("compact_format", |b| {
        let subscriber =
            tracing_subscriber::fmt().compact().with_max_level(tracing::Level::INFO).finish();
        tracing::subscriber::with_default(subscriber, || b.iter(|| audit_log(black_box(&event))));
    });

    group.finish();
}

criterion_group!(benches, bench_stages, bench_full_verify, bench_audit_formatting);
criterion_main!(benches);
