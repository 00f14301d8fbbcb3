//! Criterion benchmarks for the configuration envelope codec.
//!
//! Measures sealing and opening latency for a typical settings payload.  Key
//! derivation is excluded: the key is fixed so the numbers reflect only
//! serialization plus XChaCha20-Poly1305.
//!
//! Run with:
//! ```bash
//! cargo bench --package wahay-core --bench envelope_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wahay_core::{
    open, parse_header, seal, ApplicationSettings, EncryptionParameters, EncryptionResult,
    KdfParams, KEY_LEN, MAC_LEN,
};
use zeroize::Zeroizing;

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn make_settings() -> ApplicationSettings {
    let mut settings = ApplicationSettings::baseline();
    settings.unique_configuration_id = "c3".repeat(32);
    settings.path_tor = "/usr/sbin/tor".to_string();
    settings.path_torsocks = "/usr/bin/torsocks".to_string();
    settings.path_mumble = "/usr/bin/mumble".to_string();
    settings.port_mumble = "64738".to_string();
    settings
}

fn make_key() -> EncryptionResult {
    EncryptionResult {
        key: Zeroizing::new([0x42; KEY_LEN]),
        mac: [0x24; MAC_LEN],
        valid: true,
    }
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_seal(c: &mut Criterion) {
    let settings = make_settings();
    let params = EncryptionParameters::generate(KdfParams::RECOMMENDED);
    let key = make_key();

    c.bench_function("seal_settings", |b| {
        b.iter(|| seal(black_box(&settings), black_box(&params), black_box(&key)).unwrap())
    });
}

fn bench_open(c: &mut Criterion) {
    let params = EncryptionParameters::generate(KdfParams::RECOMMENDED);
    let key = make_key();
    let bytes = seal(&make_settings(), &params, &key).unwrap();

    c.bench_function("open_settings", |b| {
        b.iter(|| open(black_box(&bytes), black_box(&key.key)).unwrap())
    });
}

fn bench_parse_header(c: &mut Criterion) {
    let params = EncryptionParameters::generate(KdfParams::RECOMMENDED);
    let bytes = seal(&make_settings(), &params, &make_key()).unwrap();

    c.bench_function("parse_header", |b| {
        b.iter(|| parse_header(black_box(&bytes)).unwrap())
    });
}

criterion_group!(benches, bench_seal, bench_open, bench_parse_header);
criterion_main!(benches);
