use criterion::{black_box, criterion_group, criterion_main, Criterion};
use zb_security::{ccm, AuxHeader, CipherService, KeyId};

fn ccm_benchmark(c: &mut Criterion) {
    let key = [0x5Au8; 16];
    let header = AuxHeader::new(KeyId::Network, 1, 0x0011_2233_4455_6677);
    let aad = header.encode();
    let nonce = header.nonce();
    let mut cipher = CipherService::new();

    c.bench_function("ccm_encrypt_48", |b| {
        b.iter(|| {
            let mut payload = [0u8; 48];
            ccm::encrypt(&mut cipher, &key, &nonce, &aad, black_box(&mut payload))
        })
    });
}

criterion_group!(benches, ccm_benchmark);
criterion_main!(benches);
