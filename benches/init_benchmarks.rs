use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use crypto_threading::{
    thread_callback_table, Algorithm, MacAlgorithm, NativeMutex, Registrar, SoftwareLibrary,
};

fn benchmark_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("table_access", |b| {
        b.iter(|| black_box(thread_callback_table()));
    });

    group.bench_function("fresh_init", |b| {
        b.iter_with_setup(
            || Registrar::new(SoftwareLibrary::new()),
            |registrar| {
                black_box(registrar.init_default().unwrap());
            },
        );
    });

    let registrar = Registrar::new(SoftwareLibrary::new());
    registrar.init_default().unwrap();

    group.bench_function("repeated_init", |b| {
        b.iter(|| black_box(registrar.init_default().unwrap()));
    });

    group.bench_function("handle", |b| {
        b.iter(|| black_box(registrar.handle().unwrap()));
    });

    group.finish();
}

fn benchmark_native_mutex(c: &mut Criterion) {
    let mutex = NativeMutex::new(thread_callback_table()).unwrap();

    c.bench_function("native_mutex_lock_unlock", |b| {
        b.iter(|| {
            let guard = mutex.lock().unwrap();
            black_box(&guard);
        });
    });
}

fn benchmark_operations(c: &mut Criterion) {
    let registrar = Registrar::new(SoftwareLibrary::new());
    let crypto = registrar.init_default().unwrap();

    let mut group = c.benchmark_group("operations");
    for size in [64usize, 1024, 16384] {
        let data = vec![0x5au8; size];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("sha256", size), &data, |b, data| {
            b.iter(|| black_box(crypto.hash(Algorithm::Sha256, data).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("hmac_sha256", size), &data, |b, data| {
            b.iter(|| {
                let mut mac = crypto.mac(MacAlgorithm::HmacSha256, b"benchmark key").unwrap();
                mac.update(data).unwrap();
                black_box(mac.finish().unwrap())
            });
        });
    }
    group.finish();

    c.bench_function("random_32_bytes", |b| {
        b.iter(|| black_box(crypto.random_bytes(32, Default::default()).unwrap()));
    });
}

criterion_group!(
    benches,
    benchmark_registration,
    benchmark_native_mutex,
    benchmark_operations
);
criterion_main!(benches);
