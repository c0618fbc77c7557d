use criterion::{criterion_group, criterion_main, Criterion};
use zvec_distance::{compute_f32, Op};

fn distance_matrix(c: &mut Criterion) {
    c.bench_function("compute_f32_1x1_dim786", |b| {
        let m: Vec<f32> = (0..786).map(|_| rand::random()).collect();
        let q: Vec<f32> = (0..786).map(|_| rand::random()).collect();
        let mut out = [0.0f32; 1];
        b.iter(|| {
            compute_f32(&m, &q, 786, 1, 1, Op::Ip, &mut out);
            std::hint::black_box(out[0]);
        });
    });
}

criterion_group!(benches, distance_matrix);
criterion_main!(benches);
