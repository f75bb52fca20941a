use candle_core::{Device, Tensor};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use varlen_attention::{
    resolve, BackendName, LayerAttentionConfig, MetadataBuilder, PackedAttention,
    PackedSeqMetadataBuilder,
};

fn bench_packed_forward(c: &mut Criterion) {
    let device = Device::Cpu;
    let num_heads = 8usize;
    let head_size = 64usize;
    let batches: &[&[usize]] = &[&[128; 4], &[32, 256, 64, 160], &[512; 2]];

    let backend = resolve(BackendName::FlashAttn).expect("resolve fused backend");
    let layer = backend
        .construct(&LayerAttentionConfig::new(num_heads, head_size, num_heads))
        .expect("construct layer");

    let mut group = c.benchmark_group("packed_forward");
    for &seq_lens in batches {
        let total: usize = seq_lens.iter().sum();
        let hidden = num_heads * head_size;
        let q = Tensor::randn(0f32, 1.0, (total, hidden), &device).expect("q");
        let k = Tensor::randn(0f32, 1.0, (total, hidden), &device).expect("k");
        let v = Tensor::randn(0f32, 1.0, (total, hidden), &device).expect("v");
        let metadata = PackedSeqMetadataBuilder::build(seq_lens);

        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{total}tok_{}seqs", seq_lens.len())),
            &metadata,
            |b, metadata| {
                b.iter(|| {
                    let out = layer
                        .forward_encoder(black_box(&q), black_box(&k), black_box(&v), metadata)
                        .expect("forward");
                    black_box(out);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_packed_forward);
criterion_main!(benches);
