//! DCT benchmarks.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use jpeg_oxide::dct::{
    dequantize_block, dequantize_multipliers, forward_dct_8x8, inverse_dct_8x8, level_shift_forward,
    quantize_block, quantize_divisors,
};
use jpeg_oxide::quant::std_luminance_qtable;

fn sample_block() -> [i16; 64] {
    let mut block = [0i16; 64];
    for (i, v) in block.iter_mut().enumerate() {
        *v = ((i * 73 + 17) % 256) as i16;
    }
    block
}

fn bench_forward(c: &mut Criterion) {
    let samples = sample_block();
    let divisors = quantize_divisors(&std_luminance_qtable(75, true));

    let mut group = c.benchmark_group("fdct");
    group.throughput(Throughput::Elements(1));
    group.bench_function("forward_quantize", |b| {
        b.iter(|| {
            let mut work = level_shift_forward(black_box(&samples), 8);
            forward_dct_8x8(&mut work);
            let mut out = [0i16; 64];
            quantize_block(&work, &divisors, &mut out);
            black_box(out)
        })
    });
    group.finish();
}

fn bench_inverse(c: &mut Criterion) {
    let samples = sample_block();
    let table = std_luminance_qtable(75, true);
    let divisors = quantize_divisors(&table);
    let multipliers = dequantize_multipliers(&table);
    let mut work = level_shift_forward(&samples, 8);
    forward_dct_8x8(&mut work);
    let mut coeffs = [0i16; 64];
    quantize_block(&work, &divisors, &mut coeffs);

    let mut group = c.benchmark_group("idct");
    group.throughput(Throughput::Elements(1));
    group.bench_function("dequantize_inverse", |b| {
        b.iter(|| {
            let mut work = [0f32; 64];
            dequantize_block(black_box(&coeffs), &multipliers, &mut work);
            inverse_dct_8x8(&mut work);
            black_box(work)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_forward, bench_inverse);
criterion_main!(benches);
