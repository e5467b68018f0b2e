//! Entropy coding benchmarks: Huffman block encode and decode.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use jpeg_oxide::bitstream::{BitWriter, StreamReader};
use jpeg_oxide::consts::JPEG_NATURAL_ORDER;
use jpeg_oxide::huffman::{std_ac_luminance, std_dc_luminance, DerivedTable};

fn coefficient_block() -> [i16; 64] {
    let mut block = [0i16; 64];
    block[0] = -37;
    for k in [1usize, 2, 3, 5, 8, 13, 21, 34] {
        block[JPEG_NATURAL_ORDER[k]] = ((k as i16) % 7) - 3;
    }
    block
}

fn bench_encode(c: &mut Criterion) {
    let dc = DerivedTable::new(std_dc_luminance()).unwrap();
    let ac = DerivedTable::new(std_ac_luminance()).unwrap();
    let block = coefficient_block();

    let mut group = c.benchmark_group("entropy");
    group.throughput(Throughput::Elements(1));
    group.bench_function("encode_block", |b| {
        b.iter(|| {
            let mut writer = BitWriter::new(Vec::with_capacity(256));
            let mut encoder = jpeg_oxide::entropy::EntropyEncoder::new(&mut writer);
            encoder
                .encode_block(black_box(&block), 0, &dc, &ac)
                .unwrap();
            encoder.flush().unwrap();
            black_box(writer.into_inner())
        })
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let dc_enc = DerivedTable::new(std_dc_luminance()).unwrap();
    let ac_enc = DerivedTable::new(std_ac_luminance()).unwrap();
    let block = coefficient_block();
    let mut writer = BitWriter::new(Vec::new());
    let mut encoder = jpeg_oxide::entropy::EntropyEncoder::new(&mut writer);
    encoder.encode_block(&block, 0, &dc_enc, &ac_enc).unwrap();
    encoder.flush().unwrap();
    let bytes = writer.into_inner();

    let dc = jpeg_oxide::huffman::DecodeTable::new(std_dc_luminance()).unwrap();
    let ac = jpeg_oxide::huffman::DecodeTable::new(std_ac_luminance()).unwrap();

    let mut group = c.benchmark_group("entropy");
    group.throughput(Throughput::Elements(1));
    group.bench_function("decode_block", |b| {
        b.iter(|| {
            let stream = StreamReader::new(black_box(&bytes));
            let mut reader = stream.bit_reader();
            let mut out = [0i16; 64];
            let mut pred = 0i32;
            jpeg_oxide::entropy::decode_block_sequential(&mut reader, &mut out, &dc, &ac, &mut pred)
                .unwrap();
            black_box(out)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
