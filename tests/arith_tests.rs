//! Arithmetic (SOF9/SOF10) decoding against streams produced by the
//! in-repo QM encoder, including equivalence with the Huffman path on
//! identical coefficients.

mod common;

use common::{decode_planes, max_diff};
use jpeg_oxide::arith::ArithConditioning;
use jpeg_oxide::bitstream::BitWriter;
use jpeg_oxide::consts::JPEG_NATURAL_ORDER;
use jpeg_oxide::dct::{
    dequantize_block, dequantize_multipliers, inverse_dct_8x8, level_shift_inverse,
};
use jpeg_oxide::huffman::{std_ac_luminance, std_dc_luminance, DerivedTable};
use jpeg_oxide::marker::MarkerWriter;
use jpeg_oxide::test_encoder::ArithScanEncoder;
use jpeg_oxide::{
    CodingProcess, DctBlock, FrameComponent, FrameHeader, QuantTable, ScanComponent, ScanHeader,
};

fn unit_qtable() -> QuantTable {
    QuantTable::from_zigzag(0, [1u16; 64])
}

fn expected_samples(coefficients: &DctBlock) -> DctBlock {
    let multipliers = dequantize_multipliers(&unit_qtable());
    let mut work = [0f32; 64];
    dequantize_block(coefficients, &multipliers, &mut work);
    inverse_dct_8x8(&mut work);
    level_shift_inverse(&work, 8)
}

fn gray_frame(width: u16, height: u16, process: CodingProcess) -> FrameHeader {
    FrameHeader {
        process,
        precision: 8,
        height,
        width,
        components: vec![FrameComponent { id: 1, h: 1, v: 1, quant_table: 0 }],
    }
}

fn gray_scan(band: (u8, u8, u8, u8)) -> ScanHeader {
    let (ss, se, ah, al) = band;
    ScanHeader {
        components: vec![ScanComponent { component_index: 0, id: 1, dc_table: 0, ac_table: 0 }],
        ss,
        se,
        ah,
        al,
    }
}

/// Headers up to (not including) the first SOS.
fn stream_prelude(frame: &FrameHeader, sof: u8, dac: Option<&[u8]>, dri: u16) -> Vec<u8> {
    let mut markers = MarkerWriter::new(Vec::new());
    markers.write_soi().unwrap();
    let table = unit_qtable();
    markers.write_dqt(&[(0, &table), (1, &table)]).unwrap();
    markers.write_sof(sof, frame).unwrap();
    if let Some(payload) = dac {
        markers.write_segment_raw(0xCC, payload).unwrap();
    }
    markers.write_dri(dri).unwrap();
    markers.into_inner()
}

fn append_sos(data: &mut Vec<u8>, scan: &ScanHeader) {
    let mut markers = MarkerWriter::new(std::mem::take(data));
    markers.write_sos(scan).unwrap();
    *data = markers.into_inner();
}

fn test_blocks() -> Vec<DctBlock> {
    let mut blocks = Vec::new();
    let mut block = [0i16; 64];
    block[0] = 37;
    block[JPEG_NATURAL_ORDER[1]] = -14;
    block[JPEG_NATURAL_ORDER[3]] = 6;
    block[JPEG_NATURAL_ORDER[17]] = 2;
    block[JPEG_NATURAL_ORDER[40]] = -1;
    blocks.push(block);

    let mut block = [0i16; 64];
    block[0] = 35;
    block[JPEG_NATURAL_ORDER[2]] = 9;
    block[JPEG_NATURAL_ORDER[63]] = 1;
    blocks.push(block);

    let mut block = [0i16; 64];
    block[0] = -120;
    blocks.push(block);

    let mut block = [0i16; 64];
    block[0] = -121;
    block[JPEG_NATURAL_ORDER[5]] = 30;
    blocks.push(block);

    blocks
}

/// Build a sequential arithmetic stream for one gray component.
fn build_arith_sequential(
    width: u16,
    height: u16,
    blocks: &[DctBlock],
    conditioning: &ArithConditioning,
    dac: Option<&[u8]>,
    restart_interval: u16,
) -> Vec<u8> {
    let frame = gray_frame(width, height, CodingProcess::SequentialArithmetic);
    let mut data = stream_prelude(&frame, 0xC9, dac, restart_interval);
    append_sos(&mut data, &gray_scan((0, 63, 0, 0)));

    let mut encoder = ArithScanEncoder::new();
    let mut restart_num = 0u8;
    for (i, block) in blocks.iter().enumerate() {
        if restart_interval > 0 && i > 0 && i % usize::from(restart_interval) == 0 {
            encoder.restart_segment(&mut data, restart_num);
            restart_num = (restart_num + 1) & 0x07;
        }
        encoder.encode_dc(0, 0, conditioning, i32::from(block[0]));
        encoder.encode_ac(block, 0, conditioning.ac_kx[0], 1, 63, 0);
    }
    encoder.finish(&mut data);
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

/// Build the Huffman twin of the same coefficients (baseline SOF0).
fn build_huffman_sequential(width: u16, height: u16, blocks: &[DctBlock]) -> Vec<u8> {
    let frame = gray_frame(width, height, CodingProcess::BaselineDct);
    let mut markers = MarkerWriter::new(Vec::new());
    markers.write_soi().unwrap();
    let table = unit_qtable();
    markers.write_dqt(&[(0, &table)]).unwrap();
    markers.write_sof(0xC0, &frame).unwrap();
    markers
        .write_dht(&[(0, false, std_dc_luminance()), (0, true, std_ac_luminance())])
        .unwrap();
    let mut data = markers.into_inner();
    append_sos(&mut data, &gray_scan((0, 63, 0, 0)));

    let dc = DerivedTable::new(std_dc_luminance()).unwrap();
    let ac = DerivedTable::new(std_ac_luminance()).unwrap();
    let mut bits = BitWriter::new(data);
    let mut last_dc = 0i32;
    for block in blocks {
        // DC delta.
        let diff = i32::from(block[0]) - last_dc;
        last_dc = i32::from(block[0]);
        let nbits = if diff == 0 {
            0
        } else {
            32 - diff.unsigned_abs().leading_zeros()
        };
        let (code, size) = dc.get_code(nbits as u8);
        bits.put_bits(code, size).unwrap();
        if nbits > 0 {
            let coded = if diff < 0 {
                (diff - 1) as u32 & ((1u32 << nbits) - 1)
            } else {
                diff as u32
            };
            bits.put_bits(coded, nbits).unwrap();
        }
        // AC run-lengths.
        let mut run = 0u32;
        for &n in JPEG_NATURAL_ORDER[1..].iter() {
            let coef = i32::from(block[n]);
            if coef == 0 {
                run += 1;
                continue;
            }
            while run >= 16 {
                let (code, size) = ac.get_code(0xF0);
                bits.put_bits(code, size).unwrap();
                run -= 16;
            }
            let nbits = 32 - coef.unsigned_abs().leading_zeros();
            let (code, size) = ac.get_code(((run as u8) << 4) | nbits as u8);
            bits.put_bits(code, size).unwrap();
            let coded = if coef < 0 {
                (coef - 1) as u32 & ((1u32 << nbits) - 1)
            } else {
                coef as u32
            };
            bits.put_bits(coded, nbits).unwrap();
            run = 0;
        }
        if run > 0 {
            let (code, size) = ac.get_code(0x00);
            bits.put_bits(code, size).unwrap();
        }
    }
    bits.flush().unwrap();
    let mut data = bits.into_inner();
    data.extend_from_slice(&[0xFF, 0xD9]);
    data
}

#[test]
fn sequential_arithmetic_decodes_expected_samples() {
    let blocks = test_blocks();
    let jpeg = build_arith_sequential(32, 8, &blocks, &ArithConditioning::default(), None, 0);
    let decoded = decode_planes(&jpeg).unwrap();

    for (b, block) in blocks.iter().enumerate() {
        let expected = expected_samples(block);
        for row in 0..8 {
            assert_eq!(
                &decoded.plane(0)[row * 32 + b * 8..row * 32 + b * 8 + 8],
                &expected[row * 8..row * 8 + 8],
                "block {} row {}",
                b,
                row
            );
        }
    }
}

#[test]
fn arithmetic_equals_huffman_on_identical_coefficients() {
    let blocks = test_blocks();
    let arith = build_arith_sequential(32, 8, &blocks, &ArithConditioning::default(), None, 0);
    let huffman = build_huffman_sequential(32, 8, &blocks);

    let a = decode_planes(&arith).unwrap();
    let h = decode_planes(&huffman).unwrap();
    assert_eq!(max_diff(&a, &h), 0);
}

#[test]
fn arithmetic_restart_intervals_decode() {
    let blocks = test_blocks();
    let with_restarts =
        build_arith_sequential(32, 8, &blocks, &ArithConditioning::default(), None, 2);
    let without = build_arith_sequential(32, 8, &blocks, &ArithConditioning::default(), None, 0);

    let a = decode_planes(&with_restarts).unwrap();
    let b = decode_planes(&without).unwrap();
    assert_eq!(max_diff(&a, &b), 0);
}

#[test]
fn conditioning_segment_changes_are_honored() {
    // Non-default DC bounds and AC Kx, announced via DAC and mirrored in
    // the encoder.
    let mut conditioning = ArithConditioning::default();
    conditioning.dc_l[0] = 1;
    conditioning.dc_u[0] = 3;
    conditioning.ac_kx[0] = 12;
    // DAC payload: DC slot 0 with (U=3, L=1); AC slot 0 with Kx=12.
    let dac = [0x00u8, 0x31, 0x10, 12];

    let blocks = test_blocks();
    let jpeg = build_arith_sequential(32, 8, &blocks, &conditioning, Some(&dac), 0);
    let decoded = decode_planes(&jpeg).unwrap();
    for (b, block) in blocks.iter().enumerate() {
        let expected = expected_samples(block);
        assert_eq!(
            &decoded.plane(0)[b * 8..b * 8 + 8],
            &expected[..8],
            "block {}",
            b
        );
    }
}

#[test]
fn progressive_arithmetic_with_successive_approximation() {
    let blocks = test_blocks();
    let frame = gray_frame(32, 8, CodingProcess::ProgressiveArithmetic);
    let mut data = stream_prelude(&frame, 0xCA, None, 0);
    let conditioning = ArithConditioning::default();

    // Scan 1: DC first at Al=1.
    append_sos(&mut data, &gray_scan((0, 0, 0, 1)));
    let mut encoder = ArithScanEncoder::new();
    for block in &blocks {
        encoder.encode_dc(0, 0, &conditioning, i32::from(block[0]) >> 1);
    }
    encoder.finish(&mut data);

    // Scan 2: DC refinement.
    append_sos(&mut data, &gray_scan((0, 0, 1, 0)));
    let mut encoder = ArithScanEncoder::new();
    for block in &blocks {
        encoder.encode_dc_refine(i32::from(block[0]), 0);
    }
    encoder.finish(&mut data);

    // Scan 3: the full AC band at Al=0.
    append_sos(&mut data, &gray_scan((1, 63, 0, 0)));
    let mut encoder = ArithScanEncoder::new();
    for block in &blocks {
        encoder.encode_ac(block, 0, conditioning.ac_kx[0], 1, 63, 0);
    }
    encoder.finish(&mut data);

    data.extend_from_slice(&[0xFF, 0xD9]);
    let decoded = decode_planes(&data).unwrap();

    for (b, block) in blocks.iter().enumerate() {
        let expected = expected_samples(block);
        for row in 0..8 {
            assert_eq!(
                &decoded.plane(0)[row * 32 + b * 8..row * 32 + b * 8 + 8],
                &expected[row * 8..row * 8 + 8],
                "block {} row {}",
                b,
                row
            );
        }
    }
}

#[test]
fn progressive_arithmetic_ac_refinement() {
    let blocks = test_blocks();
    let frame = gray_frame(32, 8, CodingProcess::ProgressiveArithmetic);
    let mut data = stream_prelude(&frame, 0xCA, None, 0);
    let conditioning = ArithConditioning::default();

    // DC complete in one scan.
    append_sos(&mut data, &gray_scan((0, 0, 0, 0)));
    let mut encoder = ArithScanEncoder::new();
    for block in &blocks {
        encoder.encode_dc(0, 0, &conditioning, i32::from(block[0]));
    }
    encoder.finish(&mut data);

    // AC at Al=1 then the refinement plane at Al=0.
    append_sos(&mut data, &gray_scan((1, 63, 0, 1)));
    let mut encoder = ArithScanEncoder::new();
    for block in &blocks {
        encoder.encode_ac(block, 0, conditioning.ac_kx[0], 1, 63, 1);
    }
    encoder.finish(&mut data);

    append_sos(&mut data, &gray_scan((1, 63, 1, 0)));
    let mut encoder = ArithScanEncoder::new();
    for block in &blocks {
        encoder.encode_ac_refine(block, 0, 1, 63, 1, 0);
    }
    encoder.finish(&mut data);

    data.extend_from_slice(&[0xFF, 0xD9]);
    let decoded = decode_planes(&data).unwrap();

    for (b, block) in blocks.iter().enumerate() {
        let expected = expected_samples(block);
        for row in 0..8 {
            assert_eq!(
                &decoded.plane(0)[row * 32 + b * 8..row * 32 + b * 8 + 8],
                &expected[row * 8..row * 8 + 8],
                "block {} row {}",
                b,
                row
            );
        }
    }
}

#[test]
fn interleaved_color_sequential_arithmetic() {
    // 16x16 YCbCr 4:2:0, flat blocks: four luma data units then one of
    // each chroma per MCU.
    let frame = FrameHeader {
        process: CodingProcess::SequentialArithmetic,
        precision: 8,
        height: 16,
        width: 16,
        components: vec![
            FrameComponent { id: 1, h: 2, v: 2, quant_table: 0 },
            FrameComponent { id: 2, h: 1, v: 1, quant_table: 1 },
            FrameComponent { id: 3, h: 1, v: 1, quant_table: 1 },
        ],
    };
    let mut data = stream_prelude(&frame, 0xC9, None, 0);
    let scan = ScanHeader {
        components: vec![
            ScanComponent { component_index: 0, id: 1, dc_table: 0, ac_table: 0 },
            ScanComponent { component_index: 1, id: 2, dc_table: 1, ac_table: 1 },
            ScanComponent { component_index: 2, id: 3, dc_table: 1, ac_table: 1 },
        ],
        ss: 0,
        se: 63,
        ah: 0,
        al: 0,
    };
    append_sos(&mut data, &scan);

    let conditioning = ArithConditioning::default();
    let luma_dc = [80i32, 160, -80, 240];
    let mut encoder = ArithScanEncoder::new();
    let zero_ac = [0i16; 64];
    for &dc in &luma_dc {
        encoder.encode_dc(0, 0, &conditioning, dc);
        encoder.encode_ac(&zero_ac, 0, conditioning.ac_kx[0], 1, 63, 0);
    }
    encoder.encode_dc(1, 1, &conditioning, 64);
    encoder.encode_ac(&zero_ac, 1, conditioning.ac_kx[1], 1, 63, 0);
    encoder.encode_dc(2, 1, &conditioning, -32);
    encoder.encode_ac(&zero_ac, 1, conditioning.ac_kx[1], 1, 63, 0);
    encoder.finish(&mut data);

    data.extend_from_slice(&[0xFF, 0xD9]);
    let decoded = decode_planes(&data).unwrap();

    let luma_expected = [
        (0usize, 0usize, 80i32),
        (8, 0, 160),
        (0, 8, -80),
        (8, 8, 240),
    ];
    for &(x0, y0, dc) in &luma_expected {
        let sample = (dc / 8 + 128) as i16;
        for y in y0..y0 + 8 {
            for x in x0..x0 + 8 {
                assert_eq!(decoded.plane(0)[y * 16 + x], sample, "luma at {},{}", x, y);
            }
        }
    }
    assert!(decoded.plane(1).iter().all(|&s| s == 64 / 8 + 128));
    assert!(decoded.plane(2).iter().all(|&s| s == -32 / 8 + 128));
}
