//! Forward and inverse DCT (floating-point AAN variant).
//!
//! This implements the Arai-Agui-Nakajima factorization of the 8x8 DCT:
//! 5 multiplies and 29 adds per 1-D transform. The AAN row/column scale
//! factors are folded into the quantization divisors and dequantization
//! multipliers, so the transforms themselves only see the cheap inner
//! butterfly. Outputs of [`forward_dct_8x8`] are scaled by 8 x the AAN
//! factors; [`quantize_divisors`] removes that scaling.
//!
//! Reference: Y. Arai, T. Agui, M. Nakajima, "A Fast DCT-SQ Scheme for
//! Images", Trans. IEICE E-71(11), 1988.

use multiversion::multiversion;
use wide::f32x8;

use crate::consts::{DCTSIZE, DCTSIZE2};
use crate::quant::QuantTable;
use crate::types::{DctBlock, FloatBlock};

/// AAN DCT scale factor per row/column: `cos(k*PI/16) * sqrt(2)`, k=1..7.
const AAN_SCALE: [f32; DCTSIZE] = [
    1.0, 1.387039845, 1.306562965, 1.175875602, 1.0, 0.785694958, 0.541196100, 0.275899379,
];

const F_0_382683433: f32 = 0.382683433;
const F_0_541196100: f32 = 0.541196100;
const F_0_707106781: f32 = 0.707106781;
const F_1_306562965: f32 = 1.306562965;
const F_1_414213562: f32 = 1.414213562;
const F_1_847759065: f32 = 1.847759065;
const F_1_082392200: f32 = 1.082392200;
const F_2_613125930: f32 = 2.613125930;

/// Subtract the level shift `1 << (precision - 1)` and widen to f32.
pub fn level_shift_forward(samples: &DctBlock, precision: u8) -> FloatBlock {
    let center = f32::from(1i16 << (precision - 1));
    let mut out = [0f32; DCTSIZE2];
    for (o, &s) in out.iter_mut().zip(samples.iter()) {
        *o = f32::from(s) - center;
    }
    out
}

/// Round IDCT output, add the level shift back, and clamp to the sample
/// range `[0, (1 << precision) - 1]`.
pub fn level_shift_inverse(block: &FloatBlock, precision: u8) -> DctBlock {
    let center = i32::from(1i16 << (precision - 1));
    let limit = (1i32 << precision) - 1;
    let mut out = [0i16; DCTSIZE2];
    for (o, &v) in out.iter_mut().zip(block.iter()) {
        let s = v.round() as i32 + center;
        *o = s.clamp(0, limit) as i16;
    }
    out
}

/// 2-D forward DCT, in place. Input is level-shifted samples; output is
/// coefficients scaled by 8 and by the AAN factors.
#[multiversion(targets(
    "x86_64+avx2",
    "x86_64+sse4.1",
    "x86+avx2",
    "x86+sse4.1",
    "aarch64+neon",
))]
pub fn forward_dct_8x8(data: &mut FloatBlock) {
    // Pass 1: rows.
    for row in 0..DCTSIZE {
        let b = row * DCTSIZE;

        let tmp0 = data[b] + data[b + 7];
        let tmp7 = data[b] - data[b + 7];
        let tmp1 = data[b + 1] + data[b + 6];
        let tmp6 = data[b + 1] - data[b + 6];
        let tmp2 = data[b + 2] + data[b + 5];
        let tmp5 = data[b + 2] - data[b + 5];
        let tmp3 = data[b + 3] + data[b + 4];
        let tmp4 = data[b + 3] - data[b + 4];

        // Even part
        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        data[b] = tmp10 + tmp11;
        data[b + 4] = tmp10 - tmp11;

        let z1 = (tmp12 + tmp13) * F_0_707106781;
        data[b + 2] = tmp13 + z1;
        data[b + 6] = tmp13 - z1;

        // Odd part
        let tmp10 = tmp4 + tmp5;
        let tmp11 = tmp5 + tmp6;
        let tmp12 = tmp6 + tmp7;

        let z5 = (tmp10 - tmp12) * F_0_382683433;
        let z2 = F_0_541196100 * tmp10 + z5;
        let z4 = F_1_306562965 * tmp12 + z5;
        let z3 = tmp11 * F_0_707106781;

        let z11 = tmp7 + z3;
        let z13 = tmp7 - z3;

        data[b + 5] = z13 + z2;
        data[b + 3] = z13 - z2;
        data[b + 1] = z11 + z4;
        data[b + 7] = z11 - z4;
    }

    // Pass 2: columns.
    for col in 0..DCTSIZE {
        let at = |r: usize| r * DCTSIZE + col;

        let tmp0 = data[at(0)] + data[at(7)];
        let tmp7 = data[at(0)] - data[at(7)];
        let tmp1 = data[at(1)] + data[at(6)];
        let tmp6 = data[at(1)] - data[at(6)];
        let tmp2 = data[at(2)] + data[at(5)];
        let tmp5 = data[at(2)] - data[at(5)];
        let tmp3 = data[at(3)] + data[at(4)];
        let tmp4 = data[at(3)] - data[at(4)];

        let tmp10 = tmp0 + tmp3;
        let tmp13 = tmp0 - tmp3;
        let tmp11 = tmp1 + tmp2;
        let tmp12 = tmp1 - tmp2;

        data[at(0)] = tmp10 + tmp11;
        data[at(4)] = tmp10 - tmp11;

        let z1 = (tmp12 + tmp13) * F_0_707106781;
        data[at(2)] = tmp13 + z1;
        data[at(6)] = tmp13 - z1;

        let tmp10 = tmp4 + tmp5;
        let tmp11 = tmp5 + tmp6;
        let tmp12 = tmp6 + tmp7;

        let z5 = (tmp10 - tmp12) * F_0_382683433;
        let z2 = F_0_541196100 * tmp10 + z5;
        let z4 = F_1_306562965 * tmp12 + z5;
        let z3 = tmp11 * F_0_707106781;

        let z11 = tmp7 + z3;
        let z13 = tmp7 - z3;

        data[at(5)] = z13 + z2;
        data[at(3)] = z13 - z2;
        data[at(1)] = z11 + z4;
        data[at(7)] = z11 - z4;
    }
}

/// 2-D inverse DCT, in place. Input is coefficients already multiplied by
/// the dequantization multipliers; output is level-shift-pending samples.
#[multiversion(targets(
    "x86_64+avx2",
    "x86_64+sse4.1",
    "x86+avx2",
    "x86+sse4.1",
    "aarch64+neon",
))]
pub fn inverse_dct_8x8(data: &mut FloatBlock) {
    // Pass 1: columns.
    for col in 0..DCTSIZE {
        let at = |r: usize| r * DCTSIZE + col;

        // Even part
        let tmp0 = data[at(0)];
        let tmp1 = data[at(2)];
        let tmp2 = data[at(4)];
        let tmp3 = data[at(6)];

        let tmp10 = tmp0 + tmp2;
        let tmp11 = tmp0 - tmp2;
        let tmp13 = tmp1 + tmp3;
        let tmp12 = (tmp1 - tmp3) * F_1_414213562 - tmp13;

        let tmp0 = tmp10 + tmp13;
        let tmp3 = tmp10 - tmp13;
        let tmp1 = tmp11 + tmp12;
        let tmp2 = tmp11 - tmp12;

        // Odd part
        let tmp4 = data[at(1)];
        let tmp5 = data[at(3)];
        let tmp6 = data[at(5)];
        let tmp7 = data[at(7)];

        let z13 = tmp6 + tmp5;
        let z10 = tmp6 - tmp5;
        let z11 = tmp4 + tmp7;
        let z12 = tmp4 - tmp7;

        let tmp7 = z11 + z13;
        let tmp11 = (z11 - z13) * F_1_414213562;

        let z5 = (z10 + z12) * F_1_847759065;
        let tmp10 = F_1_082392200 * z12 - z5;
        let tmp12 = -F_2_613125930 * z10 + z5;

        let tmp6 = tmp12 - tmp7;
        let tmp5 = tmp11 - tmp6;
        let tmp4 = tmp10 + tmp5;

        data[at(0)] = tmp0 + tmp7;
        data[at(7)] = tmp0 - tmp7;
        data[at(1)] = tmp1 + tmp6;
        data[at(6)] = tmp1 - tmp6;
        data[at(2)] = tmp2 + tmp5;
        data[at(5)] = tmp2 - tmp5;
        data[at(4)] = tmp3 + tmp4;
        data[at(3)] = tmp3 - tmp4;
    }

    // Pass 2: rows.
    for row in 0..DCTSIZE {
        let b = row * DCTSIZE;

        let tmp10 = data[b] + data[b + 4];
        let tmp11 = data[b] - data[b + 4];
        let tmp13 = data[b + 2] + data[b + 6];
        let tmp12 = (data[b + 2] - data[b + 6]) * F_1_414213562 - tmp13;

        let tmp0 = tmp10 + tmp13;
        let tmp3 = tmp10 - tmp13;
        let tmp1 = tmp11 + tmp12;
        let tmp2 = tmp11 - tmp12;

        let z13 = data[b + 5] + data[b + 3];
        let z10 = data[b + 5] - data[b + 3];
        let z11 = data[b + 1] + data[b + 7];
        let z12 = data[b + 1] - data[b + 7];

        let tmp7 = z11 + z13;
        let tmp11 = (z11 - z13) * F_1_414213562;

        let z5 = (z10 + z12) * F_1_847759065;
        let tmp10 = F_1_082392200 * z12 - z5;
        let tmp12 = -F_2_613125930 * z10 + z5;

        let tmp6 = tmp12 - tmp7;
        let tmp5 = tmp11 - tmp6;
        let tmp4 = tmp10 + tmp5;

        data[b] = tmp0 + tmp7;
        data[b + 7] = tmp0 - tmp7;
        data[b + 1] = tmp1 + tmp6;
        data[b + 6] = tmp1 - tmp6;
        data[b + 2] = tmp2 + tmp5;
        data[b + 5] = tmp2 - tmp5;
        data[b + 4] = tmp3 + tmp4;
        data[b + 3] = tmp3 - tmp4;
    }
}

/// Reciprocal quantization divisors with the AAN scaling folded in:
/// `1 / (q[r][c] * aan[r] * aan[c] * 8)`, natural order.
///
/// A zero table element is treated as one rather than dividing by it.
pub fn quantize_divisors(table: &QuantTable) -> FloatBlock {
    let natural = table.natural();
    let mut out = [0f32; DCTSIZE2];
    for row in 0..DCTSIZE {
        for col in 0..DCTSIZE {
            let i = row * DCTSIZE + col;
            let q = natural[i].max(1) as f32;
            out[i] = 1.0 / (q * AAN_SCALE[row] * AAN_SCALE[col] * 8.0);
        }
    }
    out
}

/// Dequantization multipliers with the AAN scaling folded in:
/// `q[r][c] * aan[r] * aan[c] / 8`, natural order.
pub fn dequantize_multipliers(table: &QuantTable) -> FloatBlock {
    let natural = table.natural();
    let mut out = [0f32; DCTSIZE2];
    for row in 0..DCTSIZE {
        for col in 0..DCTSIZE {
            let i = row * DCTSIZE + col;
            out[i] = f32::from(natural[i]) * AAN_SCALE[row] * AAN_SCALE[col] / 8.0;
        }
    }
    out
}

#[inline]
fn load8(s: &[f32]) -> f32x8 {
    f32x8::from([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]])
}

/// Quantize forward-DCT output to integer coefficients, natural order.
pub fn quantize_block(coeffs: &FloatBlock, divisors: &FloatBlock, out: &mut DctBlock) {
    for row in 0..DCTSIZE {
        let i = row * DCTSIZE;
        let q = (load8(&coeffs[i..]) * load8(&divisors[i..])).round().to_array();
        for (o, v) in out[i..i + DCTSIZE].iter_mut().zip(q) {
            *o = v as i16;
        }
    }
}

/// Expand integer coefficients into scaled floats ready for the IDCT.
pub fn dequantize_block(coeffs: &DctBlock, multipliers: &FloatBlock, out: &mut FloatBlock) {
    let mut floats = [0f32; DCTSIZE2];
    for (f, &c) in floats.iter_mut().zip(coeffs.iter()) {
        *f = f32::from(c);
    }
    for row in 0..DCTSIZE {
        let i = row * DCTSIZE;
        let d = (load8(&floats[i..]) * load8(&multipliers[i..])).to_array();
        out[i..i + DCTSIZE].copy_from_slice(&d);
    }
}
