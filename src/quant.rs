//! Quantization tables, quality scaling, and quality estimation.
//!
//! Tables are stored in zig-zag wire order with their element precision
//! (8- or 16-bit). Quality scaling follows the IJG convention: a quality
//! 1-100 maps to a percentage scale of the Annex K tables, 5000/q below 50
//! and 200-2q at 50 and above. Quality estimation inverts that mapping.

use crate::consts::{
    DCTSIZE2, JPEG_NATURAL_ORDER, JPEG_ZIGZAG_ORDER, STD_CHROMINANCE_QUANT, STD_LUMINANCE_QUANT,
};

/// A quantization table as defined by a DQT segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    /// Element precision: 0 for 8-bit, 1 for 16-bit.
    pub precision: u8,
    /// The 64 elements in zig-zag order.
    pub values: [u16; DCTSIZE2],
}

impl QuantTable {
    /// Create a table from zig-zag ordered values.
    pub fn from_zigzag(precision: u8, values: [u16; DCTSIZE2]) -> Self {
        Self { precision, values }
    }

    /// Create a table from natural (row-major) ordered values.
    pub fn from_natural(precision: u8, natural: [u16; DCTSIZE2]) -> Self {
        let mut values = [0u16; DCTSIZE2];
        for (k, &n) in JPEG_NATURAL_ORDER.iter().enumerate() {
            values[k] = natural[n];
        }
        Self { precision, values }
    }

    /// The elements reordered into natural (row-major) order.
    pub fn natural(&self) -> [u16; DCTSIZE2] {
        let mut natural = [0u16; DCTSIZE2];
        for (n, &k) in JPEG_ZIGZAG_ORDER.iter().enumerate() {
            natural[n] = self.values[k];
        }
        natural
    }
}

/// Convert a quality setting (1-100) to a percentage scaling factor.
pub fn quality_to_scale_factor(quality: u8) -> u32 {
    let quality = quality.clamp(1, 100) as u32;
    if quality < 50 {
        5000 / quality
    } else {
        200 - quality * 2
    }
}

/// Scale a base table (natural order) by a quality setting.
///
/// Elements are clamped to [1, 32767], or to 255 when `force_baseline`
/// keeps the table 8-bit. The resulting precision is chosen from the
/// largest element.
pub fn create_quant_table(
    base: &[u16; DCTSIZE2],
    quality: u8,
    force_baseline: bool,
) -> QuantTable {
    let scale = quality_to_scale_factor(quality);
    let mut natural = [0u16; DCTSIZE2];
    for (out, &b) in natural.iter_mut().zip(base.iter()) {
        let mut v = (u32::from(b) * scale + 50) / 100;
        if v == 0 {
            v = 1;
        }
        if v > 32767 {
            v = 32767;
        }
        if force_baseline && v > 255 {
            v = 255;
        }
        *out = v as u16;
    }
    let precision = if natural.iter().any(|&v| v > 255) { 1 } else { 0 };
    QuantTable::from_natural(precision, natural)
}

/// The standard luminance table scaled to a quality setting.
pub fn std_luminance_qtable(quality: u8, force_baseline: bool) -> QuantTable {
    create_quant_table(&STD_LUMINANCE_QUANT, quality, force_baseline)
}

/// The standard chrominance table scaled to a quality setting.
pub fn std_chrominance_qtable(quality: u8, force_baseline: bool) -> QuantTable {
    create_quant_table(&STD_CHROMINANCE_QUANT, quality, force_baseline)
}

/// Mean scale factor of a table against a quality-50 reference, in percent.
fn mean_scale(table: &QuantTable, reference: &[u16; DCTSIZE2]) -> f64 {
    let natural = table.natural();
    let mut sum = 0.0f64;
    for (&q, &r) in natural.iter().zip(reference.iter()) {
        sum += 100.0 * f64::from(q) / f64::from(r);
    }
    sum / DCTSIZE2 as f64
}

fn scale_to_quality(table: &QuantTable, reference: &[u16; DCTSIZE2]) -> f32 {
    if table.natural().iter().all(|&v| v == 1) {
        return 100.0;
    }
    let m = mean_scale(table, reference);
    let quality = if m <= 100.0 { (200.0 - m) / 2.0 } else { 5000.0 / m };
    quality.clamp(0.0, 100.0) as f32
}

/// Estimate the quality setting that produced a frame's quantization
/// tables.
///
/// The luminance table is compared against the standard luminance
/// reference; the chrominance table, when present, against the standard
/// chrominance reference. The reported quality is the lower of the two
/// estimates, clamped to [0, 100].
pub fn estimate_quality(luminance: &QuantTable, chrominance: Option<&QuantTable>) -> f32 {
    let luma_q = scale_to_quality(luminance, &STD_LUMINANCE_QUANT);
    match chrominance {
        Some(chroma) => {
            let chroma_q = scale_to_quality(chroma, &STD_CHROMINANCE_QUANT);
            luma_q.min(chroma_q)
        }
        None => luma_q,
    }
}
