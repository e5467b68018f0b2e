//! The encoder orchestrator.
//!
//! Assembles a baseline (SOF0) JPEG: JFIF preamble, quantization and
//! Huffman tables, frame and scan headers, and the entropy-coded data.
//! Components are configured explicitly; helper constructors cover the
//! common grayscale and YCbCr layouts with the Annex K tables.
//!
//! With Huffman optimization enabled (or when a selected table slot has no
//! table), a first statistics pass walks the quantized coefficients and
//! optimal codebooks are built before emission.

use std::io::Write;

use crate::coefficients::CoefficientStore;
use crate::consts::{
    DCTSIZE, DCTSIZE2, JPEG_SOF0, MAX_BLOCKS_IN_MCU, MAX_COMPONENTS, NUM_TABLE_SLOTS,
};
use crate::dct::{forward_dct_8x8, level_shift_forward, quantize_block, quantize_divisors};
use crate::entropy::{EntropyEncoder, SymbolCounter};
use crate::error::{Error, Result};
use crate::huffman::{
    std_ac_chrominance, std_ac_luminance, std_dc_chrominance, std_dc_luminance, DerivedTable,
    FrequencyCounter, HuffTable,
};
use crate::marker::MarkerWriter;
use crate::quant::{std_chrominance_qtable, std_luminance_qtable, QuantTable};
use crate::types::{CodingProcess, DctBlock, FrameComponent, FrameHeader, ScanComponent, ScanHeader};

/// Supplier of sample blocks for the encoder.
///
/// `read_block` coordinates are full-resolution sample positions; requests
/// may extend past the image edge (MCU padding and subsampling), where the
/// source should replicate its edge samples to avoid ringing.
pub trait BlockSource {
    /// Image width in samples.
    fn width(&self) -> u16;

    /// Image height in lines.
    fn height(&self) -> u16;

    /// Fill `block` with the 8x8 samples of `component` at `(x, y)`.
    fn read_block(&mut self, block: &mut DctBlock, component: usize, x: usize, y: usize);
}

/// One component configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeComponent {
    /// Component identifier written to the frame header.
    pub id: u8,
    /// Quantization table selector (0-3).
    pub quant_table: u8,
    /// DC Huffman table selector (0-3).
    pub dc_table: u8,
    /// AC Huffman table selector (0-3).
    pub ac_table: u8,
    /// Horizontal sampling factor (1-4).
    pub h: u8,
    /// Vertical sampling factor (1-4).
    pub v: u8,
}

/// Baseline JPEG encoder configuration.
pub struct Encoder {
    components: Vec<EncodeComponent>,
    quant_tables: [Option<QuantTable>; NUM_TABLE_SLOTS],
    dc_tables: [Option<HuffTable>; NUM_TABLE_SLOTS],
    ac_tables: [Option<HuffTable>; NUM_TABLE_SLOTS],
    restart_interval: u16,
    optimize_huffman: bool,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// An empty configuration; add components and tables before encoding.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
            quant_tables: Default::default(),
            dc_tables: Default::default(),
            ac_tables: Default::default(),
            restart_interval: 0,
            optimize_huffman: false,
        }
    }

    /// Single-component configuration with the Annex K luminance tables
    /// scaled to `quality`.
    pub fn gray(quality: u8) -> Self {
        Self::new()
            .component(EncodeComponent {
                id: 1,
                quant_table: 0,
                dc_table: 0,
                ac_table: 0,
                h: 1,
                v: 1,
            })
            .quant_table(0, std_luminance_qtable(quality, true))
            .huffman_table(0, false, std_dc_luminance().clone())
            .huffman_table(0, true, std_ac_luminance().clone())
    }

    /// Three-component YCbCr configuration with luma sampling `(h, v)` and
    /// the Annex K tables scaled to `quality`.
    pub fn ycbcr(quality: u8, h: u8, v: u8) -> Self {
        let mut encoder = Self::new()
            .component(EncodeComponent {
                id: 1,
                quant_table: 0,
                dc_table: 0,
                ac_table: 0,
                h,
                v,
            })
            .quant_table(0, std_luminance_qtable(quality, true))
            .quant_table(1, std_chrominance_qtable(quality, true))
            .huffman_table(0, false, std_dc_luminance().clone())
            .huffman_table(0, true, std_ac_luminance().clone())
            .huffman_table(1, false, std_dc_chrominance().clone())
            .huffman_table(1, true, std_ac_chrominance().clone());
        for id in [2u8, 3] {
            encoder = encoder.component(EncodeComponent {
                id,
                quant_table: 1,
                dc_table: 1,
                ac_table: 1,
                h: 1,
                v: 1,
            });
        }
        encoder
    }

    /// Append a component.
    pub fn component(mut self, component: EncodeComponent) -> Self {
        self.components.push(component);
        self
    }

    /// Install a quantization table in a slot.
    pub fn quant_table(mut self, slot: u8, table: QuantTable) -> Self {
        self.quant_tables[usize::from(slot) & 0x03] = Some(table);
        self
    }

    /// Install a fixed Huffman table in a slot. Slots left empty are
    /// filled by the optimal-Huffman pass.
    pub fn huffman_table(mut self, slot: u8, is_ac: bool, table: HuffTable) -> Self {
        let slot = usize::from(slot) & 0x03;
        if is_ac {
            self.ac_tables[slot] = Some(table);
        } else {
            self.dc_tables[slot] = Some(table);
        }
        self
    }

    /// Emit restart markers every `interval` MCUs; zero disables them.
    pub fn restart_interval(mut self, interval: u16) -> Self {
        self.restart_interval = interval;
        self
    }

    /// Replace all Huffman tables with optimal ones built from a first
    /// statistics pass.
    pub fn optimize_huffman(mut self, enable: bool) -> Self {
        self.optimize_huffman = enable;
        self
    }

    /// Encode `source` into `output`.
    pub fn encode<S: BlockSource, W: Write>(&self, source: &mut S, output: W) -> Result<()> {
        let frame = self.build_frame(source)?;
        let store = collect_coefficients(&frame, &self.quant_tables, source)?;

        // Resolve Huffman tables, running the statistics pass when a slot
        // is empty or optimization is requested.
        let mut dc_tables = self.dc_tables.clone();
        let mut ac_tables = self.ac_tables.clone();
        let needs_stats = self.optimize_huffman
            || self.components.iter().any(|c| {
                dc_tables[usize::from(c.dc_table)].is_none()
                    || ac_tables[usize::from(c.ac_table)].is_none()
            });
        if needs_stats {
            let (dc_opt, ac_opt) =
                gather_optimal_tables(&frame, &self.components, &store, self.restart_interval)?;
            for slot in 0..NUM_TABLE_SLOTS {
                if self.optimize_huffman || dc_tables[slot].is_none() {
                    if let Some(table) = &dc_opt[slot] {
                        dc_tables[slot] = Some(table.clone());
                    }
                }
                if self.optimize_huffman || ac_tables[slot].is_none() {
                    if let Some(table) = &ac_opt[slot] {
                        ac_tables[slot] = Some(table.clone());
                    }
                }
            }
        }

        emit_stream(
            &frame,
            &self.components,
            &self.quant_tables,
            &dc_tables,
            &ac_tables,
            self.restart_interval,
            &store,
            output,
            JPEG_SOF0,
            true,
            &[],
        )
    }

    fn build_frame<S: BlockSource>(&self, source: &S) -> Result<FrameHeader> {
        if self.components.is_empty() {
            return Err(Error::InvalidOperation("encoder has no components"));
        }
        if self.components.len() > MAX_COMPONENTS {
            return Err(Error::InvalidOperation("too many components"));
        }
        let units: usize = self
            .components
            .iter()
            .map(|c| c.h as usize * c.v as usize)
            .sum();
        if self.components.len() > 1 && units > MAX_BLOCKS_IN_MCU {
            return Err(Error::InvalidOperation("MCU exceeds 10 data units"));
        }
        for comp in &self.components {
            if self.quant_tables[usize::from(comp.quant_table)].is_none() {
                return Err(Error::InvalidOperation(
                    "component references an empty quantization table slot",
                ));
            }
        }
        let frame = FrameHeader {
            process: CodingProcess::BaselineDct,
            precision: 8,
            height: source.height(),
            width: source.width(),
            components: self
                .components
                .iter()
                .map(|c| FrameComponent {
                    id: c.id,
                    h: c.h,
                    v: c.v,
                    quant_table: c.quant_table,
                })
                .collect(),
        };
        frame.validate()?;
        let h_max = frame.h_max();
        let v_max = frame.v_max();
        for comp in &frame.components {
            if h_max % comp.h != 0 || v_max % comp.v != 0 {
                return Err(Error::InvalidOperation("fractional subsampling ratios"));
            }
        }
        Ok(frame)
    }
}

/// Visit every data unit of the single scan in emission order:
/// `f(mcu_index, component, block_x, block_y)`.
fn walk_scan_units(
    frame: &FrameHeader,
    mut f: impl FnMut(usize, usize, usize, usize) -> Result<()>,
) -> Result<()> {
    if frame.components.len() == 1 {
        let (bw, bh) = frame.component_blocks(0);
        for by in 0..bh {
            for bx in 0..bw {
                f(by * bw + bx, 0, bx, by)?;
            }
        }
        return Ok(());
    }
    let mut mcu = 0usize;
    for mcu_y in 0..frame.mcu_rows() {
        for mcu_x in 0..frame.mcus_per_line() {
            for (ci, comp) in frame.components.iter().enumerate() {
                for dv in 0..comp.v as usize {
                    for dh in 0..comp.h as usize {
                        f(
                            mcu,
                            ci,
                            mcu_x * comp.h as usize + dh,
                            mcu_y * comp.v as usize + dv,
                        )?;
                    }
                }
            }
            mcu += 1;
        }
    }
    Ok(())
}

/// Pull every component block from the source, box-filtering subsampled
/// components, and store the quantized coefficients.
fn collect_coefficients<S: BlockSource>(
    frame: &FrameHeader,
    quant: &[Option<QuantTable>; NUM_TABLE_SLOTS],
    source: &mut S,
) -> Result<CoefficientStore> {
    let mut store = CoefficientStore::for_frame(frame);
    let h_max = frame.h_max() as usize;
    let v_max = frame.v_max() as usize;

    for (ci, comp) in frame.components.iter().enumerate() {
        let table = quant[usize::from(comp.quant_table)]
            .as_ref()
            .ok_or(Error::InvalidOperation(
                "component references an empty quantization table slot",
            ))?;
        let divisors = quantize_divisors(table);
        let sx = h_max / comp.h as usize;
        let sy = v_max / comp.v as usize;
        let (bw, bh) = store.dims(ci);

        let mut samples = [0i16; DCTSIZE2];
        let mut source_block = [0i16; DCTSIZE2];
        for by in 0..bh {
            for bx in 0..bw {
                if sx == 1 && sy == 1 {
                    source.read_block(&mut samples, ci, bx * DCTSIZE, by * DCTSIZE);
                } else {
                    // Box-filter sx x sy full-resolution blocks down to one
                    // component block.
                    let mut sums = [0i32; DCTSIZE2];
                    for j in 0..sy {
                        for i in 0..sx {
                            source.read_block(
                                &mut source_block,
                                ci,
                                (bx * sx + i) * DCTSIZE,
                                (by * sy + j) * DCTSIZE,
                            );
                            for r in 0..DCTSIZE {
                                for c in 0..DCTSIZE {
                                    let cy = (j * DCTSIZE + r) / sy;
                                    let cx = (i * DCTSIZE + c) / sx;
                                    sums[cy * DCTSIZE + cx] +=
                                        i32::from(source_block[r * DCTSIZE + c]);
                                }
                            }
                        }
                    }
                    let n = (sx * sy) as i32;
                    for (s, &sum) in samples.iter_mut().zip(sums.iter()) {
                        *s = ((sum + n / 2) / n) as i16;
                    }
                }

                let mut work = level_shift_forward(&samples, frame.precision);
                forward_dct_8x8(&mut work);
                quantize_block(&work, &divisors, store.block_mut(ci, bx, by));
            }
        }
    }
    Ok(store)
}

/// First pass of 2-pass encoding: count the symbols each used table slot
/// would emit and build optimal codebooks per slot.
pub(crate) fn gather_optimal_tables(
    frame: &FrameHeader,
    components: &[EncodeComponent],
    store: &CoefficientStore,
    restart_interval: u16,
) -> Result<(
    [Option<HuffTable>; NUM_TABLE_SLOTS],
    [Option<HuffTable>; NUM_TABLE_SLOTS],
)> {
    let mut dc_freq: Vec<FrequencyCounter> =
        (0..NUM_TABLE_SLOTS).map(|_| FrequencyCounter::new()).collect();
    let mut ac_freq: Vec<FrequencyCounter> =
        (0..NUM_TABLE_SLOTS).map(|_| FrequencyCounter::new()).collect();
    let mut counter = SymbolCounter::new();
    let interval = usize::from(restart_interval);
    let mut last_mcu = usize::MAX;

    walk_scan_units(frame, |mcu, ci, bx, by| {
        if interval > 0 && mcu != last_mcu {
            if mcu > 0 && mcu % interval == 0 {
                counter.reset_dc();
            }
            last_mcu = mcu;
        }
        counter.count_block(
            store.block(ci, bx, by),
            ci,
            &mut dc_freq[usize::from(components[ci].dc_table)],
            &mut ac_freq[usize::from(components[ci].ac_table)],
        );
        Ok(())
    })?;

    let mut dc_out: [Option<HuffTable>; NUM_TABLE_SLOTS] = Default::default();
    let mut ac_out: [Option<HuffTable>; NUM_TABLE_SLOTS] = Default::default();
    for slot in 0..NUM_TABLE_SLOTS {
        if !dc_freq[slot].is_empty() {
            dc_out[slot] = Some(dc_freq[slot].build_table()?);
        }
        if !ac_freq[slot].is_empty() {
            ac_out[slot] = Some(ac_freq[slot].build_table()?);
        }
    }
    Ok((dc_out, ac_out))
}

/// Emit the complete stream: markers, tables, and the entropy-coded scan.
/// Shared by the encoder and the optimizer (which passes its own SOF code
/// and preserved segments).
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_stream<W: Write>(
    frame: &FrameHeader,
    components: &[EncodeComponent],
    quant: &[Option<QuantTable>; NUM_TABLE_SLOTS],
    dc_tables: &[Option<HuffTable>; NUM_TABLE_SLOTS],
    ac_tables: &[Option<HuffTable>; NUM_TABLE_SLOTS],
    restart_interval: u16,
    store: &CoefficientStore,
    output: W,
    sof_marker: u8,
    jfif: bool,
    extra_segments: &[(u8, Vec<u8>)],
) -> Result<()> {
    // Derive encode tables for the slots actually selected.
    let mut dc_derived: [Option<DerivedTable>; NUM_TABLE_SLOTS] = Default::default();
    let mut ac_derived: [Option<DerivedTable>; NUM_TABLE_SLOTS] = Default::default();
    for comp in components {
        let dc_slot = usize::from(comp.dc_table);
        if dc_derived[dc_slot].is_none() {
            let table = dc_tables[dc_slot]
                .as_ref()
                .ok_or(Error::InvalidOperation("missing DC Huffman table"))?;
            dc_derived[dc_slot] = Some(DerivedTable::new(table)?);
        }
        let ac_slot = usize::from(comp.ac_table);
        if ac_derived[ac_slot].is_none() {
            let table = ac_tables[ac_slot]
                .as_ref()
                .ok_or(Error::InvalidOperation("missing AC Huffman table"))?;
            ac_derived[ac_slot] = Some(DerivedTable::new(table)?);
        }
    }

    let mut markers = MarkerWriter::new(output);
    markers.write_soi()?;
    if jfif {
        markers.write_jfif_app0(0, 1, 1)?;
    }
    for (code, payload) in extra_segments {
        markers.write_segment_raw(*code, payload)?;
    }

    // Quantization tables: each used slot once, combined into one segment.
    let mut quant_refs: Vec<(u8, &QuantTable)> = Vec::new();
    for comp in components {
        let slot = comp.quant_table;
        if !quant_refs.iter().any(|(s, _)| *s == slot) {
            let table = quant[usize::from(slot)]
                .as_ref()
                .ok_or(Error::InvalidOperation(
                    "component references an empty quantization table slot",
                ))?;
            quant_refs.push((slot, table));
        }
    }
    markers.write_dqt(&quant_refs)?;

    markers.write_sof(sof_marker, frame)?;

    // Huffman tables: each used (slot, class) once, combined.
    let mut huff_refs: Vec<(u8, bool, &HuffTable)> = Vec::new();
    for comp in components {
        if !huff_refs
            .iter()
            .any(|(s, ac, _)| *s == comp.dc_table && !*ac)
        {
            if let Some(table) = &dc_tables[usize::from(comp.dc_table)] {
                huff_refs.push((comp.dc_table, false, table));
            }
        }
        if !huff_refs
            .iter()
            .any(|(s, ac, _)| *s == comp.ac_table && *ac)
        {
            if let Some(table) = &ac_tables[usize::from(comp.ac_table)] {
                huff_refs.push((comp.ac_table, true, table));
            }
        }
    }
    markers.write_dht(&huff_refs)?;

    markers.write_dri(restart_interval)?;

    let scan = ScanHeader {
        components: components
            .iter()
            .enumerate()
            .map(|(i, c)| ScanComponent {
                component_index: i,
                id: c.id,
                dc_table: c.dc_table,
                ac_table: c.ac_table,
            })
            .collect(),
        ss: 0,
        se: 63,
        ah: 0,
        al: 0,
    };
    markers.write_sos(&scan)?;

    // Entropy-coded data.
    let mut bits = crate::bitstream::BitWriter::new(markers.into_inner());
    {
        let mut entropy = EntropyEncoder::new(&mut bits);
        let interval = usize::from(restart_interval);
        let mut restart_num = 0u8;
        let mut last_mcu = 0usize;
        walk_scan_units(frame, |mcu, ci, bx, by| {
            if interval > 0 && mcu != last_mcu {
                last_mcu = mcu;
                if mcu % interval == 0 {
                    entropy.emit_restart(restart_num)?;
                    restart_num = restart_num.wrapping_add(1) & 0x07;
                }
            }
            entropy.encode_block(
                store.block(ci, bx, by),
                ci,
                dc_derived[usize::from(components[ci].dc_table)]
                    .as_ref()
                    .ok_or(Error::InvalidOperation("missing DC Huffman table"))?,
                ac_derived[usize::from(components[ci].ac_table)]
                    .as_ref()
                    .ok_or(Error::InvalidOperation("missing AC Huffman table"))?,
            )
        })?;
        entropy.flush()?;
    }

    let mut markers = MarkerWriter::new(bits.into_inner());
    markers.write_eoi()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A flat gray source for quick checks.
    struct FlatSource {
        width: u16,
        height: u16,
        value: i16,
    }

    impl BlockSource for FlatSource {
        fn width(&self) -> u16 {
            self.width
        }
        fn height(&self) -> u16 {
            self.height
        }
        fn read_block(&mut self, block: &mut DctBlock, _c: usize, _x: usize, _y: usize) {
            *block = [self.value; DCTSIZE2];
        }
    }

    #[test]
    fn test_encode_requires_components() {
        let mut source = FlatSource { width: 8, height: 8, value: 100 };
        let err = Encoder::new().encode(&mut source, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[test]
    fn test_encode_produces_well_formed_stream() {
        let mut source = FlatSource { width: 16, height: 16, value: 100 };
        let mut out = Vec::new();
        Encoder::gray(75).encode(&mut source, &mut out).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(&out[out.len() - 2..], &[0xFF, 0xD9]);
        // JFIF APP0 follows SOI.
        assert_eq!(&out[2..4], &[0xFF, 0xE0]);
    }

    #[test]
    fn test_optimized_stream_is_not_larger() {
        let mut source = FlatSource { width: 64, height: 64, value: 77 };
        let mut standard = Vec::new();
        Encoder::gray(75).encode(&mut source, &mut standard).unwrap();
        let mut optimized = Vec::new();
        Encoder::gray(75)
            .optimize_huffman(true)
            .encode(&mut source, &mut optimized)
            .unwrap();
        assert!(optimized.len() <= standard.len());
    }

    #[test]
    fn test_walk_scan_units_interleaved_order() {
        let frame = FrameHeader {
            process: CodingProcess::BaselineDct,
            precision: 8,
            height: 16,
            width: 16,
            components: vec![
                FrameComponent { id: 1, h: 2, v: 2, quant_table: 0 },
                FrameComponent { id: 2, h: 1, v: 1, quant_table: 1 },
            ],
        };
        let mut units = Vec::new();
        walk_scan_units(&frame, |mcu, ci, bx, by| {
            units.push((mcu, ci, bx, by));
            Ok(())
        })
        .unwrap();
        // One MCU: four luma blocks row-major, then one chroma block.
        assert_eq!(
            units,
            vec![
                (0, 0, 0, 0),
                (0, 0, 1, 0),
                (0, 0, 0, 1),
                (0, 0, 1, 1),
                (0, 1, 0, 0)
            ]
        );
    }
}
