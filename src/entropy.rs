//! Huffman entropy coding.
//!
//! Decode side: sequential (SOF0/SOF1) block decoding, the four progressive
//! (SOF2) scan kinds, and lossless (SOF3) sample decoding. Encode side:
//! baseline block encoding with differential DC and run-length AC coding,
//! plus the symbol frequency gathering used by the optimal-Huffman pass.
//!
//! Reference: ITU-T T.81 F.1.2 (encode), F.2.2 (decode), G.2 (progressive),
//! H.1-H.2 (lossless).

use crate::bitstream::{BitReader, BitWriter};
use crate::consts::{DCTSIZE2, JPEG_NATURAL_ORDER};
use crate::error::{Error, Result};
use crate::huffman::{DecodeTable, DerivedTable, FrequencyCounter};
use crate::types::{ceil_div, DctBlock, FrameHeader, ScanHeader};
use std::io::Write;

/// EOB (end of block): run 0, size 0.
const EOB: u8 = 0x00;

/// ZRL (zero run length): 16 zeros, continue.
const ZRL: u8 = 0xF0;

/// Sign-extend `bits` read for a magnitude category of `size` bits
/// (T.81 F.2.2.1 EXTEND).
#[inline]
pub fn extend(bits: u32, size: u32) -> i32 {
    if size == 0 {
        return 0;
    }
    if bits < (1 << (size - 1)) {
        bits as i32 - (1 << size) + 1
    } else {
        bits as i32
    }
}

/// Magnitude category of a value: the number of bits needed to represent
/// its absolute value (0 for zero).
#[inline]
pub fn jpeg_nbits(value: i32) -> u32 {
    if value == 0 {
        0
    } else {
        32 - value.unsigned_abs().leading_zeros()
    }
}

// ============================================================================
// Sequential decoding
// ============================================================================

/// Decode one sequential block into natural order (T.81 F.2.2).
///
/// The DC delta accumulates into `dc_pred`; the absolute DC lands in
/// `block[0]`.
pub fn decode_block_sequential(
    reader: &mut BitReader<'_>,
    block: &mut DctBlock,
    dc_table: &DecodeTable,
    ac_table: &DecodeTable,
    dc_pred: &mut i32,
) -> Result<()> {
    *block = [0i16; DCTSIZE2];

    let t = u32::from(dc_table.decode(reader)?);
    if t > 15 {
        return Err(Error::invalid("DC magnitude category out of range"));
    }
    let diff = extend(reader.read_bits(t), t);
    *dc_pred += diff;
    block[0] = *dc_pred as i16;

    let mut k = 1usize;
    while k < DCTSIZE2 {
        let symbol = ac_table.decode(reader)?;
        let run = usize::from(symbol >> 4);
        let size = u32::from(symbol & 0x0F);
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break; // EOB
        }
        k += run;
        if k >= DCTSIZE2 {
            return Err(Error::invalid("AC run exceeds block"));
        }
        let value = extend(reader.read_bits(size), size);
        block[JPEG_NATURAL_ORDER[k]] = value as i16;
        k += 1;
    }
    Ok(())
}

// ============================================================================
// Progressive decoding
// ============================================================================

/// DC first scan (Ah = 0): decode the delta and store it shifted by Al
/// (T.81 G.2).
pub fn decode_block_dc_first(
    reader: &mut BitReader<'_>,
    block: &mut DctBlock,
    dc_table: &DecodeTable,
    dc_pred: &mut i32,
    al: u8,
) -> Result<()> {
    let t = u32::from(dc_table.decode(reader)?);
    if t > 15 {
        return Err(Error::invalid("DC magnitude category out of range"));
    }
    let diff = extend(reader.read_bits(t), t);
    *dc_pred += diff;
    block[0] = (*dc_pred << al) as i16;
    Ok(())
}

/// DC refinement scan (Ah > 0): one more bit of precision per block.
pub fn decode_block_dc_refine(
    reader: &mut BitReader<'_>,
    block: &mut DctBlock,
    al: u8,
) -> Result<()> {
    if reader.read_bit() != 0 {
        block[0] |= 1 << al;
    }
    Ok(())
}

/// AC first scan (Ah = 0) over the band `[ss, se]` at bit position Al.
///
/// `eobrun` counts whole blocks in the current end-of-band run; when it is
/// nonzero this block stays untouched.
pub fn decode_block_ac_first(
    reader: &mut BitReader<'_>,
    block: &mut DctBlock,
    ac_table: &DecodeTable,
    ss: u8,
    se: u8,
    al: u8,
    eobrun: &mut u32,
) -> Result<()> {
    if *eobrun > 0 {
        *eobrun -= 1;
        return Ok(());
    }
    let mut k = usize::from(ss);
    while k <= usize::from(se) {
        let symbol = ac_table.decode(reader)?;
        let run = u32::from(symbol >> 4);
        let size = u32::from(symbol & 0x0F);
        if size == 0 {
            if run != 15 {
                // EOBn: run of 2^run blocks plus extension bits, counting
                // this block.
                *eobrun = (1 << run) - 1;
                if run > 0 {
                    *eobrun += reader.read_bits(run);
                }
                break;
            }
            k += 16; // ZRL
            continue;
        }
        k += run as usize;
        if k > usize::from(se) {
            return Err(Error::invalid("AC run exceeds spectral band"));
        }
        let value = extend(reader.read_bits(size), size);
        block[JPEG_NATURAL_ORDER[k]] = (value << al) as i16;
        k += 1;
    }
    Ok(())
}

/// AC refinement scan (Ah > 0) over the band `[ss, se]` at bit position Al
/// (T.81 G.2.3: correction bits interleave with newly nonzero
/// coefficients while traversing the zero history).
pub fn decode_block_ac_refine(
    reader: &mut BitReader<'_>,
    block: &mut DctBlock,
    ac_table: &DecodeTable,
    ss: u8,
    se: u8,
    al: u8,
    eobrun: &mut u32,
) -> Result<()> {
    let p1 = 1i16 << al;
    let m1 = -1i16 << al;
    let se = usize::from(se);
    let mut k = usize::from(ss);

    if *eobrun == 0 {
        while k <= se {
            let symbol = ac_table.decode(reader)?;
            let mut run = u32::from(symbol >> 4);
            let size = symbol & 0x0F;
            let mut new_value = 0i16;
            if size == 0 {
                if run != 15 {
                    // EOBn: the rest of this block only carries correction
                    // bits, handled below.
                    *eobrun = 1 << run;
                    if run > 0 {
                        *eobrun += reader.read_bits(run);
                    }
                    break;
                }
                // ZRL: pass 16 zero-history positions.
            } else {
                if size != 1 {
                    return Err(Error::invalid("bad AC refinement magnitude"));
                }
                new_value = if reader.read_bit() != 0 { p1 } else { m1 };
            }

            // Advance over `run` zero-history positions, refining every
            // nonzero coefficient passed on the way.
            while k <= se {
                let coef = &mut block[JPEG_NATURAL_ORDER[k]];
                if *coef != 0 {
                    if reader.read_bit() != 0 && (*coef & p1) == 0 {
                        *coef += if *coef >= 0 { p1 } else { m1 };
                    }
                } else {
                    if run == 0 {
                        break;
                    }
                    run -= 1;
                }
                k += 1;
            }

            if new_value != 0 {
                if k > se {
                    return Err(Error::invalid("AC refinement run exceeds band"));
                }
                block[JPEG_NATURAL_ORDER[k]] = new_value;
            }
            k += 1;
        }
    }

    if *eobrun > 0 {
        // Correction bits for the remainder of the band.
        while k <= se {
            let coef = &mut block[JPEG_NATURAL_ORDER[k]];
            if *coef != 0 && reader.read_bit() != 0 && (*coef & p1) == 0 {
                *coef += if *coef >= 0 { p1 } else { m1 };
            }
            k += 1;
        }
        *eobrun -= 1;
    }
    Ok(())
}

// ============================================================================
// Sequential encoding
// ============================================================================

/// Entropy encoder state for one sequential scan.
pub struct EntropyEncoder<'a, W: Write> {
    writer: &'a mut BitWriter<W>,
    last_dc: [i32; crate::consts::MAX_COMPONENTS],
}

impl<'a, W: Write> EntropyEncoder<'a, W> {
    /// Create an encoder writing through `writer`.
    pub fn new(writer: &'a mut BitWriter<W>) -> Self {
        Self {
            writer,
            last_dc: [0; crate::consts::MAX_COMPONENTS],
        }
    }

    /// Reset DC predictions (start of scan, restart boundaries).
    pub fn reset_dc(&mut self) {
        self.last_dc = [0; crate::consts::MAX_COMPONENTS];
    }

    /// Flush the bit buffer, write RSTn, and reset predictions.
    pub fn emit_restart(&mut self, restart_num: u8) -> Result<()> {
        self.writer.flush()?;
        self.writer
            .write_bytes(&[0xFF, 0xD0 + (restart_num & 0x07)])?;
        self.reset_dc();
        Ok(())
    }

    /// Encode one block (natural order) for `component`.
    pub fn encode_block(
        &mut self,
        block: &DctBlock,
        component: usize,
        dc_table: &DerivedTable,
        ac_table: &DerivedTable,
    ) -> Result<()> {
        // DC: category code, then the value bits (ones-complement when
        // negative).
        let dc = i32::from(block[0]);
        let diff = dc - self.last_dc[component];
        self.last_dc[component] = dc;

        let nbits = jpeg_nbits(diff);
        let value = if diff < 0 {
            (diff - 1) as u32 & ((1u32 << nbits) - 1)
        } else {
            diff as u32
        };
        let (code, size) = dc_table.get_code(nbits as u8);
        if size == 0 {
            return Err(Error::InvalidOperation("DC symbol missing from table"));
        }
        self.writer.put_bits(code, size)?;
        if nbits > 0 {
            self.writer.put_bits(value, nbits)?;
        }

        // AC: run/size symbols in zig-zag order.
        let mut run = 0u32;
        for &n in JPEG_NATURAL_ORDER[1..].iter() {
            let coef = i32::from(block[n]);
            if coef == 0 {
                run += 1;
                continue;
            }
            while run >= 16 {
                let (code, size) = ac_table.get_code(ZRL);
                if size == 0 {
                    return Err(Error::InvalidOperation("ZRL symbol missing from table"));
                }
                self.writer.put_bits(code, size)?;
                run -= 16;
            }
            let nbits = jpeg_nbits(coef);
            let value = if coef < 0 {
                (coef - 1) as u32 & ((1u32 << nbits) - 1)
            } else {
                coef as u32
            };
            let symbol = ((run as u8) << 4) | nbits as u8;
            let (code, size) = ac_table.get_code(symbol);
            if size == 0 {
                return Err(Error::InvalidOperation("AC symbol missing from table"));
            }
            self.writer.put_bits(code, size)?;
            self.writer.put_bits(value, nbits)?;
            run = 0;
        }
        if run > 0 {
            let (code, size) = ac_table.get_code(EOB);
            if size == 0 {
                return Err(Error::InvalidOperation("EOB symbol missing from table"));
            }
            self.writer.put_bits(code, size)?;
        }
        Ok(())
    }

    /// Flush remaining bits to the byte boundary.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }
}

/// Symbol frequency gathering for the optimal-Huffman first pass. Walks
/// blocks exactly like [`EntropyEncoder::encode_block`] but only counts.
pub struct SymbolCounter {
    last_dc: [i32; crate::consts::MAX_COMPONENTS],
}

impl Default for SymbolCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolCounter {
    /// Create a counter with zeroed DC predictions.
    pub fn new() -> Self {
        Self {
            last_dc: [0; crate::consts::MAX_COMPONENTS],
        }
    }

    /// Reset DC predictions (start of scan, restart boundaries).
    pub fn reset_dc(&mut self) {
        self.last_dc = [0; crate::consts::MAX_COMPONENTS];
    }

    /// Count the symbols one block would emit.
    pub fn count_block(
        &mut self,
        block: &DctBlock,
        component: usize,
        dc_counter: &mut FrequencyCounter,
        ac_counter: &mut FrequencyCounter,
    ) {
        let dc = i32::from(block[0]);
        let diff = dc - self.last_dc[component];
        self.last_dc[component] = dc;
        dc_counter.count(jpeg_nbits(diff) as u8);

        let mut run = 0u32;
        for &n in JPEG_NATURAL_ORDER[1..].iter() {
            let coef = i32::from(block[n]);
            if coef == 0 {
                run += 1;
                continue;
            }
            while run >= 16 {
                ac_counter.count(ZRL);
                run -= 16;
            }
            ac_counter.count(((run as u8) << 4) | jpeg_nbits(coef) as u8);
            run = 0;
        }
        if run > 0 {
            ac_counter.count(EOB);
        }
    }
}

// ============================================================================
// Lossless decoding
// ============================================================================

/// One component plane of a lossless frame, sized to the MCU-padded grid.
pub struct LosslessPlane {
    /// Padded width in samples.
    pub width: usize,
    /// Padded height in samples.
    pub height: usize,
    /// Row-major samples.
    pub samples: Vec<u16>,
}

impl LosslessPlane {
    fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            samples: vec![0u16; width * height],
        }
    }

    #[inline]
    fn get(&self, x: usize, y: usize) -> i32 {
        i32::from(self.samples[y * self.width + x])
    }
}

/// Allocate the planes for a lossless frame.
pub fn lossless_planes(frame: &FrameHeader) -> Vec<LosslessPlane> {
    let h_max = frame.h_max() as usize;
    let v_max = frame.v_max() as usize;
    let mcus_x = ceil_div(frame.width as usize, h_max);
    let mcus_y = ceil_div(frame.height as usize, v_max);
    frame
        .components
        .iter()
        .map(|c| LosslessPlane::new(mcus_x * c.h as usize, mcus_y * c.v as usize))
        .collect()
}

/// Predict one sample (T.81 H.1.2.1).
///
/// `predictor` is the scan's Ss field; the first line and first column
/// fall back to the reduced predictors, and the very first sample (and the
/// first sample after a restart) uses the precision midpoint.
fn predict(
    plane: &LosslessPlane,
    x: usize,
    y: usize,
    predictor: u8,
    default_prediction: i32,
    use_default: bool,
) -> i32 {
    if use_default {
        return default_prediction;
    }
    if y == 0 {
        if x == 0 {
            return default_prediction;
        }
        return plane.get(x - 1, y); // first line: left neighbor
    }
    if x == 0 {
        return plane.get(x, y - 1); // first column: upper neighbor
    }
    let ra = plane.get(x - 1, y);
    let rb = plane.get(x, y - 1);
    let rc = plane.get(x - 1, y - 1);
    match predictor {
        1 => ra,
        2 => rb,
        3 => rc,
        4 => ra + rb - rc,
        5 => ra + ((rb - rc) >> 1),
        6 => rb + ((ra - rc) >> 1),
        7 => (ra + rb) >> 1,
        _ => default_prediction,
    }
}

fn decode_lossless_diff(
    reader: &mut BitReader<'_>,
    table: &DecodeTable,
) -> Result<i32> {
    let s = u32::from(table.decode(reader)?);
    match s {
        0 => Ok(0),
        16 => Ok(32768),
        1..=15 => Ok(extend(reader.read_bits(s), s)),
        _ => Err(Error::invalid("lossless magnitude category out of range")),
    }
}

/// Decode an entire lossless scan into the component planes
/// (T.81 H.2: MCUs of H x V samples per component; modulo-65536 sums).
pub fn decode_lossless_scan(
    reader: &mut BitReader<'_>,
    frame: &FrameHeader,
    scan: &ScanHeader,
    tables: &[Option<DecodeTable>],
    restart_interval: u16,
    planes: &mut [LosslessPlane],
) -> Result<()> {
    let predictor = scan.ss;
    let point_transform = scan.al;
    let default_prediction = 1i32 << (frame.precision - point_transform - 1);

    // Table handles in scan order.
    let mut scan_tables = Vec::with_capacity(scan.components.len());
    for sc in &scan.components {
        let table = tables[usize::from(sc.dc_table)]
            .as_ref()
            .ok_or_else(|| Error::invalid("scan references undefined Huffman table"))?;
        scan_tables.push(table);
    }

    // Per-component sample iteration shape.
    let interleaved = scan.is_interleaved();
    let shapes: Vec<(usize, usize)> = scan
        .components
        .iter()
        .map(|sc| {
            let c = &frame.components[sc.component_index];
            if interleaved {
                (c.h as usize, c.v as usize)
            } else {
                (1, 1)
            }
        })
        .collect();

    let (mcus_x, mcus_y) = if interleaved {
        (
            ceil_div(frame.width as usize, frame.h_max() as usize),
            ceil_div(frame.height as usize, frame.v_max() as usize),
        )
    } else {
        let plane = &planes[scan.components[0].component_index];
        (plane.width, plane.height)
    };

    let mut restart_countdown = restart_interval;
    let mut restart_num = 0u8;
    let mut use_default = vec![true; scan.components.len()];

    for mcu_y in 0..mcus_y {
        for mcu_x in 0..mcus_x {
            if restart_interval > 0 && restart_countdown == 0 {
                reader.align_byte();
                let marker = reader.read_restart()?;
                if marker == crate::consts::JPEG_EOI {
                    return Ok(());
                }
                if !crate::consts::is_rst_marker(marker)
                    || (marker - crate::consts::JPEG_RST0) != restart_num
                {
                    return Err(Error::invalid("restart marker out of sequence"));
                }
                restart_num = (restart_num + 1) & 0x07;
                restart_countdown = restart_interval;
                for flag in use_default.iter_mut() {
                    *flag = true;
                }
            }

            for (i, sc) in scan.components.iter().enumerate() {
                let (sh, sv) = shapes[i];
                let plane = &mut planes[sc.component_index];
                for dy in 0..sv {
                    for dx in 0..sh {
                        let x = mcu_x * sh + dx;
                        let y = mcu_y * sv + dy;
                        let diff = decode_lossless_diff(reader, scan_tables[i])?;
                        let prediction = predict(
                            plane,
                            x,
                            y,
                            predictor,
                            default_prediction,
                            use_default[i],
                        );
                        use_default[i] = false;
                        let value = (prediction + diff) & 0xFFFF;
                        plane.samples[y * plane.width + x] = value as u16;
                    }
                }
            }

            if restart_interval > 0 {
                restart_countdown -= 1;
            }
        }
    }
    Ok(())
}

/// Shift decoded lossless samples left by the point transform for output
/// (T.81 H.2.4).
pub fn apply_point_transform(planes: &mut [LosslessPlane], point_transform: u8) {
    if point_transform == 0 {
        return;
    }
    for plane in planes {
        for s in plane.samples.iter_mut() {
            *s <<= point_transform;
        }
    }
}
