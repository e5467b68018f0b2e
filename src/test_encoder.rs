//! Arithmetic encoder used by the test suites.
//!
//! The library proper only decodes arithmetic-coded scans; the suites need
//! streams to decode, so this module carries the encoding dual of
//! [`crate::arith`]: the QM-coder encode procedure with byte stuffing and
//! carry handling (T.81 D.1), plus scan-level encoders that select
//! statistics bins exactly the way the decoder does. Every `encode` call
//! here corresponds one-to-one with a `decode` call on the other side.
//!
//! Not part of the public API.

use crate::arith::{ArithConditioning, QE_TABLE};
use crate::consts::{JPEG_NATURAL_ORDER, MAX_COMPONENTS, NUM_TABLE_SLOTS};
use crate::types::DctBlock;

const FIXED_STATE: u8 = 113;

/// The binary arithmetic encoder registers (T.81 D.1).
pub struct ArithEncoder {
    c: u32,
    a: u32,
    /// Stacked 0xFF bytes that may still be hit by a carry.
    sc: u32,
    /// Deferred zero bytes (trailing zeros are never written).
    zc: u32,
    ct: i32,
    /// Pending output byte, -1 when empty.
    buffer: i32,
    out: Vec<u8>,
}

impl Default for ArithEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArithEncoder {
    /// INITENC.
    pub fn new() -> Self {
        Self {
            c: 0,
            a: 0x10000,
            sc: 0,
            zc: 0,
            ct: 11,
            buffer: -1,
            out: Vec::new(),
        }
    }

    fn emit_pending_zeros(&mut self) {
        for _ in 0..self.zc {
            self.out.push(0x00);
        }
        self.zc = 0;
    }

    /// Encode one binary decision in the context `st`.
    pub fn encode(&mut self, st: &mut u8, bit: u32) {
        let sv = *st;
        let (qe, nmps, nlps, switch_mps) = QE_TABLE[usize::from(sv & 0x7F)];
        let qe = u32::from(qe);

        self.a -= qe;
        if bit != u32::from(sv >> 7) {
            // Less probable symbol: upper subinterval unless exchanged.
            if self.a >= qe {
                self.c += self.a;
                self.a = qe;
            }
            let flipped = if switch_mps == 1 { sv ^ 0x80 } else { sv };
            *st = (flipped & 0x80) | nlps;
        } else {
            // More probable symbol.
            if self.a >= 0x8000 {
                return; // no renormalization, no estimation change
            }
            if self.a < qe {
                self.c += self.a;
                self.a = qe;
            }
            *st = (sv & 0x80) | nmps;
        }

        // Renormalize and emit bytes (T.81 D.1.6), with carry resolution
        // over stacked 0xFF bytes.
        loop {
            self.a <<= 1;
            self.c <<= 1;
            self.ct -= 1;
            if self.ct == 0 {
                let temp = self.c >> 19;
                if temp > 0xFF {
                    // Carry: bump the pending byte, stacked 0xFFs roll to 0.
                    if self.buffer >= 0 {
                        self.emit_pending_zeros();
                        let byte = (self.buffer + 1) as u8;
                        self.out.push(byte);
                        if byte == 0xFF {
                            self.out.push(0x00);
                        }
                    }
                    self.zc += self.sc;
                    self.sc = 0;
                    self.buffer = (temp & 0xFF) as i32;
                } else if temp == 0xFF {
                    self.sc += 1;
                } else {
                    // The stack can no longer overflow; flush it.
                    if self.buffer == 0 {
                        self.zc += 1;
                    } else if self.buffer > 0 {
                        self.emit_pending_zeros();
                        self.out.push(self.buffer as u8);
                    }
                    if self.sc > 0 {
                        self.emit_pending_zeros();
                        for _ in 0..self.sc {
                            self.out.push(0xFF);
                            self.out.push(0x00);
                        }
                        self.sc = 0;
                    }
                    self.buffer = temp as i32;
                }
                self.c &= 0x7FFFF;
                self.ct += 8;
            }
            if self.a >= 0x8000 {
                break;
            }
        }
    }

    /// FLUSH: terminate the code string and return the segment bytes
    /// (T.81 D.1.8). Trailing zero bytes are suppressed.
    pub fn finish(mut self) -> Vec<u8> {
        let temp = (self.a.wrapping_sub(1).wrapping_add(self.c)) & 0xFFFF_0000;
        self.c = if temp < self.c { temp + 0x8000 } else { temp };
        self.c <<= self.ct;

        if self.c & 0xF800_0000 != 0 {
            // Final carry.
            if self.buffer >= 0 {
                self.emit_pending_zeros();
                let byte = (self.buffer + 1) as u8;
                self.out.push(byte);
                if byte == 0xFF {
                    self.out.push(0x00);
                }
            }
            self.zc += self.sc;
            self.sc = 0;
        } else {
            if self.buffer == 0 {
                self.zc += 1;
            } else if self.buffer > 0 {
                self.emit_pending_zeros();
                self.out.push(self.buffer as u8);
            }
            if self.sc > 0 {
                self.emit_pending_zeros();
                for _ in 0..self.sc {
                    self.out.push(0xFF);
                    self.out.push(0x00);
                }
            }
        }

        if self.c & 0x7FF_F800 != 0 {
            self.emit_pending_zeros();
            let byte = ((self.c >> 19) & 0xFF) as u8;
            self.out.push(byte);
            if byte == 0xFF {
                self.out.push(0x00);
            }
            if self.c & 0x7_F800 != 0 {
                let byte = ((self.c >> 11) & 0xFF) as u8;
                self.out.push(byte);
                if byte == 0xFF {
                    self.out.push(0x00);
                }
            }
        }
        self.out
    }
}

// ============================================================================
// Scan-level encoder
// ============================================================================

/// Arithmetic scan encoder mirroring [`crate::arith::ArithScanDecoder`]'s
/// statistics bins decision for decision.
pub struct ArithScanEncoder {
    core: ArithEncoder,
    dc_stats: Vec<[u8; 64]>,
    ac_stats: Vec<[u8; 256]>,
    fixed_bin: u8,
    dc_context: [usize; MAX_COMPONENTS],
    last_dc: [i32; MAX_COMPONENTS],
}

impl Default for ArithScanEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArithScanEncoder {
    /// Fresh encoder with zeroed statistics.
    pub fn new() -> Self {
        Self {
            core: ArithEncoder::new(),
            dc_stats: vec![[0; 64]; NUM_TABLE_SLOTS],
            ac_stats: vec![[0; 256]; NUM_TABLE_SLOTS],
            fixed_bin: FIXED_STATE,
            dc_context: [0; MAX_COMPONENTS],
            last_dc: [0; MAX_COMPONENTS],
        }
    }

    fn encode_dc_bin(&mut self, table: usize, bin: usize, bit: u32) {
        self.core.encode(&mut self.dc_stats[table][bin], bit);
    }

    fn encode_ac_bin(&mut self, table: usize, bin: usize, bit: u32) {
        self.core.encode(&mut self.ac_stats[table][bin], bit);
    }

    fn encode_fixed(&mut self, bit: u32) {
        self.core.encode(&mut self.fixed_bin, bit);
    }

    /// Encode the DC value of one block (pre-shifted by the point
    /// transform for progressive first scans).
    pub fn encode_dc(
        &mut self,
        component: usize,
        table: usize,
        conditioning: &ArithConditioning,
        dc: i32,
    ) {
        let diff = dc - self.last_dc[component];
        self.last_dc[component] = dc;
        let base = self.dc_context[component];

        if diff == 0 {
            self.encode_dc_bin(table, base, 0);
            self.dc_context[component] = 0;
            return;
        }
        self.encode_dc_bin(table, base, 1);
        let sign: usize = if diff < 0 { 1 } else { 0 };
        self.encode_dc_bin(table, base + 1, sign as u32);

        let v = diff.unsigned_abs() - 1;
        let mut m = 0u32;
        let mut bin = base + 2 + sign;
        if v != 0 {
            self.encode_dc_bin(table, bin, 1);
            m = 1;
            bin = 20; // X1
            while (m << 1) <= v {
                self.encode_dc_bin(table, bin, 1);
                m <<= 1;
                bin += 1;
            }
            self.encode_dc_bin(table, bin, 0);
        } else {
            self.encode_dc_bin(table, bin, 0);
        }

        let low = (1i32 << conditioning.dc_l[table]) >> 1;
        let high = (1i32 << conditioning.dc_u[table]) >> 1;
        self.dc_context[component] = if (m as i32) < low {
            0
        } else if (m as i32) > high {
            12 + 4 * sign
        } else {
            4 + 4 * sign
        };

        bin += 14;
        let mut mask = m;
        loop {
            mask >>= 1;
            if mask == 0 {
                break;
            }
            self.encode_dc_bin(table, bin, u32::from(v & mask != 0));
        }
    }

    /// Encode the DC refinement bit of one block.
    pub fn encode_dc_refine(&mut self, dc: i32, al: u8) {
        self.encode_fixed((dc >> al) as u32 & 1);
    }

    /// Encode the AC band `[ss, se]` of one block at point transform `al`.
    pub fn encode_ac(
        &mut self,
        block: &DctBlock,
        table: usize,
        kx: u8,
        ss: u8,
        se: u8,
        al: u8,
    ) {
        let shifted = |k: usize| -> i32 {
            let coef = i32::from(block[JPEG_NATURAL_ORDER[k]]);
            if coef < 0 {
                -((-coef) >> al)
            } else {
                coef >> al
            }
        };

        // End-of-block index for this plane.
        let mut ke = usize::from(se);
        while ke >= usize::from(ss) && shifted(ke) == 0 {
            if ke == 0 {
                break;
            }
            ke -= 1;
        }
        let has_any = ke >= usize::from(ss) && shifted(ke) != 0;

        let mut k = usize::from(ss);
        if has_any {
            while k <= ke {
                let mut bin = 3 * (k - 1);
                self.encode_ac_bin(table, bin, 0); // not EOB yet
                while shifted(k) == 0 {
                    self.encode_ac_bin(table, bin + 1, 0);
                    k += 1;
                    bin += 3;
                }
                self.encode_ac_bin(table, bin + 1, 1);

                let value = shifted(k);
                self.encode_fixed(u32::from(value < 0));
                let v = value.unsigned_abs() - 1;

                let mut m = 0u32;
                let mut mag_bin = bin + 2;
                if v == 0 {
                    self.encode_ac_bin(table, mag_bin, 0);
                } else {
                    self.encode_ac_bin(table, mag_bin, 1);
                    if v == 1 {
                        self.encode_ac_bin(table, mag_bin, 0);
                        m = 1;
                    } else {
                        self.encode_ac_bin(table, mag_bin, 1);
                        m = 2;
                        mag_bin = if k <= usize::from(kx) { 189 } else { 217 };
                        while (m << 1) <= v {
                            self.encode_ac_bin(table, mag_bin, 1);
                            m <<= 1;
                            mag_bin += 1;
                        }
                        self.encode_ac_bin(table, mag_bin, 0);
                    }
                }

                mag_bin += 14;
                let mut mask = m;
                loop {
                    mask >>= 1;
                    if mask == 0 {
                        break;
                    }
                    self.encode_ac_bin(table, mag_bin, u32::from(v & mask != 0));
                }
                k += 1;
            }
        }
        if k <= usize::from(se) {
            self.encode_ac_bin(table, 3 * (k - 1), 1); // EOB
        }
    }

    /// Encode the AC refinement plane `[ss, se]` of one block; `ah` is the
    /// previous plane's point transform (`ah == al + 1`).
    pub fn encode_ac_refine(
        &mut self,
        block: &DctBlock,
        table: usize,
        ss: u8,
        se: u8,
        ah: u8,
        al: u8,
    ) {
        let magnitude = |k: usize, shift: u8| -> u32 {
            (i32::from(block[JPEG_NATURAL_ORDER[k]]).unsigned_abs()) >> shift
        };

        // Last position significant at this plane, and at the previous one.
        let mut ke = usize::from(se);
        while ke > 0 && magnitude(ke, al) == 0 {
            ke -= 1;
        }
        let mut kex = ke;
        while kex > 0 && magnitude(kex, ah) == 0 {
            kex -= 1;
        }
        let has_any = magnitude(ke, al) != 0;

        let mut k = usize::from(ss);
        if has_any {
            while k <= ke {
                if k > kex {
                    self.encode_ac_bin(table, 3 * (k - 1), 0); // not EOB
                }
                loop {
                    let bin = 3 * (k - 1);
                    let plane = magnitude(k, al);
                    if plane > 1 {
                        // Previously significant: correction bit.
                        self.encode_ac_bin(table, bin + 2, plane & 1);
                        break;
                    }
                    if plane == 1 {
                        // Newly significant: significance then sign.
                        self.encode_ac_bin(table, bin + 1, 1);
                        let negative = block[JPEG_NATURAL_ORDER[k]] < 0;
                        self.encode_fixed(u32::from(negative));
                        break;
                    }
                    self.encode_ac_bin(table, bin + 1, 0);
                    k += 1;
                }
                k += 1;
            }
        }
        if k <= usize::from(se) {
            self.encode_ac_bin(table, 3 * (k - 1), 1); // EOB
        }
    }

    /// Flush the current entropy segment into `out` and reset everything
    /// for the data following a restart marker.
    pub fn restart_segment(&mut self, out: &mut Vec<u8>, restart_num: u8) {
        let core = std::mem::replace(&mut self.core, ArithEncoder::new());
        out.extend_from_slice(&core.finish());
        out.extend_from_slice(&[0xFF, 0xD0 + (restart_num & 0x07)]);
        for area in self.dc_stats.iter_mut() {
            area.fill(0);
        }
        for area in self.ac_stats.iter_mut() {
            area.fill(0);
        }
        self.fixed_bin = FIXED_STATE;
        self.dc_context = [0; MAX_COMPONENTS];
        self.last_dc = [0; MAX_COMPONENTS];
    }

    /// Flush the final entropy segment into `out`.
    pub fn finish(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.core.finish());
    }
}
