//! Huffman table handling.
//!
//! - [`HuffTable`]: the canonical (BITS, HUFFVAL) wire form.
//! - [`DecodeTable`]: fast decoding form - an 8-bit lookahead table with a
//!   canonical `maxcode`/`valoffset` descent for longer codes.
//! - [`DerivedTable`]: encoding form - code and length per symbol.
//! - [`FrequencyCounter`]: 257-bin statistics and the optimal code length
//!   algorithm of T.81 K.2, with the 16-bit length clamp.
//!
//! The four Annex K reference tables are built lazily once per process and
//! shared as immutable handles.

use std::sync::OnceLock;

use crate::bitstream::BitReader;
use crate::consts::{
    STD_AC_CHROMINANCE_BITS, STD_AC_CHROMINANCE_VALUES, STD_AC_LUMINANCE_BITS,
    STD_AC_LUMINANCE_VALUES, STD_DC_CHROMINANCE_BITS, STD_DC_CHROMINANCE_VALUES,
    STD_DC_LUMINANCE_BITS, STD_DC_LUMINANCE_VALUES,
};
use crate::error::{Error, Result};

/// Number of bits covered by the fast decode lookup table.
const LOOKAHEAD: u32 = 8;

// ============================================================================
// Canonical wire form
// ============================================================================

/// A Huffman table in the canonical (BITS, HUFFVAL) form of T.81 B.2.4.2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HuffTable {
    /// `bits[k]` is the number of codes of length k; `bits[0]` is unused.
    pub bits: [u8; 17],
    /// Symbol values in order of increasing code length.
    pub huffval: Vec<u8>,
}

impl HuffTable {
    /// Create a table from code length counts and symbols.
    pub fn new(bits: [u8; 17], huffval: Vec<u8>) -> Self {
        Self { bits, huffval }
    }

    /// Total number of symbols.
    pub fn num_symbols(&self) -> usize {
        self.bits[1..].iter().map(|&b| b as usize).sum()
    }

    /// Generate the canonical code sizes and code values (T.81 C.2).
    ///
    /// Fails when the counts describe more codes than the code space holds
    /// or disagree with the symbol list.
    fn code_sizes_and_codes(&self) -> Result<Vec<(u8, u32)>> {
        if self.num_symbols() != self.huffval.len() || self.huffval.len() > 256 {
            return Err(Error::invalid("Huffman table symbol count mismatch"));
        }
        let mut out = Vec::with_capacity(self.huffval.len());
        let mut code = 0u32;
        for length in 1..=16u8 {
            for _ in 0..self.bits[length as usize] {
                if code >= (1 << length) {
                    return Err(Error::invalid("Huffman code space exceeded"));
                }
                out.push((length, code));
                code += 1;
            }
            code <<= 1;
        }
        Ok(out)
    }
}

// ============================================================================
// Decoding form
// ============================================================================

/// Huffman table derived for decoding.
pub struct DecodeTable {
    /// Fast path: indexed by the next LOOKAHEAD bits, yields
    /// (code length, symbol); length 0 marks a longer code.
    lookup: Box<[(u8, u8); 256]>,
    /// `maxcode[l]` is the numerically largest code of length l (-1 if none).
    maxcode: [i32; 17],
    /// `huffval[code + valoffset[l]]` recovers the symbol for length l.
    valoffset: [i32; 17],
    huffval: Vec<u8>,
}

impl DecodeTable {
    /// Derive the decoding form from the canonical table.
    pub fn new(table: &HuffTable) -> Result<DecodeTable> {
        let codes = table.code_sizes_and_codes()?;

        let mut maxcode = [-1i32; 17];
        let mut valoffset = [0i32; 17];
        let mut index = 0usize;
        for length in 1..=16usize {
            let count = table.bits[length] as usize;
            if count > 0 {
                let first_code = codes[index].1;
                valoffset[length] = index as i32 - first_code as i32;
                maxcode[length] = codes[index + count - 1].1 as i32;
                index += count;
            }
        }

        let mut lookup = Box::new([(0u8, 0u8); 256]);
        for (i, &(length, code)) in codes.iter().enumerate() {
            if u32::from(length) <= LOOKAHEAD {
                let shift = LOOKAHEAD - u32::from(length);
                let base = (code << shift) as usize;
                for suffix in 0..(1usize << shift) {
                    lookup[base + suffix] = (length, table.huffval[i]);
                }
            }
        }

        Ok(DecodeTable {
            lookup,
            maxcode,
            valoffset,
            huffval: table.huffval.clone(),
        })
    }

    /// Decode one symbol from the bit stream.
    #[inline]
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        let peek = reader.peek_bits(LOOKAHEAD) as usize;
        let (length, symbol) = self.lookup[peek];
        if length != 0 {
            reader.advance_bits(u32::from(length));
            return Ok(symbol);
        }
        // Longer than LOOKAHEAD bits: canonical bit-by-bit descent.
        let mut code = reader.read_bits(LOOKAHEAD) as i32;
        let mut length = LOOKAHEAD as usize;
        while code > self.maxcode[length] {
            length += 1;
            if length > 16 {
                return Err(Error::invalid("corrupt Huffman code"));
            }
            code = (code << 1) | reader.read_bit() as i32;
        }
        let index = (code + self.valoffset[length]) as usize;
        self.huffval
            .get(index)
            .copied()
            .ok_or_else(|| Error::invalid("corrupt Huffman code"))
    }
}

// ============================================================================
// Encoding form
// ============================================================================

/// Huffman table derived for encoding: code and size per symbol.
#[derive(Clone)]
pub struct DerivedTable {
    ehufco: Box<[u32; 256]>,
    ehufsi: Box<[u8; 256]>,
}

impl DerivedTable {
    /// Derive the encoding form from the canonical table.
    pub fn new(table: &HuffTable) -> Result<DerivedTable> {
        let codes = table.code_sizes_and_codes()?;
        let mut ehufco = Box::new([0u32; 256]);
        let mut ehufsi = Box::new([0u8; 256]);
        for (i, &(length, code)) in codes.iter().enumerate() {
            let symbol = table.huffval[i] as usize;
            if ehufsi[symbol] != 0 {
                return Err(Error::invalid("duplicate Huffman symbol"));
            }
            ehufco[symbol] = code;
            ehufsi[symbol] = length;
        }
        Ok(DerivedTable { ehufco, ehufsi })
    }

    /// Code and bit length for a symbol. A zero length means the symbol has
    /// no code in this table.
    #[inline]
    pub fn get_code(&self, symbol: u8) -> (u32, u32) {
        (
            self.ehufco[symbol as usize],
            u32::from(self.ehufsi[symbol as usize]),
        )
    }
}

// ============================================================================
// Optimal table generation
// ============================================================================

/// Symbol frequency accumulator for the optimal-Huffman pass.
///
/// Bin 256 is a sentinel given a count of one so that a real symbol is
/// never assigned the all-ones code of maximum length (T.81 K.2).
#[derive(Clone)]
pub struct FrequencyCounter {
    counts: Box<[u32; 257]>,
}

impl Default for FrequencyCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self {
            counts: Box::new([0u32; 257]),
        }
    }

    /// Record one occurrence of a symbol.
    #[inline]
    pub fn count(&mut self, symbol: u8) {
        self.counts[symbol as usize] += 1;
    }

    /// True when no symbol has been recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&c| c == 0)
    }

    /// Build the optimal canonical table for the recorded frequencies
    /// (T.81 K.2: least-frequency merge, 16-bit length clamp, canonical
    /// assignment by code size then symbol value).
    pub fn build_table(&self) -> Result<HuffTable> {
        let mut freq = [0i64; 257];
        for (i, &c) in self.counts.iter().enumerate() {
            freq[i] = i64::from(c);
        }
        // Sentinel: guarantees the longest code is never all ones.
        freq[256] = 1;

        let mut codesize = [0u32; 257];
        let mut others = [-1i32; 257];

        loop {
            // The two least-frequent nonzero entries; ties prefer the
            // larger symbol so the merge order is deterministic.
            let mut c1: i32 = -1;
            let mut v = i64::MAX;
            for (i, &f) in freq.iter().enumerate() {
                if f != 0 && f <= v {
                    v = f;
                    c1 = i as i32;
                }
            }
            let mut c2: i32 = -1;
            let mut v = i64::MAX;
            for (i, &f) in freq.iter().enumerate() {
                if f != 0 && f <= v && i as i32 != c1 {
                    v = f;
                    c2 = i as i32;
                }
            }
            if c2 < 0 {
                break;
            }

            freq[c1 as usize] += freq[c2 as usize];
            freq[c2 as usize] = 0;

            codesize[c1 as usize] += 1;
            let mut c1 = c1 as usize;
            while others[c1] >= 0 {
                c1 = others[c1] as usize;
                codesize[c1] += 1;
            }
            others[c1] = c2;

            codesize[c2 as usize] += 1;
            let mut c2 = c2 as usize;
            while others[c2] >= 0 {
                c2 = others[c2] as usize;
                codesize[c2] += 1;
            }
        }

        let mut bits = [0u8; 33];
        for &size in codesize.iter() {
            if size > 0 {
                if size > 32 {
                    return Err(Error::invalid("Huffman code length overflow"));
                }
                bits[size as usize] += 1;
            }
        }

        // Clamp lengths to 16 (T.81 Figure K.3): push pairs of overlong
        // codes up into the first shorter length that has a code to split.
        for length in (17..=32usize).rev() {
            while bits[length] > 0 {
                let mut shorter = length - 2;
                while bits[shorter] == 0 {
                    shorter -= 1;
                }
                bits[length] -= 2;
                bits[length - 1] += 1;
                bits[shorter + 1] += 2;
                bits[shorter] -= 1;
            }
        }

        // Drop the sentinel's code from the deepest used length.
        let mut length = 16;
        while bits[length] == 0 {
            length -= 1;
        }
        bits[length] -= 1;

        let mut out_bits = [0u8; 17];
        out_bits[1..17].copy_from_slice(&bits[1..17]);

        let mut huffval = Vec::new();
        for size in 1..=32u32 {
            for symbol in 0u16..=255 {
                if codesize[symbol as usize] == size {
                    huffval.push(symbol as u8);
                }
            }
        }

        Ok(HuffTable::new(out_bits, huffval))
    }
}

// ============================================================================
// Standard tables (Annex K.3)
// ============================================================================

/// The standard DC luminance table.
pub fn std_dc_luminance() -> &'static HuffTable {
    static TABLE: OnceLock<HuffTable> = OnceLock::new();
    TABLE.get_or_init(|| HuffTable::new(STD_DC_LUMINANCE_BITS, STD_DC_LUMINANCE_VALUES.to_vec()))
}

/// The standard DC chrominance table.
pub fn std_dc_chrominance() -> &'static HuffTable {
    static TABLE: OnceLock<HuffTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        HuffTable::new(STD_DC_CHROMINANCE_BITS, STD_DC_CHROMINANCE_VALUES.to_vec())
    })
}

/// The standard AC luminance table.
pub fn std_ac_luminance() -> &'static HuffTable {
    static TABLE: OnceLock<HuffTable> = OnceLock::new();
    TABLE.get_or_init(|| HuffTable::new(STD_AC_LUMINANCE_BITS, STD_AC_LUMINANCE_VALUES.to_vec()))
}

/// The standard AC chrominance table.
pub fn std_ac_chrominance() -> &'static HuffTable {
    static TABLE: OnceLock<HuffTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        HuffTable::new(STD_AC_CHROMINANCE_BITS, STD_AC_CHROMINANCE_VALUES.to_vec())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::BitWriter;

    fn decode_all(table: &HuffTable, bytes: &[u8], n: usize) -> Vec<u8> {
        let decode = DecodeTable::new(table).unwrap();
        let stream = crate::bitstream::StreamReader::new(bytes);
        let mut reader = stream.bit_reader();
        (0..n).map(|_| decode.decode(&mut reader).unwrap()).collect()
    }

    #[test]
    fn test_std_dc_luminance_codes() {
        let derived = DerivedTable::new(std_dc_luminance()).unwrap();
        // T.81 Table K.3: category 0 -> 00 (2 bits), category 1 -> 010.
        assert_eq!(derived.get_code(0), (0b00, 2));
        assert_eq!(derived.get_code(1), (0b010, 3));
        assert_eq!(derived.get_code(11), (0b1_1111_1110, 9));
    }

    #[test]
    fn test_std_ac_luminance_codes() {
        let derived = DerivedTable::new(std_ac_luminance()).unwrap();
        // EOB -> 1010 (4 bits), ZRL -> 11111111001 (11 bits).
        assert_eq!(derived.get_code(0x00), (0b1010, 4));
        assert_eq!(derived.get_code(0xF0), (0b111_1111_1001, 11));
        assert_eq!(derived.get_code(0x01), (0b00, 2));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let table = std_ac_luminance();
        let derived = DerivedTable::new(table).unwrap();
        let symbols: Vec<u8> = STD_AC_LUMINANCE_VALUES.to_vec();

        let mut writer = BitWriter::new(Vec::new());
        for &sym in &symbols {
            let (code, size) = derived.get_code(sym);
            writer.put_bits(code, size).unwrap();
        }
        writer.flush().unwrap();
        let bytes = writer.into_inner();

        assert_eq!(decode_all(table, &bytes, symbols.len()), symbols);
    }

    #[test]
    fn test_long_code_fallback() {
        // A table whose deepest codes exceed the 8-bit lookahead.
        let mut counter = FrequencyCounter::new();
        let mut weight = 1u32;
        for sym in 0..14u8 {
            for _ in 0..weight {
                counter.count(sym);
            }
            weight = weight.saturating_mul(2);
        }
        let table = counter.build_table().unwrap();
        assert!(table.bits[9..].iter().any(|&b| b > 0));

        let derived = DerivedTable::new(&table).unwrap();
        let mut writer = BitWriter::new(Vec::new());
        let symbols: Vec<u8> = (0..14).collect();
        for &sym in &symbols {
            let (code, size) = derived.get_code(sym);
            assert!(size > 0);
            writer.put_bits(code, size).unwrap();
        }
        writer.flush().unwrap();
        let bytes = writer.into_inner();
        assert_eq!(decode_all(&table, &bytes, symbols.len()), symbols);
    }

    #[test]
    fn test_optimal_table_lengths_clamped() {
        // Fibonacci-ish frequencies force lengths past 16 before the clamp.
        let mut counter = FrequencyCounter::new();
        let (mut a, mut b) = (1u32, 1u32);
        for sym in 0..30u8 {
            for _ in 0..a {
                counter.count(sym);
            }
            let next = a.saturating_add(b);
            a = b;
            b = next;
        }
        let table = counter.build_table().unwrap();
        assert_eq!(table.num_symbols(), 30);
        assert!(table.bits[1..=16].iter().map(|&b| b as usize).sum::<usize>() == 30);
        // The canonical form must round-trip through derivation.
        DecodeTable::new(&table).unwrap();
        DerivedTable::new(&table).unwrap();
    }

    #[test]
    fn test_optimal_table_respects_frequencies() {
        let mut counter = FrequencyCounter::new();
        for _ in 0..1000 {
            counter.count(7);
        }
        for _ in 0..10 {
            counter.count(3);
        }
        counter.count(200);
        let table = counter.build_table().unwrap();
        let derived = DerivedTable::new(&table).unwrap();
        let (_, size_frequent) = derived.get_code(7);
        let (_, size_rare) = derived.get_code(200);
        assert!(size_frequent <= size_rare);
        assert!(size_frequent >= 1);
    }

    #[test]
    fn test_code_space_overflow_rejected() {
        // Three codes of length 1 cannot exist.
        let table = HuffTable::new(
            [0, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            vec![0, 1, 2],
        );
        assert!(DecodeTable::new(&table).is_err());
    }

    #[test]
    fn test_single_symbol_table() {
        let mut counter = FrequencyCounter::new();
        for _ in 0..5 {
            counter.count(42);
        }
        let table = counter.build_table().unwrap();
        assert_eq!(table.num_symbols(), 1);
        let derived = DerivedTable::new(&table).unwrap();
        let (code, size) = derived.get_code(42);
        // The sole real symbol gets a one-bit code; the sentinel absorbed
        // the all-ones branch.
        assert_eq!(size, 1);
        assert_eq!(code, 0);
    }
}
