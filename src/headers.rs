//! Marker segment payload parsers.
//!
//! Each parser sees one segment body (without the marker and length bytes)
//! and returns the structured form. Offsets inside `InvalidData` errors are
//! payload-relative here; the decoder orchestrator rewrites them to
//! absolute stream positions.
//!
//! Reference: ITU-T T.81 Annex B.

use crate::bitstream::StreamReader;
use crate::consts::{DCTSIZE2, NUM_TABLE_SLOTS};
use crate::error::{Error, Result};
use crate::huffman::HuffTable;
use crate::quant::QuantTable;
use crate::types::{CodingProcess, FrameComponent, FrameHeader, ScanComponent, ScanHeader};

/// Parse a Start-of-Frame payload (T.81 B.2.2).
pub fn parse_sof(marker: u8, payload: &[u8]) -> Result<FrameHeader> {
    let process = CodingProcess::from_marker(marker)?;
    let mut r = StreamReader::new(payload);
    let precision = r.read_u8()?;
    let height = r.read_u16()?;
    let width = r.read_u16()?;
    let num_components = r.read_u8()? as usize;
    if payload.len() != 6 + 3 * num_components {
        return Err(Error::invalid("frame header length mismatch"));
    }
    let mut components = Vec::with_capacity(num_components);
    for _ in 0..num_components {
        let id = r.read_u8()?;
        let sampling = r.read_u8()?;
        let quant_table = r.read_u8()?;
        components.push(FrameComponent {
            id,
            h: sampling >> 4,
            v: sampling & 0x0F,
            quant_table,
        });
    }
    let frame = FrameHeader {
        process,
        precision,
        height,
        width,
        components,
    };
    frame.validate()?;
    Ok(frame)
}

/// Parse a Start-of-Scan payload against its frame (T.81 B.2.3).
pub fn parse_sos(payload: &[u8], frame: &FrameHeader) -> Result<ScanHeader> {
    let mut r = StreamReader::new(payload);
    let num_components = r.read_u8()? as usize;
    if payload.len() != 4 + 2 * num_components {
        return Err(Error::invalid("scan header length mismatch"));
    }
    let mut components = Vec::with_capacity(num_components);
    for _ in 0..num_components {
        let id = r.read_u8()?;
        let tables = r.read_u8()?;
        let component_index = frame
            .component_index(id)
            .ok_or_else(|| Error::invalid("scan selects unknown component"))?;
        if components
            .iter()
            .any(|c: &ScanComponent| c.component_index == component_index)
        {
            return Err(Error::invalid("scan selects a component twice"));
        }
        components.push(ScanComponent {
            component_index,
            id,
            dc_table: tables >> 4,
            ac_table: tables & 0x0F,
        });
    }
    let ss = r.read_u8()?;
    let se = r.read_u8()?;
    let approx = r.read_u8()?;
    let scan = ScanHeader {
        components,
        ss,
        se,
        ah: approx >> 4,
        al: approx & 0x0F,
    };
    scan.validate(frame)?;
    Ok(scan)
}

/// Parse a DQT payload; one segment may define several tables
/// (T.81 B.2.4.1).
pub fn parse_dqt(payload: &[u8]) -> Result<Vec<(u8, QuantTable)>> {
    let mut r = StreamReader::new(payload);
    let mut tables = Vec::new();
    while r.remaining() > 0 {
        let pq_tq = r.read_u8()?;
        let precision = pq_tq >> 4;
        let slot = pq_tq & 0x0F;
        if precision > 1 {
            return Err(Error::invalid("unknown quantization element precision"));
        }
        if slot as usize >= NUM_TABLE_SLOTS {
            return Err(Error::invalid("quantization table slot out of range"));
        }
        let mut values = [0u16; DCTSIZE2];
        for v in values.iter_mut() {
            *v = if precision == 1 {
                r.read_u16()?
            } else {
                u16::from(r.read_u8()?)
            };
        }
        tables.push((slot, QuantTable::from_zigzag(precision, values)));
    }
    if tables.is_empty() {
        return Err(Error::invalid("empty quantization table segment"));
    }
    Ok(tables)
}

/// Parse a DHT payload; one segment may define several tables
/// (T.81 B.2.4.2). Returns `(slot, is_ac, table)` triples.
pub fn parse_dht(payload: &[u8]) -> Result<Vec<(u8, bool, HuffTable)>> {
    let mut r = StreamReader::new(payload);
    let mut tables = Vec::new();
    while r.remaining() > 0 {
        let tc_th = r.read_u8()?;
        let class = tc_th >> 4;
        let slot = tc_th & 0x0F;
        if class > 1 {
            return Err(Error::invalid("unknown Huffman table class"));
        }
        if slot as usize >= NUM_TABLE_SLOTS {
            return Err(Error::invalid("Huffman table slot out of range"));
        }
        let mut bits = [0u8; 17];
        let mut total = 0usize;
        for b in bits[1..].iter_mut() {
            *b = r.read_u8()?;
            total += *b as usize;
        }
        if total > 256 {
            return Err(Error::invalid("Huffman table defines too many codes"));
        }
        let huffval = r.read_bytes(total)?.to_vec();
        tables.push((slot, class == 1, HuffTable::new(bits, huffval)));
    }
    if tables.is_empty() {
        return Err(Error::invalid("empty Huffman table segment"));
    }
    Ok(tables)
}

/// One entry of a DAC segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacEntry {
    /// True for an AC conditioning entry.
    pub is_ac: bool,
    /// Table slot 0-3.
    pub slot: u8,
    /// Conditioning value: `(U << 4) | L` for DC, `Kx` for AC.
    pub value: u8,
}

/// Parse a DAC payload (T.81 B.2.4.3).
pub fn parse_dac(payload: &[u8]) -> Result<Vec<DacEntry>> {
    if payload.len() % 2 != 0 {
        return Err(Error::invalid("arithmetic conditioning length mismatch"));
    }
    let mut r = StreamReader::new(payload);
    let mut entries = Vec::new();
    while r.remaining() > 0 {
        let tc_tb = r.read_u8()?;
        let value = r.read_u8()?;
        let class = tc_tb >> 4;
        let slot = tc_tb & 0x0F;
        if class > 1 {
            return Err(Error::invalid("unknown arithmetic conditioning class"));
        }
        if slot as usize >= NUM_TABLE_SLOTS {
            return Err(Error::invalid("arithmetic conditioning slot out of range"));
        }
        if class == 0 {
            let lower = value & 0x0F;
            let upper = value >> 4;
            if lower > upper {
                return Err(Error::invalid("DC conditioning bounds out of order"));
            }
        } else if value == 0 || value > 63 {
            return Err(Error::invalid("AC conditioning Kx out of range"));
        }
        entries.push(DacEntry {
            is_ac: class == 1,
            slot,
            value,
        });
    }
    Ok(entries)
}

/// Parse a DRI payload (T.81 B.2.4.4).
pub fn parse_dri(payload: &[u8]) -> Result<u16> {
    if payload.len() != 2 {
        return Err(Error::invalid("restart interval length mismatch"));
    }
    StreamReader::new(payload).read_u16()
}
