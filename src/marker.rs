//! JPEG marker emission.
//!
//! Serializes the marker segments this codec writes:
//! - SOI / EOI
//! - APP0 (JFIF header) and raw APPn/COM passthrough for the optimizer
//! - DQT (8- and 16-bit precision, several tables per segment)
//! - SOFn (marker code supplied by the caller)
//! - DHT (several tables per segment)
//! - SOS, DRI, RSTn
//!
//! Reference: ITU-T T.81 Section B

use std::io::Write;

use crate::consts::{
    JPEG_APP0, JPEG_COM, JPEG_DHT, JPEG_DQT, JPEG_DRI, JPEG_EOI, JPEG_RST0, JPEG_SOI, JPEG_SOS,
};
use crate::error::{Error, Result};
use crate::huffman::HuffTable;
use crate::quant::QuantTable;
use crate::types::{FrameHeader, ScanHeader};

/// JFIF identifier
const JFIF_ID: [u8; 5] = *b"JFIF\0";

/// JFIF version 1.01
const JFIF_VERSION: [u8; 2] = [1, 1];

/// Marker writer for encoding and transcoding.
pub struct MarkerWriter<W: Write> {
    output: W,
    bytes_written: usize,
}

impl<W: Write> MarkerWriter<W> {
    /// Create a new marker writer.
    pub fn new(output: W) -> Self {
        Self {
            output,
            bytes_written: 0,
        }
    }

    fn emit_byte(&mut self, byte: u8) -> Result<()> {
        self.output.write_all(&[byte])?;
        self.bytes_written += 1;
        Ok(())
    }

    fn emit_u16(&mut self, value: u16) -> Result<()> {
        self.emit_byte((value >> 8) as u8)?;
        self.emit_byte(value as u8)
    }

    fn emit_marker(&mut self, code: u8) -> Result<()> {
        self.emit_byte(0xFF)?;
        self.emit_byte(code)
    }

    /// Write Start of Image.
    pub fn write_soi(&mut self) -> Result<()> {
        self.emit_marker(JPEG_SOI)
    }

    /// Write End of Image.
    pub fn write_eoi(&mut self) -> Result<()> {
        self.emit_marker(JPEG_EOI)
    }

    /// Write the JFIF APP0 preamble.
    ///
    /// # Arguments
    /// * `density_unit` - 0=no units, 1=dots/inch, 2=dots/cm
    /// * `x_density` / `y_density` - pixel density
    pub fn write_jfif_app0(
        &mut self,
        density_unit: u8,
        x_density: u16,
        y_density: u16,
    ) -> Result<()> {
        self.emit_marker(JPEG_APP0)?;
        self.emit_u16(16)?;
        for &b in &JFIF_ID {
            self.emit_byte(b)?;
        }
        self.emit_byte(JFIF_VERSION[0])?;
        self.emit_byte(JFIF_VERSION[1])?;
        self.emit_byte(density_unit)?;
        self.emit_u16(x_density)?;
        self.emit_u16(y_density)?;
        self.emit_byte(0)?; // no thumbnail
        self.emit_byte(0)
    }

    /// Write one DQT segment holding several quantization tables.
    ///
    /// Combining tables saves the per-segment marker overhead, so callers
    /// pass all tables they define at once.
    ///
    /// # Arguments
    /// * `tables` - (table slot 0-3, table) pairs
    pub fn write_dqt(&mut self, tables: &[(u8, &QuantTable)]) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }
        let mut total = 2u16;
        for (_, table) in tables {
            total += 1 + if table.precision == 1 { 128 } else { 64 };
        }
        self.emit_marker(JPEG_DQT)?;
        self.emit_u16(total)?;
        for (slot, table) in tables {
            // Pq in the high nibble, Tq in the low nibble.
            self.emit_byte((table.precision << 4) | (slot & 0x0F))?;
            for &value in table.values.iter() {
                if table.precision == 1 {
                    self.emit_u16(value)?;
                } else {
                    self.emit_byte(value as u8)?;
                }
            }
        }
        Ok(())
    }

    /// Write a Start of Frame segment.
    ///
    /// The marker code selects the coding process (SOF0 for the encoder;
    /// the optimizer re-emits its input's code).
    pub fn write_sof(&mut self, marker: u8, frame: &FrameHeader) -> Result<()> {
        let num_components = frame.components.len() as u16;
        self.emit_marker(marker)?;
        self.emit_u16(8 + 3 * num_components)?;
        self.emit_byte(frame.precision)?;
        self.emit_u16(frame.height)?;
        self.emit_u16(frame.width)?;
        self.emit_byte(num_components as u8)?;
        for comp in &frame.components {
            self.emit_byte(comp.id)?;
            self.emit_byte((comp.h << 4) | comp.v)?;
            self.emit_byte(comp.quant_table)?;
        }
        Ok(())
    }

    /// Write one DHT segment holding several Huffman tables.
    ///
    /// # Arguments
    /// * `tables` - (table slot 0-3, is_ac, table) triples
    pub fn write_dht(&mut self, tables: &[(u8, bool, &HuffTable)]) -> Result<()> {
        if tables.is_empty() {
            return Ok(());
        }
        let mut total = 2u16;
        for (_, _, table) in tables {
            total += 1 + 16 + table.huffval.len() as u16;
        }
        self.emit_marker(JPEG_DHT)?;
        self.emit_u16(total)?;
        for (slot, is_ac, table) in tables {
            // Tc in the high nibble, Th in the low nibble.
            let tc_th = if *is_ac { 0x10 } else { 0x00 } | (slot & 0x0F);
            self.emit_byte(tc_th)?;
            for i in 1..=16 {
                self.emit_byte(table.bits[i])?;
            }
            for &symbol in &table.huffval {
                self.emit_byte(symbol)?;
            }
        }
        Ok(())
    }

    /// Write a Start of Scan header.
    pub fn write_sos(&mut self, scan: &ScanHeader) -> Result<()> {
        self.emit_marker(JPEG_SOS)?;
        self.emit_u16(6 + 2 * scan.components.len() as u16)?;
        self.emit_byte(scan.components.len() as u8)?;
        for comp in &scan.components {
            self.emit_byte(comp.id)?;
            self.emit_byte((comp.dc_table << 4) | comp.ac_table)?;
        }
        self.emit_byte(scan.ss)?;
        self.emit_byte(scan.se)?;
        self.emit_byte((scan.ah << 4) | scan.al)
    }

    /// Write a Define Restart Interval segment; zero writes nothing.
    pub fn write_dri(&mut self, interval: u16) -> Result<()> {
        if interval == 0 {
            return Ok(());
        }
        self.emit_marker(JPEG_DRI)?;
        self.emit_u16(4)?;
        self.emit_u16(interval)
    }

    /// Write a restart marker RST0..RST7.
    pub fn write_rst(&mut self, restart_num: u8) -> Result<()> {
        self.emit_marker(JPEG_RST0 + (restart_num & 0x07))
    }

    /// Write an application segment verbatim (optimizer passthrough).
    ///
    /// # Arguments
    /// * `marker` - the original APPn or COM code
    /// * `payload` - segment body without the length field
    pub fn write_segment_raw(&mut self, marker: u8, payload: &[u8]) -> Result<()> {
        if payload.len() > 65533 {
            return Err(Error::BufferTooSmall);
        }
        self.emit_marker(marker)?;
        self.emit_u16(payload.len() as u16 + 2)?;
        for &b in payload {
            self.emit_byte(b)?;
        }
        Ok(())
    }

    /// Write a comment segment.
    pub fn write_com(&mut self, comment: &[u8]) -> Result<()> {
        self.write_segment_raw(JPEG_COM, &comment[..comment.len().min(65533)])
    }

    /// Total bytes written.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Consume the writer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CodingProcess, FrameComponent, ScanComponent};

    fn test_frame() -> FrameHeader {
        FrameHeader {
            process: CodingProcess::BaselineDct,
            precision: 8,
            height: 480,
            width: 640,
            components: vec![
                FrameComponent { id: 1, h: 2, v: 2, quant_table: 0 },
                FrameComponent { id: 2, h: 1, v: 1, quant_table: 1 },
                FrameComponent { id: 3, h: 1, v: 1, quant_table: 1 },
            ],
        }
    }

    #[test]
    fn test_soi_eoi() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_soi().unwrap();
        w.write_eoi().unwrap();
        assert_eq!(w.bytes_written(), 4);
        assert_eq!(w.into_inner(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }

    #[test]
    fn test_jfif_app0() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_jfif_app0(1, 72, 72).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xE0]);
        assert_eq!(&out[2..4], &[0x00, 16]);
        assert_eq!(&out[4..9], b"JFIF\0");
    }

    #[test]
    fn test_dqt_8bit() {
        let table = QuantTable::from_zigzag(0, [16u16; 64]);
        let mut w = MarkerWriter::new(Vec::new());
        w.write_dqt(&[(0, &table)]).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xDB]);
        assert_eq!(&out[2..4], &[0x00, 67]);
        assert_eq!(out[4], 0x00);
        assert_eq!(out.len(), 4 + 1 + 64);
    }

    #[test]
    fn test_dqt_16bit() {
        let mut values = [16u16; 64];
        values[0] = 300;
        let table = QuantTable::from_zigzag(1, values);
        let mut w = MarkerWriter::new(Vec::new());
        w.write_dqt(&[(1, &table)]).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[2..4], &[0x00, 131]);
        assert_eq!(out[4], 0x11);
        assert_eq!(&out[5..7], &[0x01, 0x2C]); // 300 big-endian
    }

    #[test]
    fn test_sof() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_sof(0xC0, &test_frame()).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xC0]);
        assert_eq!(out[4], 8);
        assert_eq!(u16::from(out[5]) << 8 | u16::from(out[6]), 480);
        assert_eq!(u16::from(out[7]) << 8 | u16::from(out[8]), 640);
        assert_eq!(out[9], 3);
        assert_eq!(out[11], 0x22); // luma sampling 2x2
    }

    #[test]
    fn test_dht() {
        let table = HuffTable::new(
            [0, 0, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            vec![0, 1, 2],
        );
        let mut w = MarkerWriter::new(Vec::new());
        w.write_dht(&[(0, false, &table), (1, true, &table)]).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xC4]);
        // 2 + 2 * (1 + 16 + 3)
        assert_eq!(&out[2..4], &[0x00, 42]);
        assert_eq!(out[4], 0x00);
        assert_eq!(out[4 + 20], 0x11);
    }

    #[test]
    fn test_sos() {
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
        let mut w = MarkerWriter::new(Vec::new());
        w.write_sos(&scan).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xDA]);
        assert_eq!(out[4], 3);
        assert_eq!(out[6], 0x00);
        assert_eq!(out[8], 0x11);
        assert_eq!(out[11], 0);
        assert_eq!(out[12], 63);
        assert_eq!(out[13], 0);
    }

    #[test]
    fn test_dri() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_dri(0).unwrap();
        assert_eq!(w.bytes_written(), 0);
        w.write_dri(100).unwrap();
        let out = w.into_inner();
        assert_eq!(&out[..2], &[0xFF, 0xDD]);
        assert_eq!(u16::from(out[4]) << 8 | u16::from(out[5]), 100);
    }

    #[test]
    fn test_rst() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_rst(3).unwrap();
        assert_eq!(w.into_inner(), vec![0xFF, 0xD3]);
    }

    #[test]
    fn test_raw_segment_passthrough() {
        let mut w = MarkerWriter::new(Vec::new());
        w.write_segment_raw(0xE1, &[1, 2, 3]).unwrap();
        assert_eq!(w.into_inner(), vec![0xFF, 0xE1, 0x00, 0x05, 1, 2, 3]);
    }
}
