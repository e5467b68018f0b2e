//! The scan driver.
//!
//! Walks the data units of one entropy-coded scan in MCU order, handles
//! restart markers, and hands each unit to an entropy coder. Interleaved
//! scans visit `H x V` adjacent units per component per MCU; a
//! single-component scan walks that component's own block grid
//! (T.81 A.2).
//!
//! The concrete coders glue the Huffman and arithmetic entropy decoders to
//! the driver; which one runs is picked by the frame's SOF marker.

use crate::arith::{ArithConditioning, ArithScanDecoder};
use crate::bitstream::BitReader;
use crate::consts::{is_rst_marker, JPEG_EOI, JPEG_RST0, MAX_COMPONENTS};
use crate::entropy;
use crate::error::{Error, Result};
use crate::huffman::DecodeTable;
use crate::types::{DctBlock, FrameHeader, ScanHeader};

/// Per-scan entropy coder state as seen by the driver.
pub trait ScanCoder {
    /// Reset state at a restart boundary. The restart marker itself has
    /// already been consumed; arithmetic coders re-prime their registers
    /// from the bytes that follow it.
    fn restart(&mut self, reader: &mut BitReader<'_>) -> Result<()>;
}

/// Run one scan, invoking `unit` for every data unit in MCU order with
/// `(coder, reader, scan_component, block_x, block_y)`.
///
/// Returns `true` when the scan was terminated by an EOI at a restart
/// boundary (T.81 E.2.4), in which case the caller must not expect more
/// markers.
pub fn run_scan<C: ScanCoder>(
    reader: &mut BitReader<'_>,
    frame: &FrameHeader,
    scan: &ScanHeader,
    restart_interval: u16,
    coder: &mut C,
    mut unit: impl FnMut(&mut C, &mut BitReader<'_>, usize, usize, usize) -> Result<()>,
) -> Result<bool> {
    // Iteration shape per scan component: units per MCU and the component
    // block grid position multipliers.
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
        (frame.mcus_per_line(), frame.mcu_rows())
    } else {
        frame.component_blocks(scan.components[0].component_index)
    };

    let mut restart_countdown = restart_interval;
    let mut restart_num = 0u8;

    for mcu_y in 0..mcus_y {
        for mcu_x in 0..mcus_x {
            if restart_interval > 0 && restart_countdown == 0 {
                reader.align_byte();
                let marker = reader.read_restart()?;
                if marker == JPEG_EOI {
                    return Ok(true);
                }
                if !is_rst_marker(marker) || (marker - JPEG_RST0) != restart_num {
                    return Err(Error::invalid("restart marker out of sequence"));
                }
                restart_num = (restart_num + 1) & 0x07;
                restart_countdown = restart_interval;
                coder.restart(reader)?;
            }

            for (sc, &(h, v)) in shapes.iter().enumerate() {
                for dv in 0..v {
                    for dh in 0..h {
                        let bx = mcu_x * h + dh;
                        let by = mcu_y * v + dv;
                        unit(coder, reader, sc, bx, by)?;
                    }
                }
            }

            if restart_interval > 0 {
                restart_countdown -= 1;
            }
        }
    }
    Ok(false)
}

// ============================================================================
// Huffman coders
// ============================================================================

/// Sequential Huffman scan state: the resolved tables and DC predictors.
pub struct HuffmanSequentialCoder<'t> {
    dc_tables: Vec<&'t DecodeTable>,
    ac_tables: Vec<&'t DecodeTable>,
    component_of: Vec<usize>,
    dc_pred: [i32; MAX_COMPONENTS],
}

impl<'t> HuffmanSequentialCoder<'t> {
    /// Resolve the scan's table selectors.
    pub fn new(
        scan: &ScanHeader,
        dc_tables: &'t [Option<DecodeTable>],
        ac_tables: &'t [Option<DecodeTable>],
    ) -> Result<Self> {
        let mut dc = Vec::new();
        let mut ac = Vec::new();
        let mut component_of = Vec::new();
        for sc in &scan.components {
            dc.push(
                dc_tables[usize::from(sc.dc_table)]
                    .as_ref()
                    .ok_or_else(|| Error::invalid("scan references undefined DC table"))?,
            );
            ac.push(
                ac_tables[usize::from(sc.ac_table)]
                    .as_ref()
                    .ok_or_else(|| Error::invalid("scan references undefined AC table"))?,
            );
            component_of.push(sc.component_index);
        }
        Ok(Self {
            dc_tables: dc,
            ac_tables: ac,
            component_of,
            dc_pred: [0; MAX_COMPONENTS],
        })
    }

    /// Decode one block for the scan component `sc`.
    pub fn decode_unit(
        &mut self,
        reader: &mut BitReader<'_>,
        sc: usize,
        block: &mut DctBlock,
    ) -> Result<()> {
        let comp = self.component_of[sc];
        entropy::decode_block_sequential(
            reader,
            block,
            self.dc_tables[sc],
            self.ac_tables[sc],
            &mut self.dc_pred[comp],
        )
    }
}

impl ScanCoder for HuffmanSequentialCoder<'_> {
    fn restart(&mut self, _reader: &mut BitReader<'_>) -> Result<()> {
        self.dc_pred = [0; MAX_COMPONENTS];
        Ok(())
    }
}

/// The four progressive Huffman scan kinds.
enum ProgressiveKind {
    DcFirst,
    DcRefine,
    AcFirst,
    AcRefine,
}

/// Progressive Huffman scan state: band parameters, DC predictors, and the
/// cross-block EOB run.
pub struct HuffmanProgressiveCoder<'t> {
    kind: ProgressiveKind,
    /// Resolved tables per scan component; holds the DC tables for a DC
    /// first scan, the AC tables for AC scans, and stays empty for DC
    /// refinement (which reads raw bits only).
    tables: Vec<&'t DecodeTable>,
    component_of: Vec<usize>,
    ss: u8,
    se: u8,
    al: u8,
    dc_pred: [i32; MAX_COMPONENTS],
    eobrun: u32,
}

impl<'t> HuffmanProgressiveCoder<'t> {
    /// Resolve the scan's tables; only the class the band needs is
    /// required to exist.
    pub fn new(
        scan: &ScanHeader,
        dc_tables: &'t [Option<DecodeTable>],
        ac_tables: &'t [Option<DecodeTable>],
    ) -> Result<Self> {
        let kind = match (scan.is_dc_scan(), scan.is_refinement()) {
            (true, false) => ProgressiveKind::DcFirst,
            (true, true) => ProgressiveKind::DcRefine,
            (false, false) => ProgressiveKind::AcFirst,
            (false, true) => ProgressiveKind::AcRefine,
        };
        let mut tables = Vec::new();
        let mut component_of = Vec::new();
        for sc in &scan.components {
            match kind {
                ProgressiveKind::DcFirst => {
                    tables.push(dc_tables[usize::from(sc.dc_table)].as_ref().ok_or_else(
                        || Error::invalid("scan references undefined DC table"),
                    )?);
                }
                ProgressiveKind::AcFirst | ProgressiveKind::AcRefine => {
                    tables.push(ac_tables[usize::from(sc.ac_table)].as_ref().ok_or_else(
                        || Error::invalid("scan references undefined AC table"),
                    )?);
                }
                ProgressiveKind::DcRefine => {}
            }
            component_of.push(sc.component_index);
        }
        Ok(Self {
            kind,
            tables,
            component_of,
            ss: scan.ss,
            se: scan.se,
            al: scan.al,
            dc_pred: [0; MAX_COMPONENTS],
            eobrun: 0,
        })
    }

    /// Decode one band update for the scan component `sc` into the cached
    /// block.
    pub fn decode_unit(
        &mut self,
        reader: &mut BitReader<'_>,
        sc: usize,
        block: &mut DctBlock,
    ) -> Result<()> {
        let comp = self.component_of[sc];
        match self.kind {
            ProgressiveKind::DcFirst => entropy::decode_block_dc_first(
                reader,
                block,
                self.tables[sc],
                &mut self.dc_pred[comp],
                self.al,
            ),
            ProgressiveKind::DcRefine => entropy::decode_block_dc_refine(reader, block, self.al),
            ProgressiveKind::AcFirst => entropy::decode_block_ac_first(
                reader,
                block,
                self.tables[sc],
                self.ss,
                self.se,
                self.al,
                &mut self.eobrun,
            ),
            ProgressiveKind::AcRefine => entropy::decode_block_ac_refine(
                reader,
                block,
                self.tables[sc],
                self.ss,
                self.se,
                self.al,
                &mut self.eobrun,
            ),
        }
    }
}

impl ScanCoder for HuffmanProgressiveCoder<'_> {
    fn restart(&mut self, _reader: &mut BitReader<'_>) -> Result<()> {
        self.dc_pred = [0; MAX_COMPONENTS];
        self.eobrun = 0;
        Ok(())
    }
}

// ============================================================================
// Arithmetic coders
// ============================================================================

/// Sequential arithmetic scan state.
pub struct ArithSequentialCoder {
    state: ArithScanDecoder,
    conditioning: ArithConditioning,
    dc_table_of: Vec<usize>,
    ac_table_of: Vec<usize>,
    component_of: Vec<usize>,
}

impl ArithSequentialCoder {
    /// Prime the decoder registers at the start of the entropy segment.
    pub fn new(
        reader: &mut BitReader<'_>,
        scan: &ScanHeader,
        conditioning: &ArithConditioning,
    ) -> Self {
        Self {
            state: ArithScanDecoder::new(reader),
            conditioning: conditioning.clone(),
            dc_table_of: scan.components.iter().map(|c| usize::from(c.dc_table)).collect(),
            ac_table_of: scan.components.iter().map(|c| usize::from(c.ac_table)).collect(),
            component_of: scan.components.iter().map(|c| c.component_index).collect(),
        }
    }

    /// Decode one block for the scan component `sc`.
    pub fn decode_unit(
        &mut self,
        reader: &mut BitReader<'_>,
        sc: usize,
        block: &mut DctBlock,
    ) -> Result<()> {
        *block = [0i16; crate::consts::DCTSIZE2];
        let dc = self.state.decode_dc(
            reader,
            self.component_of[sc],
            self.dc_table_of[sc],
            &self.conditioning,
            0,
        )?;
        block[0] = dc as i16;
        let ac_table = self.ac_table_of[sc];
        let kx = self.conditioning.ac_kx[ac_table];
        self.state.decode_ac(reader, block, ac_table, kx, 1, 63, 0)
    }
}

impl ScanCoder for ArithSequentialCoder {
    fn restart(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        self.state.restart(reader);
        Ok(())
    }
}

/// Progressive arithmetic scan state.
pub struct ArithProgressiveCoder {
    state: ArithScanDecoder,
    conditioning: ArithConditioning,
    kind: ProgressiveKind,
    dc_table_of: Vec<usize>,
    ac_table_of: Vec<usize>,
    component_of: Vec<usize>,
    ss: u8,
    se: u8,
    al: u8,
}

impl ArithProgressiveCoder {
    /// Prime the decoder registers at the start of the entropy segment.
    pub fn new(
        reader: &mut BitReader<'_>,
        scan: &ScanHeader,
        conditioning: &ArithConditioning,
    ) -> Self {
        let kind = match (scan.is_dc_scan(), scan.is_refinement()) {
            (true, false) => ProgressiveKind::DcFirst,
            (true, true) => ProgressiveKind::DcRefine,
            (false, false) => ProgressiveKind::AcFirst,
            (false, true) => ProgressiveKind::AcRefine,
        };
        Self {
            state: ArithScanDecoder::new(reader),
            conditioning: conditioning.clone(),
            kind,
            dc_table_of: scan.components.iter().map(|c| usize::from(c.dc_table)).collect(),
            ac_table_of: scan.components.iter().map(|c| usize::from(c.ac_table)).collect(),
            component_of: scan.components.iter().map(|c| c.component_index).collect(),
            ss: scan.ss,
            se: scan.se,
            al: scan.al,
        }
    }

    /// Decode one band update for the scan component `sc` into the cached
    /// block.
    pub fn decode_unit(
        &mut self,
        reader: &mut BitReader<'_>,
        sc: usize,
        block: &mut DctBlock,
    ) -> Result<()> {
        match self.kind {
            ProgressiveKind::DcFirst => {
                let dc = self.state.decode_dc(
                    reader,
                    self.component_of[sc],
                    self.dc_table_of[sc],
                    &self.conditioning,
                    self.al,
                )?;
                block[0] = dc as i16;
                Ok(())
            }
            ProgressiveKind::DcRefine => {
                self.state.decode_dc_refine(reader, block, self.al);
                Ok(())
            }
            ProgressiveKind::AcFirst => {
                let table = self.ac_table_of[sc];
                let kx = self.conditioning.ac_kx[table];
                self.state
                    .decode_ac(reader, block, table, kx, self.ss, self.se, self.al)
            }
            ProgressiveKind::AcRefine => {
                let table = self.ac_table_of[sc];
                self.state
                    .decode_ac_refine(reader, block, table, self.ss, self.se, self.al)
            }
        }
    }
}

impl ScanCoder for ArithProgressiveCoder {
    fn restart(&mut self, reader: &mut BitReader<'_>) -> Result<()> {
        self.state.restart(reader);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitstream::StreamReader;
    use crate::types::{CodingProcess, FrameComponent, ScanComponent};

    struct CountingCoder {
        restarts: usize,
    }

    impl ScanCoder for CountingCoder {
        fn restart(&mut self, _reader: &mut BitReader<'_>) -> Result<()> {
            self.restarts += 1;
            Ok(())
        }
    }

    fn frame_422() -> FrameHeader {
        FrameHeader {
            process: CodingProcess::BaselineDct,
            precision: 8,
            height: 16,
            width: 32,
            components: vec![
                FrameComponent { id: 1, h: 2, v: 1, quant_table: 0 },
                FrameComponent { id: 2, h: 1, v: 1, quant_table: 1 },
            ],
        }
    }

    fn scan_for(frame: &FrameHeader) -> ScanHeader {
        ScanHeader {
            components: frame
                .components
                .iter()
                .enumerate()
                .map(|(i, c)| ScanComponent {
                    component_index: i,
                    id: c.id,
                    dc_table: 0,
                    ac_table: 0,
                })
                .collect(),
            ss: 0,
            se: 63,
            ah: 0,
            al: 0,
        }
    }

    #[test]
    fn test_interleaved_unit_order() {
        let frame = frame_422();
        let scan = scan_for(&frame);
        let data = [0u8; 4];
        let stream = StreamReader::new(&data);
        let mut reader = stream.bit_reader();
        let mut coder = CountingCoder { restarts: 0 };
        let mut visits = Vec::new();
        run_scan(&mut reader, &frame, &scan, 0, &mut coder, |_, _, sc, bx, by| {
            visits.push((sc, bx, by));
            Ok(())
        })
        .unwrap();
        // 2 MCUs per line, 2 rows; luma contributes 2x1 units per MCU.
        assert_eq!(frame.mcus_per_line(), 2);
        assert_eq!(frame.mcu_rows(), 2);
        assert_eq!(visits.len(), 2 * 2 * 3);
        assert_eq!(
            &visits[..3],
            &[(0, 0, 0), (0, 1, 0), (1, 0, 0)],
        );
        assert_eq!(&visits[3..6], &[(0, 2, 0), (0, 3, 0), (1, 1, 0)]);
    }

    #[test]
    fn test_single_component_uses_own_grid() {
        let frame = frame_422();
        let mut scan = scan_for(&frame);
        scan.components.truncate(1);
        let data = [0u8; 4];
        let stream = StreamReader::new(&data);
        let mut reader = stream.bit_reader();
        let mut coder = CountingCoder { restarts: 0 };
        let mut visits = Vec::new();
        run_scan(&mut reader, &frame, &scan, 0, &mut coder, |_, _, sc, bx, by| {
            visits.push((sc, bx, by));
            Ok(())
        })
        .unwrap();
        // Luma alone: 32x16 -> 4x2 blocks, row-major.
        assert_eq!(visits.len(), 8);
        assert_eq!(visits[0], (0, 0, 0));
        assert_eq!(visits[4], (0, 0, 1));
    }

    #[test]
    fn test_restart_sequence_checked() {
        let frame = frame_422();
        let mut scan = scan_for(&frame);
        scan.components.truncate(1);
        // 8 data units with restart interval 4: one RST0 between halves,
        // but the stream carries RST1, which is out of sequence.
        let data = [0xFF, 0xD1, 0x00, 0x00];
        let stream = StreamReader::new(&data);
        let mut reader = stream.bit_reader();
        let mut coder = CountingCoder { restarts: 0 };
        let result = run_scan(&mut reader, &frame, &scan, 4, &mut coder, |_, _, _, _, _| Ok(()));
        assert!(matches!(result, Err(Error::InvalidData { .. })));
    }

    #[test]
    fn test_restart_consumed_and_coder_reset() {
        let frame = frame_422();
        let mut scan = scan_for(&frame);
        scan.components.truncate(1);
        let data = [0xFF, 0xD0, 0x00, 0x00];
        let stream = StreamReader::new(&data);
        let mut reader = stream.bit_reader();
        let mut coder = CountingCoder { restarts: 0 };
        let ended = run_scan(&mut reader, &frame, &scan, 4, &mut coder, |_, _, _, _, _| Ok(()))
            .unwrap();
        assert!(!ended);
        assert_eq!(coder.restarts, 1);
    }

    #[test]
    fn test_eoi_at_restart_boundary_ends_scan() {
        let frame = frame_422();
        let mut scan = scan_for(&frame);
        scan.components.truncate(1);
        let data = [0xFF, 0xD9];
        let stream = StreamReader::new(&data);
        let mut reader = stream.bit_reader();
        let mut coder = CountingCoder { restarts: 0 };
        let ended = run_scan(&mut reader, &frame, &scan, 4, &mut coder, |_, _, _, _, _| Ok(()))
            .unwrap();
        assert!(ended);
        assert_eq!(coder.restarts, 0);
    }
}
