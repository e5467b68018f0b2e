//! Core type definitions for the codec.
//!
//! Frame and scan headers model the wire structures of T.81 Annex B; the
//! geometry helpers derive per-component block grids from the sampling
//! factors (T.81 A.1.1, A.2.4).

use crate::consts::{
    DCTSIZE, JPEG_SOF0, JPEG_SOF1, JPEG_SOF2, JPEG_SOF3, JPEG_SOF9, JPEG_SOF10, MAX_COMPONENTS,
};
use crate::error::{Error, Result};

/// A single 8x8 block of DCT coefficients or decoded samples,
/// natural (row-major) order.
pub type DctBlock = [i16; crate::consts::DCTSIZE2];

/// A single 8x8 block of floating-point values used inside the DCT.
pub type FloatBlock = [f32; crate::consts::DCTSIZE2];

/// Ceiling division on usize.
#[inline]
pub(crate) const fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

// =============================================================================
// Coding process
// =============================================================================

/// The coding process of a frame, keyed by its SOF marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingProcess {
    /// SOF0: baseline DCT, Huffman, 8-bit
    BaselineDct,
    /// SOF1: extended sequential DCT, Huffman, 8- or 12-bit
    ExtendedDct,
    /// SOF2: progressive DCT, Huffman
    ProgressiveDct,
    /// SOF3: lossless sequential, Huffman, 2- to 16-bit
    Lossless,
    /// SOF9: extended sequential DCT, arithmetic
    SequentialArithmetic,
    /// SOF10: progressive DCT, arithmetic
    ProgressiveArithmetic,
}

impl CodingProcess {
    /// Map a SOF marker code to a coding process.
    ///
    /// Returns `Unsupported` for SOF markers this codec does not handle
    /// (hierarchical, differential, arithmetic lossless).
    pub fn from_marker(marker: u8) -> Result<CodingProcess> {
        match marker {
            JPEG_SOF0 => Ok(CodingProcess::BaselineDct),
            JPEG_SOF1 => Ok(CodingProcess::ExtendedDct),
            JPEG_SOF2 => Ok(CodingProcess::ProgressiveDct),
            JPEG_SOF3 => Ok(CodingProcess::Lossless),
            JPEG_SOF9 => Ok(CodingProcess::SequentialArithmetic),
            JPEG_SOF10 => Ok(CodingProcess::ProgressiveArithmetic),
            other => Err(Error::Unsupported(other)),
        }
    }

    /// Returns true if the frame carries DCT coefficients (everything but
    /// lossless).
    pub const fn uses_dct(self) -> bool {
        !matches!(self, CodingProcess::Lossless)
    }

    /// Returns true for the progressive processes.
    pub const fn is_progressive(self) -> bool {
        matches!(
            self,
            CodingProcess::ProgressiveDct | CodingProcess::ProgressiveArithmetic
        )
    }

    /// Returns true for the arithmetic-coded processes.
    pub const fn is_arithmetic(self) -> bool {
        matches!(
            self,
            CodingProcess::SequentialArithmetic | CodingProcess::ProgressiveArithmetic
        )
    }
}

// =============================================================================
// Frame header
// =============================================================================

/// One component record of a frame header (T.81 B.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    /// Component identifier, unique within the frame
    pub id: u8,
    /// Horizontal sampling factor (1-4)
    pub h: u8,
    /// Vertical sampling factor (1-4)
    pub v: u8,
    /// Quantization table selector (0-3)
    pub quant_table: u8,
}

/// A parsed Start-of-Frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Coding process from the SOF marker
    pub process: CodingProcess,
    /// Sample precision in bits per component
    pub precision: u8,
    /// Image height in lines
    pub height: u16,
    /// Image width in samples per line
    pub width: u16,
    /// Frame components in file order
    pub components: Vec<FrameComponent>,
}

impl FrameHeader {
    /// Maximum horizontal sampling factor over all components.
    pub fn h_max(&self) -> u8 {
        self.components.iter().map(|c| c.h).max().unwrap_or(1)
    }

    /// Maximum vertical sampling factor over all components.
    pub fn v_max(&self) -> u8 {
        self.components.iter().map(|c| c.v).max().unwrap_or(1)
    }

    /// MCU columns for interleaved scans: ceil(W / (8 * Hmax)).
    pub fn mcus_per_line(&self) -> usize {
        ceil_div(self.width as usize, DCTSIZE * self.h_max() as usize)
    }

    /// MCU rows for interleaved scans: ceil(H / (8 * Vmax)).
    pub fn mcu_rows(&self) -> usize {
        ceil_div(self.height as usize, DCTSIZE * self.v_max() as usize)
    }

    /// Component frame size in samples (T.81 A.1.1):
    /// `(ceil(W * Hi / Hmax), ceil(H * Vi / Vmax))`.
    pub fn component_size(&self, index: usize) -> (usize, usize) {
        let comp = &self.components[index];
        let w = ceil_div(
            self.width as usize * comp.h as usize,
            self.h_max() as usize,
        );
        let h = ceil_div(
            self.height as usize * comp.v as usize,
            self.v_max() as usize,
        );
        (w, h)
    }

    /// Component data-unit grid for non-interleaved scans:
    /// `(ceil(wi / 8), ceil(hi / 8))`.
    pub fn component_blocks(&self, index: usize) -> (usize, usize) {
        let (w, h) = self.component_size(index);
        (ceil_div(w, DCTSIZE), ceil_div(h, DCTSIZE))
    }

    /// Component data-unit grid padded out to whole MCUs (T.81 A.2.4),
    /// which is the grid interleaved scans traverse and the grid the
    /// coefficient cache allocates.
    pub fn component_blocks_padded(&self, index: usize) -> (usize, usize) {
        let comp = &self.components[index];
        (
            self.mcus_per_line() * comp.h as usize,
            self.mcu_rows() * comp.v as usize,
        )
    }

    /// Resolve a component identifier to its index in file order.
    pub fn component_index(&self, id: u8) -> Option<usize> {
        self.components.iter().position(|c| c.id == id)
    }

    /// Validate the invariants of T.81 B.2.2 plus this codec's limits.
    pub fn validate(&self) -> Result<()> {
        if self.components.is_empty() {
            return Err(Error::invalid("frame has no components"));
        }
        if self.components.len() > MAX_COMPONENTS {
            return Err(Error::invalid("too many frame components"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::invalid("frame dimensions must be nonzero"));
        }
        match self.process {
            CodingProcess::BaselineDct if self.precision != 8 => {
                return Err(Error::invalid("baseline frames must be 8-bit"));
            }
            CodingProcess::ExtendedDct
            | CodingProcess::ProgressiveDct
            | CodingProcess::SequentialArithmetic
            | CodingProcess::ProgressiveArithmetic
                if self.precision != 8 && self.precision != 12 =>
            {
                return Err(Error::invalid("DCT frames must be 8- or 12-bit"));
            }
            CodingProcess::Lossless if !(2..=16).contains(&self.precision) => {
                return Err(Error::invalid("lossless precision must be 2-16 bits"));
            }
            _ => {}
        }
        for (i, comp) in self.components.iter().enumerate() {
            if !(1..=4).contains(&comp.h) || !(1..=4).contains(&comp.v) {
                return Err(Error::invalid("sampling factors must be 1-4"));
            }
            if comp.quant_table as usize >= crate::consts::NUM_TABLE_SLOTS {
                return Err(Error::invalid("quantization table selector out of range"));
            }
            if self.components[..i].iter().any(|c| c.id == comp.id) {
                return Err(Error::invalid("duplicate component identifiers"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Scan header
// =============================================================================

/// One component record of a scan header (T.81 B.2.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    /// Index of the component in the frame header
    pub component_index: usize,
    /// Component identifier as it appeared on the wire
    pub id: u8,
    /// DC entropy table selector (0-3); lossless predictor selection
    /// tables also live in the DC slots
    pub dc_table: u8,
    /// AC entropy table selector (0-3); zero for DC-only and lossless scans
    pub ac_table: u8,
}

/// A parsed Start-of-Scan header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHeader {
    /// Components selected by this scan, in scan order
    pub components: Vec<ScanComponent>,
    /// Spectral selection start (Ss); predictor selector for lossless
    pub ss: u8,
    /// Spectral selection end (Se); point transform is unused for lossless
    pub se: u8,
    /// Successive approximation high bit (Ah)
    pub ah: u8,
    /// Successive approximation low bit / point transform (Al)
    pub al: u8,
}

impl ScanHeader {
    /// Returns true when the scan covers more than one component, in which
    /// case data units are interleaved into MCUs.
    pub fn is_interleaved(&self) -> bool {
        self.components.len() > 1
    }

    /// Returns true for a progressive DC scan (Ss == 0).
    pub fn is_dc_scan(&self) -> bool {
        self.ss == 0
    }

    /// Returns true for a refinement scan (Ah != 0).
    pub fn is_refinement(&self) -> bool {
        self.ah != 0
    }

    /// Validate the scan against its frame (T.81 B.2.3).
    pub fn validate(&self, frame: &FrameHeader) -> Result<()> {
        if self.components.is_empty() {
            return Err(Error::invalid("scan has no components"));
        }
        if self.is_interleaved() {
            let units: usize = self
                .components
                .iter()
                .map(|sc| {
                    let c = &frame.components[sc.component_index];
                    c.h as usize * c.v as usize
                })
                .sum();
            if units > crate::consts::MAX_BLOCKS_IN_MCU {
                return Err(Error::invalid("interleaved scan exceeds 10 data units per MCU"));
            }
        }
        match frame.process {
            CodingProcess::BaselineDct | CodingProcess::ExtendedDct
            | CodingProcess::SequentialArithmetic => {
                if self.ss != 0 || self.se != 63 || self.ah != 0 || self.al != 0 {
                    return Err(Error::invalid(
                        "sequential scans require Ss=0, Se=63, Ah=Al=0",
                    ));
                }
            }
            CodingProcess::ProgressiveDct | CodingProcess::ProgressiveArithmetic => {
                if self.se as usize > 63 || self.ss > self.se {
                    return Err(Error::invalid("spectral selection out of range"));
                }
                if self.ss == 0 && self.se != 0 {
                    return Err(Error::invalid("progressive DC scans must have Se=0"));
                }
                if self.ss > 0 && self.components.len() != 1 {
                    return Err(Error::invalid("progressive AC scans cover one component"));
                }
                if self.ah > 13 || self.al > 13 {
                    return Err(Error::invalid("successive approximation out of range"));
                }
                if self.ah != 0 && self.ah != self.al + 1 {
                    return Err(Error::invalid("refinement must lower Al by exactly one"));
                }
            }
            CodingProcess::Lossless => {
                if !(1..=7).contains(&self.ss) {
                    return Err(Error::invalid("lossless predictor must be 1-7"));
                }
                if self.se != 0 || self.ah != 0 {
                    return Err(Error::invalid("lossless scans require Se=0, Ah=0"));
                }
                if self.al >= frame.precision {
                    return Err(Error::invalid("point transform exceeds precision"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_420() -> FrameHeader {
        FrameHeader {
            process: CodingProcess::BaselineDct,
            precision: 8,
            height: 607,
            width: 800,
            components: vec![
                FrameComponent { id: 1, h: 2, v: 2, quant_table: 0 },
                FrameComponent { id: 2, h: 1, v: 1, quant_table: 1 },
                FrameComponent { id: 3, h: 1, v: 1, quant_table: 1 },
            ],
        }
    }

    #[test]
    fn test_process_from_marker() {
        assert_eq!(
            CodingProcess::from_marker(0xC0).unwrap(),
            CodingProcess::BaselineDct
        );
        assert_eq!(
            CodingProcess::from_marker(0xCA).unwrap(),
            CodingProcess::ProgressiveArithmetic
        );
        assert_eq!(CodingProcess::from_marker(0xC5), Err(Error::Unsupported(0xC5)));
        assert_eq!(CodingProcess::from_marker(0xCB), Err(Error::Unsupported(0xCB)));
    }

    #[test]
    fn test_mcu_geometry() {
        let frame = frame_420();
        assert_eq!(frame.h_max(), 2);
        assert_eq!(frame.v_max(), 2);
        // 800 / 16 = 50 exactly; 607 / 16 rounds up to 38.
        assert_eq!(frame.mcus_per_line(), 50);
        assert_eq!(frame.mcu_rows(), 38);
        // Luma occupies the full frame; chroma is halved and rounded up.
        assert_eq!(frame.component_size(0), (800, 607));
        assert_eq!(frame.component_size(1), (400, 304));
        assert_eq!(frame.component_blocks(0), (100, 76));
        assert_eq!(frame.component_blocks(1), (50, 38));
        assert_eq!(frame.component_blocks_padded(0), (100, 76));
        assert_eq!(frame.component_blocks_padded(1), (50, 38));
    }

    #[test]
    fn test_frame_validation() {
        let mut frame = frame_420();
        assert!(frame.validate().is_ok());

        frame.components[1].id = 1;
        assert!(frame.validate().is_err());

        let mut frame = frame_420();
        frame.components[0].h = 5;
        assert!(frame.validate().is_err());

        let mut frame = frame_420();
        frame.precision = 12;
        assert!(frame.validate().is_err()); // baseline must be 8-bit
        frame.process = CodingProcess::ExtendedDct;
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_scan_validation() {
        let frame = frame_420();
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
        assert!(scan.validate(&frame).is_ok());

        let mut bad = scan.clone();
        bad.se = 10;
        assert!(bad.validate(&frame).is_err());

        let mut progressive = frame_420();
        progressive.process = CodingProcess::ProgressiveDct;
        let ac = ScanHeader {
            components: vec![ScanComponent {
                component_index: 0,
                id: 1,
                dc_table: 0,
                ac_table: 0,
            }],
            ss: 1,
            se: 5,
            ah: 0,
            al: 2,
        };
        assert!(ac.validate(&progressive).is_ok());

        let mut multi_ac = ac.clone();
        multi_ac.components = scan.components.clone();
        assert!(multi_ac.validate(&progressive).is_err());
    }
}
