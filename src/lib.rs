//! # jpeg-oxide
//!
//! Pure Rust JPEG codec covering the ISO/IEC 10918-1 (ITU-T T.81) Huffman
//! and arithmetic processes:
//!
//! - **Decoding**: baseline and extended sequential (SOF0/SOF1, 8- and
//!   12-bit), progressive (SOF2), lossless (SOF3, 2-16 bit), and the
//!   sequential/progressive arithmetic processes (SOF9/SOF10).
//! - **Encoding**: baseline (SOF0) with restart intervals, chroma
//!   subsampling, and optionally optimized Huffman tables.
//! - **Optimizing**: lossless re-emission of sequential Huffman streams
//!   with freshly built codebooks, optionally stripping metadata.
//!
//! The codec works on planar component samples; color conversion and
//! container handling stay outside. Input is a byte slice, output flows
//! through caller-supplied [`BlockSink`]/[`BlockSource`] implementations
//! and any `std::io::Write` byte sink.
//!
//! ## Decoding
//!
//! ```no_run
//! use jpeg_oxide::{Decoder, PlanarOutput};
//!
//! # fn main() -> jpeg_oxide::Result<()> {
//! # let bytes: Vec<u8> = Vec::new();
//! let decoder = Decoder::new(&bytes);
//! let info = decoder.identify(true)?;
//! println!("{}x{}, q~{:?}", info.width, info.height, info.quality);
//!
//! let mut output = PlanarOutput::new();
//! decoder.decode(&mut output)?;
//! let luma = output.plane(0);
//! # let _ = luma;
//! # Ok(())
//! # }
//! ```
//!
//! ## Encoding
//!
//! ```no_run
//! use jpeg_oxide::{BlockSource, DctBlock, Encoder};
//!
//! struct Gray {
//!     samples: Vec<u8>,
//!     width: u16,
//!     height: u16,
//! }
//!
//! impl BlockSource for Gray {
//!     fn width(&self) -> u16 { self.width }
//!     fn height(&self) -> u16 { self.height }
//!     fn read_block(&mut self, block: &mut DctBlock, _c: usize, x: usize, y: usize) {
//!         for row in 0..8 {
//!             for col in 0..8 {
//!                 let sy = (y + row).min(self.height as usize - 1);
//!                 let sx = (x + col).min(self.width as usize - 1);
//!                 block[row * 8 + col] =
//!                     i16::from(self.samples[sy * self.width as usize + sx]);
//!             }
//!         }
//!     }
//! }
//!
//! # fn main() -> jpeg_oxide::Result<()> {
//! let mut source = Gray { samples: vec![128; 64 * 64], width: 64, height: 64 };
//! let mut jpeg = Vec::new();
//! Encoder::gray(85).optimize_huffman(true).encode(&mut source, &mut jpeg)?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

// ============================================================================
// Module graph, leaves first
// ============================================================================
pub mod consts;
pub mod error;
pub mod types;

pub mod bitstream;
pub mod coefficients;
pub mod dct;
pub mod huffman;
pub mod quant;

pub mod headers;
pub mod marker;

pub mod arith;
pub mod entropy;
pub mod scan;

pub mod decoder;
pub mod encode;
pub mod optimize;

/// Arithmetic test-stream generation for the test suites; not a stable
/// API.
#[doc(hidden)]
pub mod test_encoder;

// ============================================================================
// Primary API
// ============================================================================

pub use decoder::{BlockSink, Decoder, ImageInfo, PlanarOutput};
pub use encode::{BlockSource, EncodeComponent, Encoder};
pub use error::{Error, Result};
pub use optimize::optimize;
pub use types::{CodingProcess, DctBlock, FrameComponent, FrameHeader, ScanComponent, ScanHeader};

// ============================================================================
// Secondary API
// ============================================================================

pub use huffman::{DerivedTable, FrequencyCounter, HuffTable};
pub use quant::{create_quant_table, estimate_quality, quality_to_scale_factor, QuantTable};

/// Core block constants.
pub use consts::{DCTSIZE, DCTSIZE2};
