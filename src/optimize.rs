//! The optimizer orchestrator.
//!
//! Losslessly re-emits a sequential Huffman JPEG with freshly optimized
//! codebooks: one pass decodes the entropy stream into cached coefficients
//! (no dequantization, no inverse transform), a statistics pass builds
//! optimal tables, and the same coefficients are re-emitted. Application
//! and comment segments are carried over verbatim unless stripping is
//! requested; restart markers are not re-emitted, which only ever shrinks
//! the output.

use std::io::Write;

use crate::decoder::Decoder;
use crate::encode::{emit_stream, gather_optimal_tables, EncodeComponent};
use crate::error::{Error, Result};
use crate::types::ScanHeader;

/// Re-emit a baseline or extended sequential Huffman JPEG with optimal
/// Huffman tables.
///
/// # Arguments
/// * `data` - the source JPEG stream
/// * `output` - byte sink for the rewritten stream
/// * `strip` - drop APPn and COM segments instead of preserving them
pub fn optimize<W: Write>(data: &[u8], output: W, strip: bool) -> Result<()> {
    let transcode = Decoder::new(data).read_transcode()?;

    // The rewritten stream uses one scan covering all components, so the
    // interleaving limit applies even when the source was scanned
    // component by component.
    let units: usize = transcode
        .frame
        .components
        .iter()
        .map(|c| c.h as usize * c.v as usize)
        .sum();
    if transcode.frame.components.len() > 1 && units > crate::consts::MAX_BLOCKS_IN_MCU {
        return Err(Error::InvalidOperation(
            "source components cannot share one interleaved scan",
        ));
    }

    let components: Vec<EncodeComponent> = transcode
        .frame
        .components
        .iter()
        .enumerate()
        .map(|(i, fc)| {
            let (dc_table, ac_table) = table_selectors(i, &transcode.scans);
            EncodeComponent {
                id: fc.id,
                quant_table: fc.quant_table,
                dc_table,
                ac_table,
                h: fc.h,
                v: fc.v,
            }
        })
        .collect();

    let (dc_tables, ac_tables) =
        gather_optimal_tables(&transcode.frame, &components, &transcode.store, 0)?;

    let segments = if strip { &[][..] } else { &transcode.segments[..] };
    emit_stream(
        &transcode.frame,
        &components,
        &transcode.quant,
        &dc_tables,
        &ac_tables,
        0,
        &transcode.store,
        output,
        transcode.sof_marker,
        false,
        segments,
    )
}

/// The entropy table selectors a component used in its source scan.
fn table_selectors(component_index: usize, scans: &[ScanHeader]) -> (u8, u8) {
    for scan in scans {
        for sc in &scan.components {
            if sc.component_index == component_index {
                return (sc.dc_table, sc.ac_table);
            }
        }
    }
    (0, 0)
}
