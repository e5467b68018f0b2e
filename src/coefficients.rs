//! The frame-wide coefficient cache.
//!
//! Progressive decoding and optimizer transcoding materialize every
//! coefficient block of a frame: progressive scans revisit blocks across
//! scans, and the optimizer re-emits the whole symbol stream after its
//! statistics pass. Blocks are stored as one strip per component (sized to
//! the MCU-padded grid) rather than one frame-wide allocation.

use crate::types::{DctBlock, FrameHeader};

struct ComponentStrip {
    /// Blocks per line (MCU-padded).
    width: usize,
    /// Block rows (MCU-padded).
    height: usize,
    blocks: Vec<DctBlock>,
}

/// All coefficient blocks of one frame, indexed by
/// `(component, block_x, block_y)`.
pub struct CoefficientStore {
    components: Vec<ComponentStrip>,
}

impl CoefficientStore {
    /// Allocate zeroed strips for every component of a frame.
    pub fn for_frame(frame: &FrameHeader) -> Self {
        let components = (0..frame.components.len())
            .map(|i| {
                let (width, height) = frame.component_blocks_padded(i);
                ComponentStrip {
                    width,
                    height,
                    blocks: vec![[0i16; 64]; width * height],
                }
            })
            .collect();
        Self { components }
    }

    /// Block grid dimensions of a component strip.
    pub fn dims(&self, component: usize) -> (usize, usize) {
        let strip = &self.components[component];
        (strip.width, strip.height)
    }

    /// Borrow one block.
    pub fn block(&self, component: usize, bx: usize, by: usize) -> &DctBlock {
        let strip = &self.components[component];
        debug_assert!(bx < strip.width && by < strip.height);
        &strip.blocks[by * strip.width + bx]
    }

    /// Mutably borrow one block.
    pub fn block_mut(&mut self, component: usize, bx: usize, by: usize) -> &mut DctBlock {
        let strip = &mut self.components[component];
        debug_assert!(bx < strip.width && by < strip.height);
        &mut strip.blocks[by * strip.width + bx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CodingProcess, FrameComponent};

    #[test]
    fn test_store_geometry() {
        let frame = FrameHeader {
            process: CodingProcess::ProgressiveDct,
            precision: 8,
            height: 100,
            width: 100,
            components: vec![
                FrameComponent { id: 1, h: 2, v: 2, quant_table: 0 },
                FrameComponent { id: 2, h: 1, v: 1, quant_table: 1 },
            ],
        };
        let mut store = CoefficientStore::for_frame(&frame);
        // 100/16 rounds to 7 MCUs per axis; luma strip is 14x14 blocks,
        // chroma 7x7.
        assert_eq!(store.dims(0), (14, 14));
        assert_eq!(store.dims(1), (7, 7));

        store.block_mut(0, 13, 13)[0] = 42;
        assert_eq!(store.block(0, 13, 13)[0], 42);
        assert_eq!(store.block(1, 6, 6)[0], 0);
    }
}
