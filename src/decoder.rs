//! The decoder orchestrator.
//!
//! Drives the segment state machine of T.81 B.2: SOI, tables/misc
//! segments, one frame header, scans, EOI. Entropy-coded data is handed to
//! the scan driver with the coder matching the frame's process; decoded
//! blocks stream to a caller-provided [`BlockSink`] (sequential) or
//! accumulate in the coefficient cache until the frame completes
//! (progressive).
//!
//! `identify` runs the same state machine but stops interpreting at SOS
//! and only measures the stream.

use crate::arith::ArithConditioning;
use crate::bitstream::StreamReader;
use crate::coefficients::CoefficientStore;
use crate::consts::{
    is_app_marker, is_rst_marker, is_sof_marker, DCTSIZE, JPEG_COM, JPEG_DAC, JPEG_DHT, JPEG_DNL,
    JPEG_DQT, JPEG_DRI, JPEG_EOI, JPEG_SOI, JPEG_SOS, JPEG_TEM, NUM_TABLE_SLOTS,
};
use crate::dct::{dequantize_block, inverse_dct_8x8, level_shift_inverse, dequantize_multipliers};
use crate::entropy::{apply_point_transform, decode_lossless_scan, lossless_planes, LosslessPlane};
use crate::error::{Error, Result};
use crate::headers;
use crate::huffman::DecodeTable;
use crate::quant::{estimate_quality, QuantTable};
use crate::scan::{
    run_scan, ArithProgressiveCoder, ArithSequentialCoder, HuffmanProgressiveCoder,
    HuffmanSequentialCoder,
};
use crate::types::{ceil_div, CodingProcess, DctBlock, FloatBlock, FrameHeader, ScanHeader};

/// Receiver for decoded sample blocks.
///
/// Blocks arrive in natural order with coordinates already scaled to full
/// frame resolution (the driver multiplies block origins by the component's
/// subsampling factor); the sink decides the upsampling policy and must
/// clip blocks that extend past the frame edge.
pub trait BlockSink {
    /// Called once when the frame header is known.
    fn start_frame(&mut self, _frame: &FrameHeader) {}

    /// Write one 8x8 block of samples for `component` at sample position
    /// `(x, y)`.
    fn write_block(&mut self, block: &DctBlock, component: usize, x: usize, y: usize);
}

/// Frame parameters reported by [`Decoder::identify`].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    /// Image width in samples.
    pub width: u16,
    /// Image height in lines.
    pub height: u16,
    /// Number of frame components.
    pub num_components: u8,
    /// Sample precision in bits.
    pub precision: u8,
    /// Coding process from the SOF marker.
    pub process: CodingProcess,
    /// Estimated encoder quality setting, when requested and derivable.
    pub quality: Option<f32>,
    /// Total stream length through the byte following EOI.
    pub length: usize,
}

/// Table and frame state accumulated while walking segments.
#[derive(Default)]
struct DecodeState {
    quant: [Option<QuantTable>; NUM_TABLE_SLOTS],
    dc_tables: [Option<DecodeTable>; NUM_TABLE_SLOTS],
    ac_tables: [Option<DecodeTable>; NUM_TABLE_SLOTS],
    conditioning: ArithConditioning,
    restart_interval: u16,
    frame: Option<FrameHeader>,
    store: Option<CoefficientStore>,
    planes: Option<Vec<LosslessPlane>>,
    lossless_al: u8,
}

impl DecodeState {
    fn apply_tables(&mut self, marker: u8, payload: &[u8]) -> Result<()> {
        match marker {
            JPEG_DQT => {
                for (slot, table) in headers::parse_dqt(payload)? {
                    self.quant[usize::from(slot)] = Some(table);
                }
            }
            JPEG_DHT => {
                for (slot, is_ac, table) in headers::parse_dht(payload)? {
                    let derived = DecodeTable::new(&table)?;
                    if is_ac {
                        self.ac_tables[usize::from(slot)] = Some(derived);
                    } else {
                        self.dc_tables[usize::from(slot)] = Some(derived);
                    }
                }
            }
            JPEG_DAC => {
                for entry in headers::parse_dac(payload)? {
                    let slot = usize::from(entry.slot);
                    if entry.is_ac {
                        self.conditioning.ac_kx[slot] = entry.value;
                    } else {
                        self.conditioning.dc_l[slot] = entry.value & 0x0F;
                        self.conditioning.dc_u[slot] = entry.value >> 4;
                    }
                }
            }
            JPEG_DRI => {
                self.restart_interval = headers::parse_dri(payload)?;
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    fn frame(&self) -> Result<&FrameHeader> {
        self.frame
            .as_ref()
            .ok_or(Error::InvalidOperation("scan data before frame header"))
    }
}

/// A JPEG decoder over one byte stream.
pub struct Decoder<'a> {
    data: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Create a decoder over a complete JPEG stream.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Decode the stream, delivering sample blocks to `sink`.
    pub fn decode(&self, sink: &mut dyn BlockSink) -> Result<()> {
        let mut reader = StreamReader::new(self.data);
        expect_soi(&mut reader)?;

        let mut state = DecodeState::default();
        loop {
            let offset = reader.pos();
            let marker = reader.read_marker()?;
            match marker {
                JPEG_EOI => break,
                m if is_sof_marker(m) => {
                    let payload = read_segment(&mut reader)?;
                    if state.frame.is_some() {
                        return Err(Error::InvalidData {
                            offset,
                            message: "multiple frame headers",
                        });
                    }
                    let frame = headers::parse_sof(m, payload).map_err(|e| e.at_offset(offset))?;
                    check_integral_sampling(&frame).map_err(|e| e.at_offset(offset))?;
                    sink.start_frame(&frame);
                    match frame.process {
                        CodingProcess::ProgressiveDct | CodingProcess::ProgressiveArithmetic => {
                            state.store = Some(CoefficientStore::for_frame(&frame));
                        }
                        CodingProcess::Lossless => {
                            state.planes = Some(lossless_planes(&frame));
                        }
                        _ => {}
                    }
                    state.frame = Some(frame);
                }
                JPEG_DQT | JPEG_DHT | JPEG_DAC | JPEG_DRI => {
                    let payload = read_segment(&mut reader)?;
                    state
                        .apply_tables(marker, payload)
                        .map_err(|e| e.at_offset(offset))?;
                }
                JPEG_SOS => {
                    let payload = read_segment(&mut reader)?;
                    let frame = state.frame()?;
                    let scan =
                        headers::parse_sos(payload, frame).map_err(|e| e.at_offset(offset))?;
                    let ended_by_eoi = decode_scan(&mut reader, &mut state, &scan, sink)?;
                    if ended_by_eoi {
                        break;
                    }
                }
                JPEG_TEM => {}
                m if is_rst_marker(m) => {
                    return Err(Error::InvalidData {
                        offset,
                        message: "restart marker outside entropy-coded data",
                    });
                }
                m if is_app_marker(m) || m == JPEG_COM || m == JPEG_DNL => {
                    let length = reader.read_length()?;
                    reader.skip(length)?;
                }
                _ => {
                    // Unknown marker: accept by length-skip.
                    let length = reader.read_length()?;
                    reader.skip(length)?;
                }
            }
        }

        // Buffered modes produce output once all scans are in.
        match state.frame.as_ref().map(|f| f.process) {
            Some(CodingProcess::ProgressiveDct) | Some(CodingProcess::ProgressiveArithmetic) => {
                flush_coefficients(&state, sink)?;
            }
            Some(CodingProcess::Lossless) => {
                flush_lossless(&mut state, sink)?;
            }
            Some(_) => {}
            None => return Err(Error::InvalidOperation("stream carries no frame")),
        }
        Ok(())
    }

    /// Parse only as far as needed to describe the stream.
    ///
    /// Interprets the frame header (and quantization tables when
    /// `with_quality` is set), length-skips everything else, and measures
    /// the stream through EOI without touching entropy-coded data.
    pub fn identify(&self, with_quality: bool) -> Result<ImageInfo> {
        let mut reader = StreamReader::new(self.data);
        expect_soi(&mut reader)?;

        let mut frame: Option<FrameHeader> = None;
        let mut quant: [Option<QuantTable>; NUM_TABLE_SLOTS] = Default::default();
        'markers: loop {
            let offset = reader.pos();
            let marker = reader.read_marker()?;
            match marker {
                JPEG_EOI => break,
                m if is_sof_marker(m) => {
                    let payload = read_segment(&mut reader)?;
                    if frame.is_some() {
                        return Err(Error::InvalidData {
                            offset,
                            message: "multiple frame headers",
                        });
                    }
                    frame =
                        Some(headers::parse_sof(m, payload).map_err(|e| e.at_offset(offset))?);
                }
                JPEG_DQT if with_quality => {
                    let payload = read_segment(&mut reader)?;
                    for (slot, table) in
                        headers::parse_dqt(payload).map_err(|e| e.at_offset(offset))?
                    {
                        quant[usize::from(slot)] = Some(table);
                    }
                }
                JPEG_SOS => {
                    // Skip the header, then race through entropy data.
                    let length = reader.read_length()?;
                    reader.skip(length)?;
                    loop {
                        reader.align_to_marker();
                        let marker = reader.read_marker()?;
                        if is_rst_marker(marker) {
                            continue;
                        }
                        if marker == JPEG_EOI {
                            break 'markers;
                        }
                        if marker == JPEG_TEM {
                            continue;
                        }
                        // An inter-scan segment; skip it and resume.
                        let length = reader.read_length()?;
                        reader.skip(length)?;
                    }
                }
                JPEG_TEM => {}
                m if is_rst_marker(m) => {
                    return Err(Error::InvalidData {
                        offset,
                        message: "restart marker outside entropy-coded data",
                    });
                }
                _ => {
                    let length = reader.read_length()?;
                    reader.skip(length)?;
                }
            }
        }

        let frame = frame.ok_or(Error::InvalidOperation("stream carries no frame"))?;
        let quality = if with_quality {
            let luma = frame
                .components
                .first()
                .and_then(|c| quant[usize::from(c.quant_table)].as_ref());
            let chroma = frame
                .components
                .get(1)
                .and_then(|c| quant[usize::from(c.quant_table)].as_ref());
            luma.map(|l| estimate_quality(l, chroma))
        } else {
            None
        };
        Ok(ImageInfo {
            width: frame.width,
            height: frame.height,
            num_components: frame.components.len() as u8,
            precision: frame.precision,
            process: frame.process,
            quality,
            length: reader.pos(),
        })
    }

    /// Read a sequential Huffman stream into coefficient form for the
    /// optimizer: frame, tables, scans, cached blocks, and the APPn/COM
    /// segments in file order.
    pub(crate) fn read_transcode(&self) -> Result<TranscodeData> {
        let mut reader = StreamReader::new(self.data);
        expect_soi(&mut reader)?;

        let mut state = DecodeState::default();
        let mut sof_marker = 0u8;
        let mut scans: Vec<ScanHeader> = Vec::new();
        let mut segments: Vec<(u8, Vec<u8>)> = Vec::new();
        loop {
            let offset = reader.pos();
            let marker = reader.read_marker()?;
            match marker {
                JPEG_EOI => break,
                m if is_sof_marker(m) => {
                    let payload = read_segment(&mut reader)?;
                    if state.frame.is_some() {
                        return Err(Error::InvalidData {
                            offset,
                            message: "multiple frame headers",
                        });
                    }
                    let frame = headers::parse_sof(m, payload).map_err(|e| e.at_offset(offset))?;
                    match frame.process {
                        CodingProcess::BaselineDct | CodingProcess::ExtendedDct => {}
                        _ => return Err(Error::Unsupported(m)),
                    }
                    sof_marker = m;
                    state.store = Some(CoefficientStore::for_frame(&frame));
                    state.frame = Some(frame);
                }
                JPEG_DQT | JPEG_DHT | JPEG_DAC | JPEG_DRI => {
                    let payload = read_segment(&mut reader)?;
                    state
                        .apply_tables(marker, payload)
                        .map_err(|e| e.at_offset(offset))?;
                }
                m if is_app_marker(m) || m == JPEG_COM => {
                    let payload = read_segment(&mut reader)?;
                    segments.push((m, payload.to_vec()));
                }
                JPEG_SOS => {
                    let payload = read_segment(&mut reader)?;
                    let frame = state
                        .frame
                        .as_ref()
                        .ok_or(Error::InvalidOperation("scan data before frame header"))?;
                    let scan =
                        headers::parse_sos(payload, frame).map_err(|e| e.at_offset(offset))?;
                    let mut bits = reader.bit_reader();
                    let mut coder =
                        HuffmanSequentialCoder::new(&scan, &state.dc_tables, &state.ac_tables)
                            .map_err(|e| e.at_offset(offset))?;
                    let store = state
                        .store
                        .as_mut()
                        .ok_or(Error::InvalidOperation("scan data before frame header"))?;
                    let component_of: Vec<usize> =
                        scan.components.iter().map(|c| c.component_index).collect();
                    let ended = run_scan(
                        &mut bits,
                        frame,
                        &scan,
                        state.restart_interval,
                        &mut coder,
                        |coder, reader, sc, bx, by| {
                            coder.decode_unit(reader, sc, store.block_mut(component_of[sc], bx, by))
                        },
                    )?;
                    reader.set_pos(bits.finish());
                    reader.align_to_marker();
                    scans.push(scan);
                    if ended {
                        break;
                    }
                }
                JPEG_TEM => {}
                _ => {
                    let length = reader.read_length()?;
                    reader.skip(length)?;
                }
            }
        }

        let frame = state
            .frame
            .take()
            .ok_or(Error::InvalidOperation("stream carries no frame"))?;
        let store = state
            .store
            .take()
            .ok_or(Error::InvalidOperation("stream carries no frame"))?;
        if scans.is_empty() {
            return Err(Error::InvalidOperation("stream carries no scan"));
        }
        Ok(TranscodeData {
            frame,
            sof_marker,
            quant: state.quant,
            restart_interval: state.restart_interval,
            store,
            scans,
            segments,
        })
    }
}

/// Everything the optimizer needs to re-emit a stream.
pub(crate) struct TranscodeData {
    pub frame: FrameHeader,
    pub sof_marker: u8,
    pub quant: [Option<QuantTable>; NUM_TABLE_SLOTS],
    #[allow(dead_code)]
    pub restart_interval: u16,
    pub store: CoefficientStore,
    pub scans: Vec<ScanHeader>,
    pub segments: Vec<(u8, Vec<u8>)>,
}

fn expect_soi(reader: &mut StreamReader<'_>) -> Result<()> {
    let offset = reader.pos();
    if reader.read_marker()? != JPEG_SOI {
        return Err(Error::InvalidData {
            offset,
            message: "stream does not start with SOI",
        });
    }
    Ok(())
}

fn read_segment<'a>(reader: &mut StreamReader<'a>) -> Result<&'a [u8]> {
    let length = reader.read_length()?;
    reader.read_bytes(length)
}

/// Upsampling by coordinate scaling only works when every component's
/// factor divides the frame maximum.
fn check_integral_sampling(frame: &FrameHeader) -> Result<()> {
    let h_max = frame.h_max();
    let v_max = frame.v_max();
    for comp in &frame.components {
        if h_max % comp.h != 0 || v_max % comp.v != 0 {
            return Err(Error::invalid("fractional subsampling ratios"));
        }
    }
    Ok(())
}

/// Per-scan output state for sequential frames: dequantization multipliers
/// and coordinate scales per scan component.
struct SequentialEmitter {
    multipliers: Vec<FloatBlock>,
    component_of: Vec<usize>,
    scale: Vec<(usize, usize)>,
    precision: u8,
}

impl SequentialEmitter {
    fn new(
        frame: &FrameHeader,
        scan: &ScanHeader,
        quant: &[Option<QuantTable>; NUM_TABLE_SLOTS],
    ) -> Result<Self> {
        let h_max = frame.h_max() as usize;
        let v_max = frame.v_max() as usize;
        let mut multipliers = Vec::new();
        let mut component_of = Vec::new();
        let mut scale = Vec::new();
        for sc in &scan.components {
            let comp = &frame.components[sc.component_index];
            let table = quant[usize::from(comp.quant_table)]
                .as_ref()
                .ok_or_else(|| Error::invalid("component references undefined quantization table"))?;
            multipliers.push(dequantize_multipliers(table));
            component_of.push(sc.component_index);
            scale.push((h_max / comp.h as usize, v_max / comp.v as usize));
        }
        Ok(Self {
            multipliers,
            component_of,
            scale,
            precision: frame.precision,
        })
    }

    fn emit(&self, block: &DctBlock, sc: usize, bx: usize, by: usize, sink: &mut dyn BlockSink) {
        let mut work = [0f32; crate::consts::DCTSIZE2];
        dequantize_block(block, &self.multipliers[sc], &mut work);
        inverse_dct_8x8(&mut work);
        let samples = level_shift_inverse(&work, self.precision);
        let (sx, sy) = self.scale[sc];
        sink.write_block(
            &samples,
            self.component_of[sc],
            bx * DCTSIZE * sx,
            by * DCTSIZE * sy,
        );
    }
}

/// Execute one scan; returns true when the scan consumed the EOI.
fn decode_scan(
    reader: &mut StreamReader<'_>,
    state: &mut DecodeState,
    scan: &ScanHeader,
    sink: &mut dyn BlockSink,
) -> Result<bool> {
    let frame = state
        .frame
        .as_ref()
        .ok_or(Error::InvalidOperation("scan data before frame header"))?;
    let mut bits = reader.bit_reader();
    let component_of: Vec<usize> = scan.components.iter().map(|c| c.component_index).collect();

    let ended = match frame.process {
        CodingProcess::BaselineDct | CodingProcess::ExtendedDct => {
            let mut coder = HuffmanSequentialCoder::new(scan, &state.dc_tables, &state.ac_tables)?;
            let emitter = SequentialEmitter::new(frame, scan, &state.quant)?;
            run_scan(
                &mut bits,
                frame,
                scan,
                state.restart_interval,
                &mut coder,
                |coder, reader, sc, bx, by| {
                    let mut block = [0i16; crate::consts::DCTSIZE2];
                    coder.decode_unit(reader, sc, &mut block)?;
                    emitter.emit(&block, sc, bx, by, sink);
                    Ok(())
                },
            )?
        }
        CodingProcess::SequentialArithmetic => {
            let mut coder = ArithSequentialCoder::new(&mut bits, scan, &state.conditioning);
            let emitter = SequentialEmitter::new(frame, scan, &state.quant)?;
            run_scan(
                &mut bits,
                frame,
                scan,
                state.restart_interval,
                &mut coder,
                |coder, reader, sc, bx, by| {
                    let mut block = [0i16; crate::consts::DCTSIZE2];
                    coder.decode_unit(reader, sc, &mut block)?;
                    emitter.emit(&block, sc, bx, by, sink);
                    Ok(())
                },
            )?
        }
        CodingProcess::ProgressiveDct => {
            let store = state
                .store
                .as_mut()
                .ok_or(Error::InvalidOperation("scan data before frame header"))?;
            let mut coder =
                HuffmanProgressiveCoder::new(scan, &state.dc_tables, &state.ac_tables)?;
            run_scan(
                &mut bits,
                frame,
                scan,
                state.restart_interval,
                &mut coder,
                |coder, reader, sc, bx, by| {
                    coder.decode_unit(reader, sc, store.block_mut(component_of[sc], bx, by))
                },
            )?
        }
        CodingProcess::ProgressiveArithmetic => {
            let store = state
                .store
                .as_mut()
                .ok_or(Error::InvalidOperation("scan data before frame header"))?;
            let mut coder = ArithProgressiveCoder::new(&mut bits, scan, &state.conditioning);
            run_scan(
                &mut bits,
                frame,
                scan,
                state.restart_interval,
                &mut coder,
                |coder, reader, sc, bx, by| {
                    coder.decode_unit(reader, sc, store.block_mut(component_of[sc], bx, by))
                },
            )?
        }
        CodingProcess::Lossless => {
            let planes = state
                .planes
                .as_mut()
                .ok_or(Error::InvalidOperation("scan data before frame header"))?;
            decode_lossless_scan(
                &mut bits,
                frame,
                scan,
                &state.dc_tables,
                state.restart_interval,
                planes,
            )?;
            state.lossless_al = scan.al;
            false
        }
    };

    reader.set_pos(bits.finish());
    reader.align_to_marker();
    Ok(ended)
}

/// Final pass for progressive frames: dequantize, transform, and deliver
/// every cached block.
fn flush_coefficients(state: &DecodeState, sink: &mut dyn BlockSink) -> Result<()> {
    let frame = state
        .frame
        .as_ref()
        .ok_or(Error::InvalidOperation("stream carries no frame"))?;
    let store = state
        .store
        .as_ref()
        .ok_or(Error::InvalidOperation("stream carries no frame"))?;
    let h_max = frame.h_max() as usize;
    let v_max = frame.v_max() as usize;

    for (ci, comp) in frame.components.iter().enumerate() {
        let table = state.quant[usize::from(comp.quant_table)]
            .as_ref()
            .ok_or_else(|| Error::invalid("component references undefined quantization table"))?;
        let multipliers = dequantize_multipliers(table);
        let (bw, bh) = frame.component_blocks(ci);
        let sx = h_max / comp.h as usize;
        let sy = v_max / comp.v as usize;
        for by in 0..bh {
            for bx in 0..bw {
                let mut work = [0f32; crate::consts::DCTSIZE2];
                dequantize_block(store.block(ci, bx, by), &multipliers, &mut work);
                inverse_dct_8x8(&mut work);
                let samples = level_shift_inverse(&work, frame.precision);
                sink.write_block(&samples, ci, bx * DCTSIZE * sx, by * DCTSIZE * sy);
            }
        }
    }
    Ok(())
}

/// Final pass for lossless frames: shift out the point transform and chop
/// the planes into blocks.
fn flush_lossless(state: &mut DecodeState, sink: &mut dyn BlockSink) -> Result<()> {
    let frame = state
        .frame
        .as_ref()
        .ok_or(Error::InvalidOperation("stream carries no frame"))?;
    let planes = state
        .planes
        .as_mut()
        .ok_or(Error::InvalidOperation("stream carries no frame"))?;
    apply_point_transform(planes, state.lossless_al);
    let h_max = frame.h_max() as usize;
    let v_max = frame.v_max() as usize;

    for (ci, comp) in frame.components.iter().enumerate() {
        let (w, h) = frame.component_size(ci);
        let plane = &planes[ci];
        let sx = h_max / comp.h as usize;
        let sy = v_max / comp.v as usize;
        for by in 0..ceil_div(h, DCTSIZE) {
            for bx in 0..ceil_div(w, DCTSIZE) {
                let mut block = [0i16; crate::consts::DCTSIZE2];
                for row in 0..DCTSIZE {
                    for col in 0..DCTSIZE {
                        let x = bx * DCTSIZE + col;
                        let y = by * DCTSIZE + row;
                        if x < w && y < h {
                            block[row * DCTSIZE + col] =
                                plane.samples[y * plane.width + x] as i16;
                        }
                    }
                }
                sink.write_block(&block, ci, bx * DCTSIZE * sx, by * DCTSIZE * sy);
            }
        }
    }
    Ok(())
}

// ============================================================================
// Planar sink
// ============================================================================

/// A [`BlockSink`] that assembles full-resolution planes per component with
/// nearest-neighbor upsampling; the usual choice for tests and simple
/// consumers.
#[derive(Default)]
pub struct PlanarOutput {
    width: usize,
    height: usize,
    scales: Vec<(usize, usize)>,
    planes: Vec<Vec<i16>>,
}

impl PlanarOutput {
    /// Create an empty sink; planes are allocated at `start_frame`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame width in samples.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Frame height in lines.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of component planes.
    pub fn num_components(&self) -> usize {
        self.planes.len()
    }

    /// One full-resolution component plane, row-major.
    pub fn plane(&self, component: usize) -> &[i16] {
        &self.planes[component]
    }
}

impl BlockSink for PlanarOutput {
    fn start_frame(&mut self, frame: &FrameHeader) {
        self.width = frame.width as usize;
        self.height = frame.height as usize;
        let h_max = frame.h_max() as usize;
        let v_max = frame.v_max() as usize;
        self.scales = frame
            .components
            .iter()
            .map(|c| (h_max / c.h as usize, v_max / c.v as usize))
            .collect();
        self.planes = vec![vec![0i16; self.width * self.height]; frame.components.len()];
    }

    fn write_block(&mut self, block: &DctBlock, component: usize, x: usize, y: usize) {
        let (sx, sy) = self.scales[component];
        let plane = &mut self.planes[component];
        for row in 0..DCTSIZE {
            for col in 0..DCTSIZE {
                let sample = block[row * DCTSIZE + col];
                for ry in 0..sy {
                    for rx in 0..sx {
                        let px = x + col * sx + rx;
                        let py = y + row * sy + ry;
                        if px < self.width && py < self.height {
                            plane[py * self.width + px] = sample;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_rejects_missing_soi() {
        let decoder = Decoder::new(&[0x00, 0x01]);
        assert!(decoder.identify(false).is_err());
    }

    #[test]
    fn test_identify_minimal_stream() {
        // SOI, SOF0 (8x16 gray), EOI; no scan needed for identify.
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 8, 0, 8, 0, 16, 1, 1, 0x11, 0]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        let info = Decoder::new(&data).identify(false).unwrap();
        assert_eq!(info.width, 16);
        assert_eq!(info.height, 8);
        assert_eq!(info.num_components, 1);
        assert_eq!(info.precision, 8);
        assert_eq!(info.process, CodingProcess::BaselineDct);
        assert_eq!(info.length, data.len());
    }

    #[test]
    fn test_identify_skips_unknown_app_segments() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xEB, 0x00, 0x06, 1, 2, 3, 4]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 8, 0, 8, 0, 16, 1, 1, 0x11, 0]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        let info = Decoder::new(&data).identify(false).unwrap();
        assert_eq!(info.width, 16);
        assert_eq!(info.length, data.len());
    }

    #[test]
    fn test_identify_rejects_second_sof() {
        let sof = [0xFF, 0xC0, 0x00, 0x0B, 8, 0, 8, 0, 16, 1, 1, 0x11, 0];
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&sof);
        data.extend_from_slice(&sof);
        data.extend_from_slice(&[0xFF, 0xD9]);
        let err = Decoder::new(&data).identify(false).unwrap_err();
        assert!(matches!(err, Error::InvalidData { message: "multiple frame headers", .. }));
    }

    #[test]
    fn test_identify_unsupported_sof() {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xC5, 0x00, 0x0B, 8, 0, 8, 0, 16, 1, 1, 0x11, 0]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        assert_eq!(
            Decoder::new(&data).identify(false).unwrap_err(),
            Error::Unsupported(0xC5)
        );
    }

    #[test]
    fn test_decode_requires_frame() {
        let data = [0xFF, 0xD8, 0xFF, 0xD9];
        let mut sink = PlanarOutput::new();
        assert!(matches!(
            Decoder::new(&data).decode(&mut sink),
            Err(Error::InvalidOperation(_))
        ));
    }
}
