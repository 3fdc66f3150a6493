// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Indexing of MPEG-2 elementary streams.
//!
//! [`ElementaryStream`] scans a [`ByteSource`] for start codes, parses every header, links the
//! headers to each other and builds the picture graph. The stream is only read here and when
//! slice data is mapped for decoding; no pixel data is produced.

use std::ops::ControlFlow;
use std::ops::Range;

use log::debug;
use log::warn;
use thiserror::Error;

use crate::bitstream_utils::find_start_code;
use crate::bitstream_utils::BitReader;
use crate::bitstream_utils::START_CODE_PREFIX_LENGTH;
use crate::codec::mpeg2::graph::assign_presentation_times;
use crate::codec::mpeg2::graph::GraphBuilder;
use crate::codec::mpeg2::parser::AspectRatio;
use crate::codec::mpeg2::parser::Header;
use crate::codec::mpeg2::parser::HeaderKind;
use crate::codec::mpeg2::parser::ParseError;
use crate::codec::mpeg2::parser::SequenceExtension;
use crate::codec::mpeg2::parser::SequenceHeader;
use crate::codec::mpeg2::parser::Slice;
use crate::codec::mpeg2::parser::MAX_VERTICAL_SIZE;
use crate::codec::mpeg2::parser::SEQUENCE_HEADER_CODE;
use crate::codec::mpeg2::picture::Picture;
use crate::codec::mpeg2::tables::FRAME_RATE_DENOMINATOR;
use crate::codec::mpeg2::tables::FRAME_RATE_NUMERATOR;
use crate::source::ByteSource;
use crate::source::SourceError;
use crate::Resolution;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Window geometry of the start code scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// Bytes examined for start codes per mapped window.
    pub block_size: usize,
    /// Extra bytes mapped after each window so that a header starting near the end of the window
    /// can be parsed without remapping.
    pub largest_header: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            block_size: 65536,
            largest_header: 260,
        }
    }
}

/// A sequence header together with its extension and the values derived from both.
#[derive(Clone, Debug)]
pub struct SequenceInfo {
    /// Index of the sequence header.
    pub header: usize,
    /// Index of the sequence extension.
    pub extension: usize,
    /// Synthesized in front of the stream rather than read from it.
    pub ghost: bool,
    pub resolution: Resolution,
    pub mb_width: usize,
    pub mb_height: usize,
    pub progressive: bool,
    pub aspect_ratio: AspectRatio,
    pub frame_rate_numerator: u32,
    pub frame_rate_denominator: u32,
}

impl SequenceInfo {
    fn new(header: usize, extension: usize, seq: &SequenceHeader, ext: &SequenceExtension) -> Self {
        let width = seq.horizontal_size_value as u32 | (ext.horizontal_size_extension as u32) << 12;
        let height = seq.vertical_size_value as u32 | (ext.vertical_size_extension as u32) << 12;
        let mb_height = if ext.progressive_sequence {
            (height as usize + 15) / 16
        } else {
            2 * ((height as usize + 31) / 32)
        };
        let code = seq.frame_rate_code as usize;

        Self {
            header,
            extension,
            ghost: false,
            resolution: Resolution { width, height },
            mb_width: (width as usize + 15) / 16,
            mb_height,
            progressive: ext.progressive_sequence,
            aspect_ratio: seq.aspect_ratio,
            frame_rate_numerator: FRAME_RATE_NUMERATOR[code] * (ext.frame_rate_extension_n as u32 + 1),
            frame_rate_denominator: FRAME_RATE_DENOMINATOR[code]
                * (ext.frame_rate_extension_d as u32 + 1),
        }
    }

    /// Width of a pixel relative to its height.
    pub fn sample_aspect_ratio(&self) -> f64 {
        let width = self.resolution.width as f64;
        let height = self.resolution.height as f64;
        let (dar_width, dar_height) = match self.aspect_ratio {
            AspectRatio::Square => return 1.0,
            AspectRatio::Dar4x3 => (4.0, 3.0),
            AspectRatio::Dar16x9 => (16.0, 9.0),
            AspectRatio::Dar221x100 => (221.0, 100.0),
        };

        (height / dar_height) / (width / dar_width)
    }

    pub fn frame_rate(&self) -> f64 {
        self.frame_rate_numerator as f64 / self.frame_rate_denominator as f64
    }
}

/// Slice data of one picture, mapped in a single region.
pub struct SliceData<'a, S: ByteSource + 'a> {
    region: S::Region<'a>,
    base: usize,
}

impl<'a, S: ByteSource + 'a> SliceData<'a, S> {
    /// Returns the payload of `slice` (the bytes after its start code), whose start code is at
    /// `offset`.
    pub fn payload(&self, offset: usize, slice: &Slice) -> &[u8] {
        let start = offset + START_CODE_PREFIX_LENGTH + 1 - self.base;
        let end = offset + slice.len - self.base;
        self.region.get(start..end).unwrap_or(&[])
    }
}

/// A fully indexed elementary stream.
pub struct ElementaryStream<S: ByteSource> {
    source: S,
    /// All headers in file order. The first two are the ghost sequence header and extension.
    headers: Vec<Header>,
    /// Pictures in coded order.
    pictures: Vec<Picture>,
    sequences: Vec<SequenceInfo>,
    /// Coded index of every picture, in display order.
    displayed: Vec<usize>,
    first_sequence_offset: usize,
    time_base: u64,
    duration: u64,
}

impl<S: ByteSource> ElementaryStream<S> {
    pub fn new(source: S) -> Result<Self, StreamError> {
        Self::with_config(source, Default::default())
    }

    pub fn with_config(source: S, config: ScanConfig) -> Result<Self, StreamError> {
        // A start code prefix that begins at the end of a window must fit in its lookahead.
        let config = ScanConfig {
            block_size: config.block_size.max(START_CODE_PREFIX_LENGTH + 1),
            largest_header: config.largest_header.max(START_CODE_PREFIX_LENGTH),
        };

        let mut first_sequence_offset = None;
        scan(&source, &config, |buf, offset| {
            match buf.get(START_CODE_PREFIX_LENGTH) {
                None => Err(ParseError::InsufficientBits),
                Some(&SEQUENCE_HEADER_CODE) => {
                    first_sequence_offset = Some(offset);
                    Ok(ControlFlow::Break(()))
                }
                Some(_) => Ok(ControlFlow::Continue(())),
            }
        })?;
        let first_sequence_offset = first_sequence_offset.ok_or(ParseError::SequenceNotFound)?;
        debug!("first sequence header at offset {}", first_sequence_offset);

        let mut real_headers = Vec::new();
        scan(&source, &config, |buf, offset| {
            real_headers.push(Header::parse(&mut BitReader::new(buf), offset)?);
            Ok(ControlFlow::Continue(()))
        })?;

        let mut stream = Self {
            source,
            headers: Self::splice_ghost(real_headers)?,
            pictures: Vec::new(),
            sequences: Vec::new(),
            displayed: Vec::new(),
            first_sequence_offset,
            time_base: 0,
            duration: 0,
        };

        stream.link()?;
        stream.build_graph()?;

        debug!(
            "indexed {} headers, {} pictures, {} sequences",
            stream.headers.len(),
            stream.pictures.len(),
            stream.sequences.len()
        );

        Ok(stream)
    }

    /// Puts a copy of the first sequence header and its extension in front of all other headers,
    /// so that pictures preceding the first real sequence header have parameters.
    fn splice_ghost(real_headers: Vec<Header>) -> Result<Vec<Header>, ParseError> {
        let first = real_headers
            .iter()
            .position(Header::is_sequence)
            .ok_or(ParseError::SequenceNotFound)?;

        let HeaderKind::Sequence(seq) = &real_headers[first].kind else {
            unreachable!()
        };
        let ext = match real_headers.get(first + 1).map(|h| &h.kind) {
            Some(HeaderKind::SequenceExtension(ext)) => ext.clone(),
            _ => {
                return Err(ParseError::StreamInvalid(format!(
                    "sequence extension not found after offset {}",
                    real_headers[first].offset
                )))
            }
        };

        // Pictures linked to the copy are flagged as having unknown quantiser matrices, and borrow
        // the ones of the first sequence header.
        let ghost = (**seq).clone();

        let mut headers = Vec::with_capacity(real_headers.len() + 2);
        headers.push(Header {
            offset: 0,
            next: None,
            kind: HeaderKind::Sequence(Box::new(ghost)),
        });
        headers.push(Header {
            offset: 0,
            next: None,
            kind: HeaderKind::SequenceExtension(ext),
        });
        headers.extend(real_headers);

        let count = headers.len();
        for (i, header) in headers.iter_mut().enumerate() {
            header.next = if i + 1 < count { Some(i + 1) } else { None };
        }

        Ok(headers)
    }

    fn link(&mut self) -> Result<(), ParseError> {
        for (index, header) in self.headers.iter().enumerate() {
            if let HeaderKind::Picture(pic) = &header.kind {
                let coded = self.pictures.len();
                self.pictures.push(Picture::new(index, pic.picture_coding_type, coded));
            }
        }

        for index in 0..self.headers.len() {
            if matches!(self.headers[index].kind, HeaderKind::Slice(_)) {
                self.link_slice(index);
            }
        }

        let mut picture = 0;
        for index in 0..self.headers.len() {
            match &self.headers[index].kind {
                HeaderKind::Sequence(_) => self.link_sequence(index)?,
                HeaderKind::SequenceExtension(_) => self.link_sequence_extension(index)?,
                HeaderKind::Picture(_) => {
                    self.link_picture(index, picture)?;
                    picture += 1;
                }
                _ => (),
            }
        }

        Ok(())
    }

    fn link_slice(&mut self, index: usize) {
        let offset = self.headers[index].offset;
        let next = self.headers[index].next;
        let source_len = self.source.len();

        let (len, next_in_row, truncated) = match next.map(|n| &self.headers[n]) {
            None => {
                warn!("slice at offset {} is not followed by any header", offset);
                (source_len - offset, None, true)
            }
            Some(next_header) => {
                let same_row = match (&self.headers[index].kind, next_header.as_slice()) {
                    (HeaderKind::Slice(slice), Some(next_slice)) => {
                        slice.vertical_position == next_slice.vertical_position
                    }
                    _ => false,
                };
                (next_header.offset - offset, if same_row { next } else { None }, false)
            }
        };

        if let HeaderKind::Slice(slice) = &mut self.headers[index].kind {
            slice.len = len;
            slice.next_in_row = next_in_row;
            slice.truncated = truncated;
        }
    }

    fn link_sequence(&mut self, index: usize) -> Result<(), ParseError> {
        let HeaderKind::Sequence(seq) = &self.headers[index].kind else {
            unreachable!()
        };
        let found = self.headers[index]
            .next
            .and_then(|e| match &self.headers[e].kind {
                HeaderKind::SequenceExtension(ext) => Some((e, ext)),
                _ => None,
            });
        let Some((extension, ext)) = found else {
            return Err(ParseError::StreamInvalid(format!(
                "sequence extension not found at offset {}",
                self.headers[index].offset
            )));
        };

        let mut info = SequenceInfo::new(index, extension, seq, ext);
        info.ghost = self.sequences.is_empty();
        if info.resolution.height > MAX_VERTICAL_SIZE {
            return Err(ParseError::ConformanceLimitExceeded(format!(
                "vertical size {}",
                info.resolution.height
            )));
        }

        let sequence = self.sequences.len();
        let mut intra = index;
        let mut non_intra = index;
        let mut cursor = Some(extension);
        let mut picture = self.pictures.partition_point(|p| p.header < extension);

        while let Some(current) = cursor {
            match &self.headers[current].kind {
                HeaderKind::Sequence(_) => break,
                HeaderKind::QuantMatrixExtension(qm) => {
                    if qm.load_intra_quantiser_matrix {
                        intra = current;
                    }
                    if qm.load_non_intra_quantiser_matrix {
                        non_intra = current;
                    }
                }
                HeaderKind::Picture(_) => {
                    let pic = &mut self.pictures[picture];
                    assert_eq!(pic.header, current);
                    pic.sequence = sequence;
                    pic.intra_quantiser_matrix = intra;
                    pic.non_intra_quantiser_matrix = non_intra;
                    pic.unknown_quantiser_matrix = info.ghost;
                    picture += 1;
                }
                _ => (),
            }
            cursor = self.headers[current].next;
        }

        if let Some(next) = cursor {
            let HeaderKind::Sequence(next_seq) = &self.headers[next].kind else {
                unreachable!()
            };
            Self::check_sequence_change(seq, next_seq, self.headers[next].offset)?;
        }

        self.sequences.push(info);
        Ok(())
    }

    fn check_sequence_change(
        seq: &SequenceHeader,
        next: &SequenceHeader,
        offset: usize,
    ) -> Result<(), ParseError> {
        if seq.horizontal_size_value != next.horizontal_size_value
            || seq.vertical_size_value != next.vertical_size_value
            || seq.frame_rate_code != next.frame_rate_code
            || seq.vbv_buffer_size_value != next.vbv_buffer_size_value
            || seq.constrained_parameters_flag != next.constrained_parameters_flag
        {
            return Err(ParseError::ConformanceLimitExceeded(format!(
                "sequence parameters change at offset {}",
                offset
            )));
        }

        if seq.aspect_ratio != next.aspect_ratio || seq.bit_rate_value != next.bit_rate_value {
            warn!(
                "sequence at offset {} changes aspect ratio {:?} => {:?}, bit rate {} => {}",
                offset,
                seq.aspect_ratio,
                next.aspect_ratio,
                seq.bit_rate_value,
                next.bit_rate_value
            );
        }

        Ok(())
    }

    fn link_sequence_extension(&self, index: usize) -> Result<(), ParseError> {
        let HeaderKind::SequenceExtension(ext) = &self.headers[index].kind else {
            unreachable!()
        };

        let later = self.headers[index + 1..].iter().find_map(|h| match &h.kind {
            HeaderKind::SequenceExtension(later) => Some((h.offset, later)),
            _ => None,
        });

        match later {
            Some((offset, later)) if later != ext => Err(ParseError::ConformanceLimitExceeded(
                format!("sequence extension changes at offset {}", offset),
            )),
            _ => Ok(()),
        }
    }

    fn link_picture(&mut self, index: usize, picture: usize) -> Result<(), ParseError> {
        let extension = match self.headers[index].next.map(|e| &self.headers[e].kind) {
            Some(HeaderKind::PictureCodingExtension(ext)) => ext.clone(),
            _ => {
                return Err(ParseError::StreamInvalid(format!(
                    "picture coding extension not found at offset {}",
                    self.headers[index].offset
                )))
            }
        };

        let mb_height = self.sequences[self.pictures[picture].sequence].mb_height;
        let mut first_slice_in_row = vec![None; mb_height];
        let mut truncated = false;
        let mut extent = None;

        let mut cursor = self.headers[index].next;
        while let Some(current) = cursor {
            let header = &mut self.headers[current];
            match &mut header.kind {
                HeaderKind::Picture(_) => break,
                HeaderKind::Slice(slice) => {
                    let position = slice.vertical_position as usize;
                    if position == 0 || position > mb_height {
                        return Err(ParseError::StreamInvalid(format!(
                            "slice row {} outside picture of {} rows",
                            position, mb_height
                        )));
                    }

                    slice.picture = Some(picture);
                    truncated |= slice.truncated;
                    first_slice_in_row[slice.row()].get_or_insert(current);

                    let range = header.offset..header.offset + slice.len;
                    extent = Some(match extent {
                        None => range,
                        Some(e) => union(e, range),
                    });
                }
                _ => (),
            }
            cursor = header.next;
        }

        let pic = &mut self.pictures[picture];
        pic.extension = extension;
        pic.incomplete = truncated || first_slice_in_row.iter().any(Option::is_none);
        pic.first_slice_in_row = first_slice_in_row;
        if let Some(extent) = extent {
            pic.extend_slice_extent(extent);
        }

        if pic.incomplete {
            warn!(
                "picture at offset {} is missing slices",
                self.headers[index].offset
            );
        }

        Ok(())
    }

    fn build_graph(&mut self) -> Result<(), ParseError> {
        let mut graph = GraphBuilder::new();
        let mut picture = 0;
        for header in &self.headers {
            match header.kind {
                HeaderKind::Picture(_) => {
                    graph.add_picture(&mut self.pictures, picture);
                    picture += 1;
                }
                HeaderKind::SequenceEnd => graph.sequence_end(&mut self.pictures),
                _ => (),
            }
        }
        self.displayed = graph.finish(&mut self.pictures);

        for pic in &self.pictures {
            if pic.broken {
                warn!("picture {}", pic.describe(|i| self.pictures[i].display_order));
            }
        }

        // Every stream has a real sequence after the ghost.
        let timing = &self.sequences[1];
        self.time_base = 2 * timing.frame_rate_numerator as u64;
        let sequences = &self.sequences;
        self.duration = assign_presentation_times(
            &mut self.pictures,
            &self.displayed,
            timing.frame_rate_denominator as u64,
            |pic| sequences[pic.sequence].progressive,
        )?;

        Ok(())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Pictures in coded order.
    pub fn pictures(&self) -> &[Picture] {
        &self.pictures
    }

    pub fn picture(&self, coded: usize) -> &Picture {
        &self.pictures[coded]
    }

    /// Sequences in file order. The first one is the ghost.
    pub fn sequences(&self) -> &[SequenceInfo] {
        &self.sequences
    }

    pub fn sequence_of(&self, picture: &Picture) -> &SequenceInfo {
        &self.sequences[picture.sequence]
    }

    /// Parameters of the first sequence header present in the stream.
    pub fn first_sequence(&self) -> &SequenceInfo {
        &self.sequences[1]
    }

    pub fn first_sequence_offset(&self) -> usize {
        self.first_sequence_offset
    }

    /// Coded index of every picture, in display order.
    pub fn displayed(&self) -> &[usize] {
        &self.displayed
    }

    pub fn picture_by_display(&self, display: usize) -> Option<&Picture> {
        self.displayed.get(display).map(|&coded| &self.pictures[coded])
    }

    fn matrix(&self, header: usize, intra: bool) -> &[u8; 64] {
        match &self.headers[header].kind {
            HeaderKind::Sequence(seq) if intra => &seq.intra_quantiser_matrix,
            HeaderKind::Sequence(seq) => &seq.non_intra_quantiser_matrix,
            HeaderKind::QuantMatrixExtension(qm) if intra => &qm.intra_quantiser_matrix,
            HeaderKind::QuantMatrixExtension(qm) => &qm.non_intra_quantiser_matrix,
            kind => panic!("header {} holds no quantiser matrix: {:?}", header, kind),
        }
    }

    /// Intra quantiser matrix of `picture`, in raster order.
    pub fn intra_quantiser_matrix(&self, picture: &Picture) -> &[u8; 64] {
        self.matrix(picture.intra_quantiser_matrix, true)
    }

    /// Non-intra quantiser matrix of `picture`, in raster order.
    pub fn non_intra_quantiser_matrix(&self, picture: &Picture) -> &[u8; 64] {
        self.matrix(picture.non_intra_quantiser_matrix, false)
    }

    /// Returns the slices of macroblock row `row` of `picture`, as `(start code offset, slice)`.
    pub fn slices_in_row<'a>(
        &'a self,
        picture: &Picture,
        row: usize,
    ) -> impl Iterator<Item = (usize, &'a Slice)> + 'a {
        let first = picture.first_slice_in_row.get(row).copied().flatten();
        std::iter::successors(first, move |&index| {
            self.headers[index].as_slice().and_then(|s| s.next_in_row)
        })
        .filter_map(move |index| {
            let header = &self.headers[index];
            header.as_slice().map(|slice| (header.offset, slice))
        })
    }

    /// Maps all slice data of `picture` at once. Returns `None` if the picture has no slices.
    pub fn map_slices(&self, picture: &Picture) -> Result<Option<SliceData<'_, S>>, SourceError> {
        let Some(extent) = &picture.slice_extent else {
            return Ok(None);
        };

        Ok(Some(SliceData {
            region: self.source.map(extent.start, extent.len())?,
            base: extent.start,
        }))
    }

    /// Units per second of presentation times.
    pub fn time_base(&self) -> u64 {
        self.time_base
    }

    /// End of the last picture, in [`Self::time_base`] units.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn presentation_seconds(&self, picture: &Picture) -> f64 {
        picture.presentation_time as f64 / self.time_base as f64
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration as f64 / self.time_base as f64
    }
}

fn union(a: Range<usize>, b: Range<usize>) -> Range<usize> {
    a.start.min(b.start)..a.end.max(b.end)
}

/// Calls `visit` with the bytes from every start code in `source` onwards, along with the start
/// code's offset.
///
/// The source is mapped one window at a time. Each window has `largest_header` bytes of
/// lookahead, and a visitor that still runs out of bits makes the scan resume at that start code
/// with a larger window. Running out of bits at the end of the source ends the scan.
fn scan<S, F>(source: &S, config: &ScanConfig, mut visit: F) -> Result<(), StreamError>
where
    S: ByteSource,
    F: FnMut(&[u8], usize) -> Result<ControlFlow<()>, ParseError>,
{
    let total = source.len();
    let mut anchor = 0;
    let mut window = config.block_size;

    while anchor + START_CODE_PREFIX_LENGTH <= total {
        let len = (window + config.largest_header).min(total - anchor);
        let at_end = anchor + len == total;
        let limit = if at_end { len } else { window };
        let mut next_anchor = anchor + window;

        let region = source.map(anchor, len)?;
        let mut pos = 0;
        while let Some(i) = find_start_code(&region, pos) {
            if i >= limit {
                break;
            }

            match visit(&region[i..], anchor + i) {
                Ok(ControlFlow::Continue(())) => (),
                Ok(ControlFlow::Break(())) => return Ok(()),
                Err(ParseError::InsufficientBits) if at_end => {
                    warn!("stream ends inside the header at offset {}", anchor + i);
                    return Ok(());
                }
                Err(ParseError::InsufficientBits) => {
                    next_anchor = anchor + i;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            pos = i + 1;
        }

        if at_end {
            break;
        }

        if next_anchor == anchor {
            window *= 2;
        } else {
            window = config.block_size;
        }
        anchor = next_anchor;
    }

    Ok(())
}
