// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Slice decoding backends.
//!
//! A backend provides the macroblock layer: it reconstructs the pixels of one slice into a
//! macroblock row, reading motion compensated predictions from the reference frames. The decoder
//! only guarantees that every reference row the slice may reach is rendered before the call.

use crate::codec::mpeg2::parser::CodingType;
use crate::codec::mpeg2::picture::Picture;
use crate::codec::mpeg2::stream::ElementaryStream;
use crate::codec::mpeg2::tables::ALTERNATE_SCAN;
use crate::codec::mpeg2::tables::NON_LINEAR_QUANTISER_SCALE;
use crate::codec::mpeg2::tables::ZIGZAG_SCAN;
use crate::source::ByteSource;
use crate::video_frame::Frame;
use crate::video_frame::MacroblockRow;
use crate::Resolution;

pub mod dummy;

/// Quantiser matrices pre-multiplied by every quantiser scale:
/// `prescale[intra or non-intra][quantiser_scale_code][coefficient]`.
pub type PrescaleTables = [[[u16; 64]; 32]; 2];

pub const PRESCALE_INTRA: usize = 0;
pub const PRESCALE_NON_INTRA: usize = 1;

/// Everything a backend needs to know about a picture to decode its slices.
#[derive(Debug, Clone)]
pub struct SliceParams {
    /// Index of the picture in coded order.
    pub picture: usize,
    pub resolution: Resolution,
    pub mb_width: usize,
    pub mb_height: usize,
    pub coding_type: CodingType,
    /// `f_code[s][t]` as in the picture coding extension.
    pub f_code: [[u8; 2]; 2],
    pub intra_dc_precision: u8,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub top_field_first: bool,
    /// Coefficient scan order, mapping scan positions to raster positions.
    pub scan: &'static [u8; 64],
    pub prescale: Box<PrescaleTables>,
}

impl SliceParams {
    pub fn new<S: ByteSource>(stream: &ElementaryStream<S>, picture: usize) -> Self {
        let pic = stream.picture(picture);
        let seq = stream.sequence_of(pic);
        let ext = &pic.extension;

        Self {
            picture,
            resolution: seq.resolution,
            mb_width: seq.mb_width,
            mb_height: seq.mb_height,
            coding_type: pic.coding_type,
            f_code: ext.f_code,
            intra_dc_precision: ext.intra_dc_precision,
            frame_pred_frame_dct: ext.frame_pred_frame_dct,
            concealment_motion_vectors: ext.concealment_motion_vectors,
            q_scale_type: ext.q_scale_type,
            intra_vlc_format: ext.intra_vlc_format,
            top_field_first: ext.top_field_first,
            scan: if ext.alternate_scan {
                &ALTERNATE_SCAN
            } else {
                &ZIGZAG_SCAN
            },
            prescale: Box::new(prescale_tables(stream, pic)),
        }
    }
}

fn prescale_tables<S: ByteSource>(stream: &ElementaryStream<S>, pic: &Picture) -> PrescaleTables {
    let matrices = [
        stream.intra_quantiser_matrix(pic),
        stream.non_intra_quantiser_matrix(pic),
    ];

    let mut tables = [[[0u16; 64]; 32]; 2];
    for (table, matrix) in tables.iter_mut().zip(matrices) {
        for (code, scaled) in table.iter_mut().enumerate() {
            let scale = if pic.extension.q_scale_type {
                NON_LINEAR_QUANTISER_SCALE[code]
            } else {
                (code as u16) << 1
            };
            for (value, &weight) in scaled.iter_mut().zip(matrix.iter()) {
                *value = scale * weight as u16;
            }
        }
    }

    tables
}

/// Reference frames of the picture being decoded. Only rows the slice can reach are guaranteed to
/// be rendered.
#[derive(Debug, Clone, Copy, Default)]
pub struct References<'a> {
    pub forward: Option<&'a Frame>,
    pub backward: Option<&'a Frame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceStatus {
    Ok,
    /// The slice data was not valid. Whatever could be reconstructed has been written.
    Corrupt,
}

/// The macroblock layer decoder.
pub trait SliceBackend: Send + Sync {
    /// Decodes the slice whose payload (the bytes after the start code) is `data` into `target`,
    /// the macroblock row at `row`.
    fn decode_slice(
        &self,
        params: &SliceParams,
        row: usize,
        target: &mut MacroblockRow,
        refs: References,
        data: &[u8],
    ) -> anyhow::Result<SliceStatus>;
}
