// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Writes MPEG-2 headers from their parsed representation.
//!
//! This is the inverse of [`crate::codec::mpeg2::parser`] and is used to build synthetic
//! elementary streams. Slice payloads are copied verbatim, no macroblock data is generated.

use std::io::Write;

use thiserror::Error;

use crate::bitstream_utils::BitWriter;
use crate::bitstream_utils::BitWriterError;
use crate::codec::mpeg2::parser::CodingType;
use crate::codec::mpeg2::parser::ExtensionId;
use crate::codec::mpeg2::parser::GroupHeader;
use crate::codec::mpeg2::parser::PictureCodingExtension;
use crate::codec::mpeg2::parser::PictureHeader;
use crate::codec::mpeg2::parser::Profile;
use crate::codec::mpeg2::parser::QuantMatrixExtension;
use crate::codec::mpeg2::parser::SequenceExtension;
use crate::codec::mpeg2::parser::SequenceHeader;
use crate::codec::mpeg2::parser::CHROMA_FORMAT_420;
use crate::codec::mpeg2::parser::EXTENSION_START_CODE;
use crate::codec::mpeg2::parser::GROUP_START_CODE;
use crate::codec::mpeg2::parser::PICTURE_START_CODE;
use crate::codec::mpeg2::parser::SEQUENCE_END_CODE;
use crate::codec::mpeg2::parser::SEQUENCE_HEADER_CODE;
use crate::codec::mpeg2::parser::SLICE_START_CODE_MAX;
use crate::codec::mpeg2::parser::SLICE_START_CODE_MIN;
use crate::codec::mpeg2::parser::USER_DATA_START_CODE;
use crate::codec::mpeg2::tables::ZIGZAG_SCAN;

#[derive(Error, Debug)]
pub enum SynthesizerError {
    #[error("tried to synthesize unsupported settings: {0}")]
    Unsupported(&'static str),
    #[error(transparent)]
    BitWriter(#[from] BitWriterError),
}

pub type SynthesizerResult<T> = Result<T, SynthesizerError>;

/// Writes headers one after the other to [`std::io::Write`].
pub struct Synthesizer<W: Write> {
    writer: BitWriter<W>,
}

impl<W: Write> Synthesizer<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: BitWriter::new(out),
        }
    }

    fn u<T: Into<u32>>(&mut self, bits: usize, value: T) -> SynthesizerResult<()> {
        self.writer.write_f(bits, value)?;
        Ok(())
    }

    fn flag(&mut self, value: bool) -> SynthesizerResult<()> {
        self.writer.write_bit(value)?;
        Ok(())
    }

    fn matrix(&mut self, matrix: &[u8; 64]) -> SynthesizerResult<()> {
        for &pos in ZIGZAG_SCAN.iter() {
            self.u(8, matrix[pos as usize])?;
        }
        Ok(())
    }

    fn extension_start(&mut self, id: ExtensionId) -> SynthesizerResult<()> {
        self.writer.write_start_code(EXTENSION_START_CODE)?;
        self.u(4, id as u8)
    }

    pub fn sequence(&mut self, seq: &SequenceHeader) -> SynthesizerResult<&mut Self> {
        self.writer.write_start_code(SEQUENCE_HEADER_CODE)?;
        self.u(12, seq.horizontal_size_value)?;
        self.u(12, seq.vertical_size_value)?;
        self.u(4, seq.aspect_ratio as u8)?;
        self.u(4, seq.frame_rate_code)?;
        self.u(18, seq.bit_rate_value)?;
        // marker_bit
        self.flag(true)?;
        self.u(10, seq.vbv_buffer_size_value)?;
        self.flag(seq.constrained_parameters_flag)?;

        self.flag(seq.load_intra_quantiser_matrix)?;
        if seq.load_intra_quantiser_matrix {
            self.matrix(&seq.intra_quantiser_matrix)?;
        }
        self.flag(seq.load_non_intra_quantiser_matrix)?;
        if seq.load_non_intra_quantiser_matrix {
            self.matrix(&seq.non_intra_quantiser_matrix)?;
        }

        Ok(self)
    }

    pub fn sequence_extension(&mut self, ext: &SequenceExtension) -> SynthesizerResult<&mut Self> {
        self.extension_start(ExtensionId::Sequence)?;
        self.flag(ext.escape_bit)?;
        self.u(3, ext.profile)?;
        self.u(4, ext.level)?;
        self.flag(ext.progressive_sequence)?;
        self.u(2, ext.chroma_format)?;
        self.u(2, ext.horizontal_size_extension)?;
        self.u(2, ext.vertical_size_extension)?;
        self.u(12, ext.bit_rate_extension)?;
        self.flag(true)?;
        self.u(8, ext.vbv_buffer_size_extension)?;
        self.flag(ext.low_delay)?;
        self.u(2, ext.frame_rate_extension_n)?;
        self.u(5, ext.frame_rate_extension_d)?;

        Ok(self)
    }

    pub fn quant_matrix_extension(
        &mut self,
        ext: &QuantMatrixExtension,
    ) -> SynthesizerResult<&mut Self> {
        self.extension_start(ExtensionId::QuantMatrix)?;
        self.flag(ext.load_intra_quantiser_matrix)?;
        if ext.load_intra_quantiser_matrix {
            self.matrix(&ext.intra_quantiser_matrix)?;
        }
        self.flag(ext.load_non_intra_quantiser_matrix)?;
        if ext.load_non_intra_quantiser_matrix {
            self.matrix(&ext.non_intra_quantiser_matrix)?;
        }
        // load_chroma_intra_quantiser_matrix, load_chroma_non_intra_quantiser_matrix
        self.flag(false)?;
        self.flag(false)?;

        Ok(self)
    }

    pub fn group(&mut self, group: &GroupHeader) -> SynthesizerResult<&mut Self> {
        self.writer.write_start_code(GROUP_START_CODE)?;
        self.u(25, group.time_code)?;
        self.flag(group.closed_gop)?;
        self.flag(group.broken_link)?;

        Ok(self)
    }

    pub fn picture(&mut self, pic: &PictureHeader) -> SynthesizerResult<&mut Self> {
        self.writer.write_start_code(PICTURE_START_CODE)?;
        self.u(10, pic.temporal_reference)?;
        self.u(3, pic.picture_coding_type as u8)?;
        self.u(16, pic.vbv_delay)?;

        // MPEG-1 motion fields are fixed in MPEG-2: full_pel_*_vector = 0, *_f_code = 7.
        if pic.picture_coding_type != CodingType::I {
            self.flag(false)?;
            self.u(3, 7u8)?;
        }
        if pic.picture_coding_type == CodingType::B {
            self.flag(false)?;
            self.u(3, 7u8)?;
        }
        // extra_bit_picture
        self.flag(false)?;

        Ok(self)
    }

    pub fn picture_coding_extension(
        &mut self,
        ext: &PictureCodingExtension,
    ) -> SynthesizerResult<&mut Self> {
        self.extension_start(ExtensionId::PictureCoding)?;
        for code in ext.f_code.iter().flatten() {
            self.u(4, *code)?;
        }
        self.u(2, ext.intra_dc_precision)?;
        self.u(2, ext.picture_structure)?;
        self.flag(ext.top_field_first)?;
        self.flag(ext.frame_pred_frame_dct)?;
        self.flag(ext.concealment_motion_vectors)?;
        self.flag(ext.q_scale_type)?;
        self.flag(ext.intra_vlc_format)?;
        self.flag(ext.alternate_scan)?;
        self.flag(ext.repeat_first_field)?;
        self.flag(ext.chroma_420_type)?;
        self.flag(ext.progressive_frame)?;
        // composite_display_flag
        self.flag(false)?;

        Ok(self)
    }

    /// Writes a slice start code followed by `payload`, which must not contain a start code.
    pub fn slice(&mut self, vertical_position: u8, payload: &[u8]) -> SynthesizerResult<&mut Self> {
        if !(SLICE_START_CODE_MIN..=SLICE_START_CODE_MAX).contains(&vertical_position) {
            return Err(SynthesizerError::Unsupported("slice_vertical_position out of range"));
        }
        if payload.windows(3).any(|w| w == [0, 0, 1]) {
            return Err(SynthesizerError::Unsupported("start code emulation in slice payload"));
        }

        self.writer.write_start_code(vertical_position)?;
        self.writer.write_bytes(payload)?;

        Ok(self)
    }

    pub fn user_data(&mut self, data: &[u8]) -> SynthesizerResult<&mut Self> {
        self.writer.write_start_code(USER_DATA_START_CODE)?;
        self.writer.write_bytes(data)?;

        Ok(self)
    }

    pub fn sequence_end(&mut self) -> SynthesizerResult<&mut Self> {
        self.writer.write_start_code(SEQUENCE_END_CODE)?;
        Ok(self)
    }

    pub fn flush(&mut self) -> SynthesizerResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Description of a synthetic stream: one sequence with frame pictures whose slices carry
/// short opaque payloads.
#[derive(Clone, Debug)]
pub struct StreamParams {
    pub width: u16,
    pub height: u16,
    pub frame_rate_code: u8,
    pub progressive_sequence: bool,
    /// `f_code` used for every prediction direction and component.
    pub f_code: u8,
    /// Picture types in coded order.
    pub pictures: Vec<CodingType>,
    /// Number of slices each macroblock row is split into.
    pub slices_per_row: usize,
    /// Pictures written before the sequence header, taken from the front of `pictures`.
    pub leading_pictures: usize,
    /// Terminate the stream with a sequence end code.
    pub sequence_end: bool,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            frame_rate_code: 3,
            progressive_sequence: true,
            f_code: 2,
            pictures: vec![CodingType::I, CodingType::P, CodingType::B],
            slices_per_row: 1,
            leading_pictures: 0,
            sequence_end: true,
        }
    }
}

impl StreamParams {
    pub fn mb_height(&self) -> usize {
        if self.progressive_sequence {
            (self.height as usize + 15) / 16
        } else {
            2 * ((self.height as usize + 31) / 32)
        }
    }

    pub fn sequence_header(&self) -> SequenceHeader {
        SequenceHeader {
            horizontal_size_value: self.width & 0xfff,
            vertical_size_value: self.height & 0xfff,
            frame_rate_code: self.frame_rate_code,
            bit_rate_value: 0x3ffff,
            vbv_buffer_size_value: 112,
            ..Default::default()
        }
    }

    pub fn sequence_extension(&self) -> SequenceExtension {
        SequenceExtension {
            profile: Profile::Main as u8,
            level: 8,
            progressive_sequence: self.progressive_sequence,
            chroma_format: CHROMA_FORMAT_420,
            horizontal_size_extension: (self.width >> 12) as u8,
            vertical_size_extension: (self.height >> 12) as u8,
            ..Default::default()
        }
    }

    /// Payload of slice `part` of `row` in the picture coded at `coded`. The bytes are never zero
    /// so no start code can be emulated.
    pub fn slice_payload(coded: usize, row: usize, part: usize) -> [u8; 3] {
        [
            (16 + (coded * 37 + row * 11) % 224) as u8,
            (16 + (coded * 13 + row * 7) % 224) as u8,
            (1 + part % 255) as u8,
        ]
    }

    fn write_picture<W: Write>(
        &self,
        synth: &mut Synthesizer<W>,
        coded: usize,
        coding_type: CodingType,
    ) -> SynthesizerResult<()> {
        synth
            .picture(&PictureHeader {
                temporal_reference: coded as u16 & 0x3ff,
                picture_coding_type: coding_type,
                vbv_delay: 0xffff,
            })?
            .picture_coding_extension(&PictureCodingExtension {
                f_code: [[self.f_code; 2]; 2],
                progressive_frame: self.progressive_sequence,
                ..Default::default()
            })?;

        for row in 0..self.mb_height() {
            for part in 0..self.slices_per_row {
                synth.slice((row + 1) as u8, &Self::slice_payload(coded, row, part))?;
            }
        }

        Ok(())
    }

    /// Writes the stream to `out`.
    pub fn write<W: Write>(&self, out: W) -> SynthesizerResult<()> {
        if self.mb_height() == 0 || self.mb_height() > SLICE_START_CODE_MAX as usize {
            return Err(SynthesizerError::Unsupported("picture height"));
        }

        let mut synth = Synthesizer::new(out);
        let leading = self.leading_pictures.min(self.pictures.len());

        for (coded, coding_type) in self.pictures[..leading].iter().enumerate() {
            self.write_picture(&mut synth, coded, *coding_type)?;
        }

        synth
            .sequence(&self.sequence_header())?
            .sequence_extension(&self.sequence_extension())?
            .group(&GroupHeader {
                time_code: 1 << 12,
                closed_gop: leading == 0,
                broken_link: false,
            })?;

        for (coded, coding_type) in self.pictures.iter().enumerate().skip(leading) {
            self.write_picture(&mut synth, coded, *coding_type)?;
        }

        if self.sequence_end {
            synth.sequence_end()?;
        }

        synth.flush()
    }

    pub fn to_vec(&self) -> SynthesizerResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }
}
