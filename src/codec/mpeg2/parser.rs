// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MPEG-2 header parsing.
//!
//! Every start code in an elementary stream becomes one [`Header`]. Headers are parsed in
//! isolation from a [`BitReader`] positioned at their start code, and validate the constraints
//! this decoder places on the stream (frame pictures, 4:2:0, Simple or Main profile) at parse
//! time. Relations between headers are resolved later by the stream assembler.

// Can't reasonably expect client code to consume everything that has been parsed.
#![allow(dead_code)]

use enumn::N;
use thiserror::Error;

use crate::bitstream_utils::BitReader;
use crate::bitstream_utils::ReadBitsError;
use crate::codec::mpeg2::tables::DEFAULT_INTRA_QUANTISER_MATRIX;
use crate::codec::mpeg2::tables::DEFAULT_NON_INTRA_QUANTISER_VALUE;
use crate::codec::mpeg2::tables::ZIGZAG_SCAN;

pub const PICTURE_START_CODE: u8 = 0x00;
pub const SLICE_START_CODE_MIN: u8 = 0x01;
pub const SLICE_START_CODE_MAX: u8 = 0xaf;
pub const USER_DATA_START_CODE: u8 = 0xb2;
pub const SEQUENCE_HEADER_CODE: u8 = 0xb3;
pub const SEQUENCE_ERROR_CODE: u8 = 0xb4;
pub const EXTENSION_START_CODE: u8 = 0xb5;
pub const SEQUENCE_END_CODE: u8 = 0xb7;
pub const GROUP_START_CODE: u8 = 0xb8;
/// Start codes from this value upwards belong to the system layer.
pub const SYSTEM_START_CODE_MIN: u8 = 0xb9;

/// Largest vertical size this decoder accepts.
pub const MAX_VERTICAL_SIZE: u32 = 2800;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no sequence header found in the stream")]
    SequenceNotFound,
    #[error("stream exceeds decoder conformance limits: {0}")]
    ConformanceLimitExceeded(String),
    #[error("invalid stream: {0}")]
    StreamInvalid(String),
    #[error("system start code {0:#04x} found, not an elementary stream")]
    NotElementaryStream(u8),
    #[error("header is truncated")]
    InsufficientBits,
}

impl From<ReadBitsError> for ParseError {
    fn from(err: ReadBitsError) -> Self {
        match err {
            ReadBitsError::InsufficientBits => ParseError::InsufficientBits,
            ReadBitsError::TooManyBitsRequested(_) => ParseError::StreamInvalid(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

fn invalid(what: impl Into<String>) -> ParseError {
    ParseError::StreamInvalid(what.into())
}

fn limit(what: impl Into<String>) -> ParseError {
    ParseError::ConformanceLimitExceeded(what.into())
}

/// `extension_start_code_identifier` values (table 6-2).
#[derive(N, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtensionId {
    Sequence = 1,
    SequenceDisplay = 2,
    QuantMatrix = 3,
    Copyright = 4,
    SequenceScalable = 5,
    PictureDisplay = 7,
    PictureCoding = 8,
    PictureSpatialScalable = 9,
    PictureTemporalScalable = 10,
}

#[derive(N, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square = 1,
    Dar4x3 = 2,
    Dar16x9 = 3,
    Dar221x100 = 4,
}

#[derive(N, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Main = 4,
    Simple = 5,
}

#[derive(N, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodingType {
    I = 1,
    P = 2,
    B = 3,
}

impl CodingType {
    pub fn as_char(&self) -> char {
        match self {
            CodingType::I => 'I',
            CodingType::P => 'P',
            CodingType::B => 'B',
        }
    }
}

/// `picture_structure` value of a frame picture.
pub const FRAME_PICTURE: u8 = 3;
/// `chroma_format` value of 4:2:0.
pub const CHROMA_FORMAT_420: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceHeader {
    pub horizontal_size_value: u16,
    pub vertical_size_value: u16,
    pub aspect_ratio: AspectRatio,
    pub frame_rate_code: u8,
    pub bit_rate_value: u32,
    pub vbv_buffer_size_value: u16,
    pub constrained_parameters_flag: bool,
    pub load_intra_quantiser_matrix: bool,
    pub load_non_intra_quantiser_matrix: bool,
    /// In raster order.
    pub intra_quantiser_matrix: [u8; 64],
    /// In raster order.
    pub non_intra_quantiser_matrix: [u8; 64],
}

impl Default for SequenceHeader {
    fn default() -> Self {
        Self {
            horizontal_size_value: 0,
            vertical_size_value: 0,
            aspect_ratio: AspectRatio::Square,
            frame_rate_code: 3,
            bit_rate_value: 0,
            vbv_buffer_size_value: 0,
            constrained_parameters_flag: false,
            load_intra_quantiser_matrix: false,
            load_non_intra_quantiser_matrix: false,
            intra_quantiser_matrix: DEFAULT_INTRA_QUANTISER_MATRIX,
            non_intra_quantiser_matrix: [DEFAULT_NON_INTRA_QUANTISER_VALUE; 64],
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SequenceExtension {
    pub escape_bit: bool,
    pub profile: u8,
    pub level: u8,
    pub progressive_sequence: bool,
    pub chroma_format: u8,
    pub horizontal_size_extension: u8,
    pub vertical_size_extension: u8,
    pub bit_rate_extension: u16,
    pub vbv_buffer_size_extension: u8,
    pub low_delay: bool,
    pub frame_rate_extension_n: u8,
    pub frame_rate_extension_d: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupHeader {
    pub time_code: u32,
    pub closed_gop: bool,
    pub broken_link: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PictureHeader {
    pub temporal_reference: u16,
    pub picture_coding_type: CodingType,
    pub vbv_delay: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PictureCodingExtension {
    /// `f_code[s][t]`: `s` is 0 for forward and 1 for backward prediction, `t` is 0 for the
    /// horizontal and 1 for the vertical component.
    pub f_code: [[u8; 2]; 2],
    pub intra_dc_precision: u8,
    pub picture_structure: u8,
    pub top_field_first: bool,
    pub frame_pred_frame_dct: bool,
    pub concealment_motion_vectors: bool,
    pub q_scale_type: bool,
    pub intra_vlc_format: bool,
    pub alternate_scan: bool,
    pub repeat_first_field: bool,
    pub chroma_420_type: bool,
    pub progressive_frame: bool,
}

impl Default for PictureCodingExtension {
    fn default() -> Self {
        Self {
            f_code: [[15; 2]; 2],
            intra_dc_precision: 0,
            picture_structure: FRAME_PICTURE,
            top_field_first: false,
            frame_pred_frame_dct: true,
            concealment_motion_vectors: false,
            q_scale_type: false,
            intra_vlc_format: false,
            alternate_scan: false,
            repeat_first_field: false,
            chroma_420_type: true,
            progressive_frame: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantMatrixExtension {
    pub load_intra_quantiser_matrix: bool,
    /// In raster order, only meaningful if loaded.
    pub intra_quantiser_matrix: [u8; 64],
    pub load_non_intra_quantiser_matrix: bool,
    /// In raster order, only meaningful if loaded.
    pub non_intra_quantiser_matrix: [u8; 64],
}

/// A slice header. Only the start code is parsed here, the payload is left to the macroblock
/// decoder. The remaining fields are filled in when the stream is linked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Slice {
    /// `slice_vertical_position`, 1-based.
    pub vertical_position: u8,
    /// Bytes from the start code to the next header.
    pub len: usize,
    /// Next slice of the same macroblock row, if the row is split.
    pub next_in_row: Option<usize>,
    /// Index of the owning picture, in coded order.
    pub picture: Option<usize>,
    /// No header follows this slice, so its extent is a guess.
    pub truncated: bool,
}

impl Slice {
    /// Returns the 0-based macroblock row of this slice.
    pub fn row(&self) -> usize {
        self.vertical_position as usize - 1
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeaderKind {
    Sequence(Box<SequenceHeader>),
    SequenceExtension(SequenceExtension),
    Group(GroupHeader),
    Picture(PictureHeader),
    PictureCodingExtension(PictureCodingExtension),
    QuantMatrixExtension(Box<QuantMatrixExtension>),
    Slice(Slice),
    SequenceEnd,
    UserData,
    SequenceError,
    Reserved(u8),
    OtherExtension(u8),
}

/// One start code of the stream and what follows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Byte offset of the start code in the stream.
    pub offset: usize,
    /// Index of the following header in file order.
    pub next: Option<usize>,
    pub kind: HeaderKind,
}

fn read_matrix(r: &mut BitReader, load: bool, default: &[u8; 64]) -> Result<[u8; 64]> {
    let mut matrix = [0u8; 64];
    for (i, &pos) in ZIGZAG_SCAN.iter().enumerate() {
        let value = if load { r.read_bits(8)? } else { default[i] };
        if value == 0 {
            return Err(invalid("zero quantiser matrix entry"));
        }
        matrix[pos as usize] = value;
    }

    Ok(matrix)
}

fn read_marker(r: &mut BitReader, what: &str) -> Result<()> {
    if !r.read_bit()? {
        return Err(invalid(format!("missing marker bit in {}", what)));
    }
    Ok(())
}

impl Header {
    /// Parses the header whose start code is at the reader's first bit. `offset` is the position
    /// of that start code in the stream.
    pub fn parse(r: &mut BitReader, offset: usize) -> Result<Header> {
        let prefix: u32 = r.read_bits(24)?;
        if prefix != 0x000001 {
            return Err(invalid(format!("no start code at offset {}", offset)));
        }

        let code: u8 = r.read_bits(8)?;
        let kind = match code {
            SLICE_START_CODE_MIN..=SLICE_START_CODE_MAX => HeaderKind::Slice(Slice {
                vertical_position: code,
                ..Default::default()
            }),
            code if code >= SYSTEM_START_CODE_MIN => {
                return Err(ParseError::NotElementaryStream(code))
            }
            PICTURE_START_CODE => HeaderKind::Picture(Self::parse_picture(r)?),
            SEQUENCE_HEADER_CODE => HeaderKind::Sequence(Box::new(Self::parse_sequence(r)?)),
            EXTENSION_START_CODE => {
                let id: u8 = r.read_bits(4)?;
                match ExtensionId::n(id) {
                    Some(ExtensionId::Sequence) => {
                        HeaderKind::SequenceExtension(Self::parse_sequence_extension(r)?)
                    }
                    Some(ExtensionId::QuantMatrix) => {
                        HeaderKind::QuantMatrixExtension(Box::new(Self::parse_quant_matrix(r)?))
                    }
                    Some(ExtensionId::PictureCoding) => {
                        HeaderKind::PictureCodingExtension(Self::parse_picture_coding(r)?)
                    }
                    _ => HeaderKind::OtherExtension(id),
                }
            }
            SEQUENCE_END_CODE => HeaderKind::SequenceEnd,
            GROUP_START_CODE => HeaderKind::Group(Self::parse_group(r)?),
            USER_DATA_START_CODE => HeaderKind::UserData,
            SEQUENCE_ERROR_CODE => HeaderKind::SequenceError,
            // 0xb0, 0xb1 and 0xb6.
            code => HeaderKind::Reserved(code),
        };

        Ok(Header {
            offset,
            next: None,
            kind,
        })
    }

    fn parse_sequence(r: &mut BitReader) -> Result<SequenceHeader> {
        let horizontal_size_value = r.read_bits(12)?;
        let vertical_size_value = r.read_bits(12)?;

        let aspect: u8 = r.read_bits(4)?;
        let aspect_ratio = AspectRatio::n(aspect)
            .ok_or_else(|| invalid(format!("aspect_ratio_information {}", aspect)))?;

        let frame_rate_code: u8 = r.read_bits(4)?;
        if !(1..=8).contains(&frame_rate_code) {
            return Err(invalid(format!("frame_rate_code {}", frame_rate_code)));
        }

        let bit_rate_value = r.read_bits(18)?;
        read_marker(r, "sequence header")?;
        let vbv_buffer_size_value = r.read_bits(10)?;

        let constrained_parameters_flag = r.read_bit()?;
        if constrained_parameters_flag {
            return Err(invalid("constrained_parameters_flag is set"));
        }

        let load_intra_quantiser_matrix = r.read_bit()?;
        let intra_quantiser_matrix = read_matrix(
            r,
            load_intra_quantiser_matrix,
            &Self::default_intra_in_scan_order(),
        )?;
        let load_non_intra_quantiser_matrix = r.read_bit()?;
        let non_intra_quantiser_matrix = read_matrix(
            r,
            load_non_intra_quantiser_matrix,
            &[DEFAULT_NON_INTRA_QUANTISER_VALUE; 64],
        )?;

        Ok(SequenceHeader {
            horizontal_size_value,
            vertical_size_value,
            aspect_ratio,
            frame_rate_code,
            bit_rate_value,
            vbv_buffer_size_value,
            constrained_parameters_flag,
            load_intra_quantiser_matrix,
            load_non_intra_quantiser_matrix,
            intra_quantiser_matrix,
            non_intra_quantiser_matrix,
        })
    }

    /// The default intra matrix in the order it would be transmitted.
    fn default_intra_in_scan_order() -> [u8; 64] {
        let mut matrix = [0u8; 64];
        for (i, &pos) in ZIGZAG_SCAN.iter().enumerate() {
            matrix[i] = DEFAULT_INTRA_QUANTISER_MATRIX[pos as usize];
        }
        matrix
    }

    fn parse_sequence_extension(r: &mut BitReader) -> Result<SequenceExtension> {
        let ext = SequenceExtension {
            escape_bit: r.read_bit()?,
            profile: r.read_bits(3)?,
            level: r.read_bits(4)?,
            progressive_sequence: r.read_bit()?,
            chroma_format: r.read_bits(2)?,
            horizontal_size_extension: r.read_bits(2)?,
            vertical_size_extension: r.read_bits(2)?,
            bit_rate_extension: r.read_bits(12)?,
            vbv_buffer_size_extension: {
                read_marker(r, "sequence extension")?;
                r.read_bits(8)?
            },
            low_delay: r.read_bit()?,
            frame_rate_extension_n: r.read_bits(2)?,
            frame_rate_extension_d: r.read_bits(5)?,
        };

        if ext.escape_bit {
            return Err(limit("profile_and_level_indication escape"));
        }
        if Profile::n(ext.profile).is_none() {
            return Err(limit(format!("profile {}, only Simple and Main", ext.profile)));
        }
        if ext.chroma_format != CHROMA_FORMAT_420 {
            return Err(limit(format!("chroma_format {}, only 4:2:0", ext.chroma_format)));
        }

        Ok(ext)
    }

    fn parse_group(r: &mut BitReader) -> Result<GroupHeader> {
        Ok(GroupHeader {
            time_code: r.read_bits(25)?,
            closed_gop: r.read_bit()?,
            broken_link: r.read_bit()?,
        })
    }

    fn parse_picture(r: &mut BitReader) -> Result<PictureHeader> {
        let temporal_reference = r.read_bits(10)?;
        let coding_type: u8 = r.read_bits(3)?;
        let picture_coding_type = CodingType::n(coding_type)
            .ok_or_else(|| invalid(format!("picture_coding_type {}", coding_type)))?;
        let vbv_delay = r.read_bits(16)?;

        Ok(PictureHeader {
            temporal_reference,
            picture_coding_type,
            vbv_delay,
        })
    }

    fn parse_picture_coding(r: &mut BitReader) -> Result<PictureCodingExtension> {
        let mut f_code = [[0u8; 2]; 2];
        for s in 0..2 {
            for t in 0..2 {
                f_code[s][t] = r.read_bits(4)?;
            }
        }

        let ext = PictureCodingExtension {
            f_code,
            intra_dc_precision: r.read_bits(2)?,
            picture_structure: r.read_bits(2)?,
            top_field_first: r.read_bit()?,
            frame_pred_frame_dct: r.read_bit()?,
            concealment_motion_vectors: r.read_bit()?,
            q_scale_type: r.read_bit()?,
            intra_vlc_format: r.read_bit()?,
            alternate_scan: r.read_bit()?,
            repeat_first_field: r.read_bit()?,
            chroma_420_type: r.read_bit()?,
            progressive_frame: r.read_bit()?,
        };

        if ext.picture_structure != FRAME_PICTURE {
            return Err(limit("field pictures are not supported"));
        }

        for code in ext.f_code.iter().flatten() {
            if !((1..=9).contains(code) || *code == 15) {
                return Err(invalid(format!("f_code {}", code)));
            }
        }

        Ok(ext)
    }

    fn parse_quant_matrix(r: &mut BitReader) -> Result<QuantMatrixExtension> {
        let load_intra_quantiser_matrix = r.read_bit()?;
        let intra_quantiser_matrix = read_matrix(
            r,
            load_intra_quantiser_matrix,
            &Self::default_intra_in_scan_order(),
        )?;
        let load_non_intra_quantiser_matrix = r.read_bit()?;
        let non_intra_quantiser_matrix = read_matrix(
            r,
            load_non_intra_quantiser_matrix,
            &[DEFAULT_NON_INTRA_QUANTISER_VALUE; 64],
        )?;

        // Chroma matrices only matter for 4:2:2 and 4:4:4.
        Ok(QuantMatrixExtension {
            load_intra_quantiser_matrix,
            intra_quantiser_matrix,
            load_non_intra_quantiser_matrix,
            non_intra_quantiser_matrix,
        })
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, HeaderKind::Sequence(_))
    }

    pub fn is_picture(&self) -> bool {
        matches!(self.kind, HeaderKind::Picture(_))
    }

    pub fn as_slice(&self) -> Option<&Slice> {
        match &self.kind {
            HeaderKind::Slice(slice) => Some(slice),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::mpeg2::synthesizer::Synthesizer;

    fn parse_one(data: &[u8]) -> Result<Header> {
        Header::parse(&mut BitReader::new(data), 0)
    }

    #[test]
    fn dispatch_on_start_code() {
        let cases: [(u8, fn(&HeaderKind) -> bool); 8] = [
            (0x01, |k| matches!(k, HeaderKind::Slice(s) if s.vertical_position == 1)),
            (0xaf, |k| matches!(k, HeaderKind::Slice(s) if s.row() == 0xae)),
            (0xb0, |k| matches!(k, HeaderKind::Reserved(0xb0))),
            (0xb1, |k| matches!(k, HeaderKind::Reserved(0xb1))),
            (0xb2, |k| matches!(k, HeaderKind::UserData)),
            (0xb4, |k| matches!(k, HeaderKind::SequenceError)),
            (0xb6, |k| matches!(k, HeaderKind::Reserved(0xb6))),
            (0xb7, |k| matches!(k, HeaderKind::SequenceEnd)),
        ];

        for (code, check) in cases {
            let hdr = parse_one(&[0, 0, 1, code, 0xff, 0xff]).unwrap();
            assert!(check(&hdr.kind), "start code {:#x} gave {:?}", code, hdr.kind);
        }
    }

    #[test]
    fn system_start_codes_are_rejected() {
        for code in [0xb9u8, 0xba, 0xe0, 0xff] {
            assert_eq!(
                parse_one(&[0, 0, 1, code, 0, 0]),
                Err(ParseError::NotElementaryStream(code))
            );
        }
    }

    #[test]
    fn sequence_header_round_trip() {
        let mut seq = SequenceHeader {
            horizontal_size_value: 720,
            vertical_size_value: 576,
            aspect_ratio: AspectRatio::Dar16x9,
            frame_rate_code: 3,
            bit_rate_value: 15000,
            vbv_buffer_size_value: 112,
            load_intra_quantiser_matrix: true,
            ..Default::default()
        };
        seq.intra_quantiser_matrix[63] = 99;

        let mut buf = Vec::new();
        Synthesizer::new(&mut buf).sequence(&seq).unwrap();

        let hdr = parse_one(&buf).unwrap();
        assert_eq!(hdr.kind, HeaderKind::Sequence(Box::new(seq)));
    }

    #[test]
    fn default_matrices_without_load_flags() {
        let mut buf = Vec::new();
        Synthesizer::new(&mut buf)
            .sequence(&SequenceHeader {
                horizontal_size_value: 64,
                vertical_size_value: 64,
                ..Default::default()
            })
            .unwrap();

        let HeaderKind::Sequence(seq) = parse_one(&buf).unwrap().kind else {
            panic!("not a sequence header");
        };
        assert_eq!(seq.intra_quantiser_matrix, DEFAULT_INTRA_QUANTISER_MATRIX);
        assert_eq!(seq.non_intra_quantiser_matrix, [16; 64]);
    }

    #[test]
    fn sequence_header_validation() {
        // 16x16, aspect 0.
        let bad_aspect = [0, 0, 1, 0xb3, 0x01, 0x00, 0x10, 0x03, 0xff, 0xff, 0xe0, 0x00];
        assert!(matches!(parse_one(&bad_aspect), Err(ParseError::StreamInvalid(_))));

        // 16x16, aspect 1, frame_rate_code 9.
        let bad_rate = [0, 0, 1, 0xb3, 0x01, 0x00, 0x10, 0x19, 0xff, 0xff, 0xe0, 0x00];
        assert!(matches!(parse_one(&bad_rate), Err(ParseError::StreamInvalid(_))));

        // Truncated inside vbv_buffer_size_value.
        let short = [0, 0, 1, 0xb3, 0x01, 0x00, 0x10, 0x13, 0xff, 0xff, 0xe0];
        assert_eq!(parse_one(&short), Err(ParseError::InsufficientBits));
    }

    #[test]
    fn sequence_extension_limits() {
        let valid = SequenceExtension {
            profile: Profile::Main as u8,
            level: 8,
            progressive_sequence: true,
            chroma_format: CHROMA_FORMAT_420,
            ..Default::default()
        };

        let encode = |ext: &SequenceExtension| {
            let mut buf = Vec::new();
            Synthesizer::new(&mut buf).sequence_extension(ext).unwrap();
            buf
        };

        assert_eq!(
            parse_one(&encode(&valid)).unwrap().kind,
            HeaderKind::SequenceExtension(valid.clone())
        );

        for ext in [
            SequenceExtension {
                chroma_format: 2,
                ..valid.clone()
            },
            SequenceExtension {
                profile: 1,
                ..valid.clone()
            },
            SequenceExtension {
                escape_bit: true,
                ..valid.clone()
            },
        ] {
            assert!(matches!(
                parse_one(&encode(&ext)),
                Err(ParseError::ConformanceLimitExceeded(_))
            ));
        }
    }

    #[test]
    fn picture_coding_extension_limits() {
        let encode = |ext: &PictureCodingExtension| {
            let mut buf = Vec::new();
            Synthesizer::new(&mut buf).picture_coding_extension(ext).unwrap();
            buf
        };

        let valid = PictureCodingExtension {
            f_code: [[1, 2], [9, 15]],
            q_scale_type: true,
            ..Default::default()
        };
        assert_eq!(
            parse_one(&encode(&valid)).unwrap().kind,
            HeaderKind::PictureCodingExtension(valid.clone())
        );

        let field = PictureCodingExtension {
            picture_structure: 1,
            ..valid.clone()
        };
        assert!(matches!(
            parse_one(&encode(&field)),
            Err(ParseError::ConformanceLimitExceeded(_))
        ));

        for bad in [0, 10, 14] {
            let ext = PictureCodingExtension {
                f_code: [[1, bad], [1, 1]],
                ..valid.clone()
            };
            assert!(matches!(parse_one(&encode(&ext)), Err(ParseError::StreamInvalid(_))));
        }
    }

    #[test]
    fn picture_header_coding_type() {
        // temporal_reference 1, type P, vbv_delay 0xffff.
        let hdr = parse_one(&[0, 0, 1, 0x00, 0x00, 0x57, 0xff, 0xf8]).unwrap();
        assert_eq!(
            hdr.kind,
            HeaderKind::Picture(PictureHeader {
                temporal_reference: 1,
                picture_coding_type: CodingType::P,
                vbv_delay: 0xffff,
            })
        );

        // Coding type 4 (D pictures) is not MPEG-2.
        assert!(matches!(
            parse_one(&[0, 0, 1, 0x00, 0x00, 0x60, 0x00, 0x00]),
            Err(ParseError::StreamInvalid(_))
        ));
    }

    #[test]
    fn unknown_extensions() {
        let hdr = parse_one(&[0, 0, 1, 0xb5, 0x20, 0x00]).unwrap();
        assert_eq!(hdr.kind, HeaderKind::OtherExtension(2));
    }
}
