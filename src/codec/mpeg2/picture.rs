// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::ops::Range;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::codec::mpeg2::parser::CodingType;
use crate::codec::mpeg2::parser::PictureCodingExtension;

/// Which prediction direction a reference is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward = 0,
    Backward = 1,
}

/// A coded picture and everything the stream assembler learned about it.
///
/// Pictures are stored in coded order. All references to other pictures and to headers are
/// indices into the owning [`super::stream::ElementaryStream`].
#[derive(Debug)]
pub struct Picture {
    /// Index of the picture header.
    pub header: usize,
    pub coding_type: CodingType,
    /// The picture coding extension, copied from the header following the picture header.
    pub extension: PictureCodingExtension,
    /// Index of the governing sequence in [`super::stream::ElementaryStream::sequences`].
    pub sequence: usize,
    /// Header that holds the intra quantiser matrix in effect for this picture.
    pub intra_quantiser_matrix: usize,
    /// Header that holds the non-intra quantiser matrix in effect for this picture.
    pub non_intra_quantiser_matrix: usize,

    pub coded_order: usize,
    pub display_order: Option<usize>,
    pub forward_reference: Option<usize>,
    pub backward_reference: Option<usize>,

    /// A reference is missing or itself has a problem.
    pub broken: bool,
    /// Some macroblock rows have no slice.
    pub incomplete: bool,
    /// The quantiser matrices had to be guessed because the picture precedes the first sequence
    /// header.
    pub unknown_quantiser_matrix: bool,
    /// An anchor that was never followed by another anchor or a sequence end.
    pub unclean_last_anchor: bool,
    /// The macroblock decoder found errors in the slice data. Set during decode.
    invalid: AtomicBool,

    /// Header index of the first slice of every macroblock row.
    pub first_slice_in_row: Vec<Option<usize>>,
    /// Bytes spanned by all slices of this picture.
    pub slice_extent: Option<Range<usize>>,

    /// Number of fields this picture is displayed for.
    pub num_fields: u32,
    /// Presentation time in units of `1 / (2 * frame_rate_numerator)` seconds.
    pub presentation_time: u64,
}

impl Picture {
    pub(crate) fn new(header: usize, coding_type: CodingType, coded_order: usize) -> Self {
        Self {
            header,
            coding_type,
            extension: Default::default(),
            sequence: 0,
            intra_quantiser_matrix: 0,
            non_intra_quantiser_matrix: 0,
            coded_order,
            display_order: None,
            forward_reference: None,
            backward_reference: None,
            broken: false,
            incomplete: false,
            unknown_quantiser_matrix: false,
            unclean_last_anchor: false,
            invalid: AtomicBool::new(false),
            first_slice_in_row: Vec::new(),
            slice_extent: None,
            num_fields: 0,
            presentation_time: 0,
        }
    }

    pub fn is_anchor(&self) -> bool {
        matches!(self.coding_type, CodingType::I | CodingType::P)
    }

    pub fn invalid(&self) -> bool {
        self.invalid.load(Ordering::Acquire)
    }

    /// Marks the picture as containing corrupt slice data.
    pub fn set_invalid(&self) {
        self.invalid.store(true, Ordering::Release);
    }

    /// Whether the decoded picture cannot be trusted. Such pictures are still decoded, on top of
    /// a neutral gray frame.
    pub fn problem(&self) -> bool {
        self.broken || self.incomplete || self.unknown_quantiser_matrix || self.invalid()
    }

    /// Returns the reference used for prediction in `direction`.
    pub fn reference(&self, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Forward => self.forward_reference,
            Direction::Backward => self.backward_reference,
        }
    }

    /// Returns the vertical `f_code` for `direction`.
    pub fn vertical_f_code(&self, direction: Direction) -> u8 {
        self.extension.f_code[direction as usize][1]
    }

    pub(crate) fn extend_slice_extent(&mut self, range: Range<usize>) {
        self.slice_extent = Some(match self.slice_extent.take() {
            None => range,
            Some(extent) => extent.start.min(range.start)..extent.end.max(range.end),
        });
    }

    /// Returns a one-line summary of the picture in display terms, e.g. `B 3 (2=>,=>5) coded 4`.
    pub fn describe(&self, display_of: impl Fn(usize) -> Option<usize>) -> String {
        let show = |reference: Option<usize>| match reference.and_then(&display_of) {
            Some(display) => display.to_string(),
            None => "XXX".into(),
        };

        let dependencies = match self.coding_type {
            CodingType::I => String::new(),
            CodingType::P => format!("({}=>) ", show(self.forward_reference)),
            CodingType::B => format!(
                "({}=>,=>{}) ",
                show(self.forward_reference),
                show(self.backward_reference)
            ),
        };

        let mut flags = String::new();
        for (set, name) in [
            (self.unclean_last_anchor, " (unflushed anchor)"),
            (self.incomplete, " (missing slices)"),
            (self.broken, " (broken dependencies)"),
            (self.unknown_quantiser_matrix, " (unknown quantiser matrix)"),
            (self.invalid(), " (invalid)"),
        ] {
            if set {
                flags.push_str(name);
            }
        }

        format!(
            "{} {} {}coded {}{}",
            self.coding_type.as_char(),
            self.display_order.map(|d| d.to_string()).unwrap_or_else(|| "?".into()),
            dependencies,
            self.coded_order,
            flags
        )
    }
}
