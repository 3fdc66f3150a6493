// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Parsing and parallel decoding of MPEG-2 video elementary streams.
//!
//! The stream is indexed once by [`codec::mpeg2::stream::ElementaryStream`], which builds the
//! header chain and the picture dependency graph. A [`decoder::mpeg2::Decoder`] then decodes
//! pictures on demand, splitting every picture into macroblock rows that are scanned from both
//! ends by worker threads while honoring the rows they depend on in reference pictures.

pub mod backend;
pub mod bitstream_utils;
pub mod codec;
pub mod decoder;
pub mod source;
pub mod video_frame;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Returns the number of pixels covered by this resolution.
    pub fn get_area(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from(value: (u32, u32)) -> Self {
        Self {
            width: value.0,
            height: value.1,
        }
    }
}

/// Returns the size in bytes of an I420 frame of `resolution`.
pub fn i420_frame_size(resolution: Resolution) -> usize {
    let width = resolution.width as usize;
    let height = resolution.height as usize;
    let chroma = ((width + 1) / 2) * ((height + 1) / 2);

    width * height + 2 * chroma
}
