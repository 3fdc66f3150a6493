// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decoding of indexed elementary streams into frames.

pub mod engine;
pub mod mpeg2;

use std::io::Write;
use std::sync::Arc;

use thiserror::Error;

use crate::codec::mpeg2::parser::ParseError;
use crate::codec::mpeg2::stream::StreamError;
use crate::source::SourceError;
use crate::video_frame::frame_pool::FrameHandle;
use crate::video_frame::frame_pool::FramePoolError;
use crate::video_frame::Frame;
use crate::Resolution;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Stream(#[from] ParseError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("no frame available in the pool")]
    PoolExhausted,
    #[error("a pool of {0} frames cannot hold a B picture and its references")]
    PoolTooSmall(usize),
    #[error("no picture with index {0}")]
    InvalidPicture(usize),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<StreamError> for Error {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Parse(e) => Error::Stream(e),
            StreamError::Source(e) => Error::Source(e),
        }
    }
}

impl From<FramePoolError> for Error {
    fn from(err: FramePoolError) -> Self {
        match err {
            FramePoolError::Exhausted => Error::PoolExhausted,
        }
    }
}

/// Instructs the decoder on whether it should block when it needs a frame and none is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingMode {
    Blocking,
    NonBlocking,
}

impl Default for BlockingMode {
    fn default() -> Self {
        Self::Blocking
    }
}

/// Smallest pool a blocking parallel decode can make progress with: a B picture holds both of its
/// references while it waits for its own frame.
pub const MIN_BLOCKING_POOL_FRAMES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Number of frames in the buffer pool. Parallel decodes in [`BlockingMode::Blocking`] need
    /// at least [`MIN_BLOCKING_POOL_FRAMES`].
    pub pool_frames: usize,
    /// Whether parallel decodes wait for a frame when the pool is exhausted.
    pub blocking_mode: BlockingMode,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            pool_frames: 50,
            blocking_mode: Default::default(),
        }
    }
}

/// A decoded picture, handed out to the consumer. The frame stays locked, and therefore
/// unchanged, until this is dropped.
pub struct DecodedFrame {
    handle: Arc<FrameHandle>,
    coded_index: usize,
    display_index: usize,
    presentation_time: u64,
    time_base: u64,
    resolution: Resolution,
    problem: bool,
}

impl DecodedFrame {
    pub fn coded_index(&self) -> usize {
        self.coded_index
    }

    pub fn display_index(&self) -> usize {
        self.display_index
    }

    /// Presentation time in units of `1 / time_base()` seconds.
    pub fn presentation_time(&self) -> u64 {
        self.presentation_time
    }

    pub fn time_base(&self) -> u64 {
        self.time_base
    }

    pub fn timestamp_seconds(&self) -> f64 {
        self.presentation_time as f64 / self.time_base as f64
    }

    /// Returns the visible resolution of the frame.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Whether the picture had a problem, in which case parts of it may be gray or wrong.
    pub fn problem(&self) -> bool {
        self.problem
    }

    pub fn frame(&self) -> &Frame {
        match self.handle.frame() {
            Some(frame) => frame,
            None => panic!("decoded picture {} lost its frame", self.coded_index),
        }
    }

    pub fn to_i420(&self) -> Vec<u8> {
        self.frame().to_i420(self.resolution)
    }

    pub fn write_i420<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        self.frame().write_i420(self.resolution, out)
    }

    /// CRC-32 of the I420 representation of the frame.
    pub fn crc32(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.to_i420());
        hasher.finalize()
    }
}

impl Drop for DecodedFrame {
    fn drop(&mut self) {
        self.handle.release();
    }
}

impl std::fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("coded_index", &self.coded_index)
            .field("display_index", &self.display_index)
            .field("presentation_time", &self.presentation_time)
            .field("problem", &self.problem)
            .finish()
    }
}
