// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::path::PathBuf;
use std::str::FromStr;

use argh::FromArgs;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Md5Computation {
    Stream,
    Frame,
}

impl FromStr for Md5Computation {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stream" => Ok(Md5Computation::Stream),
            "frame" => Ok(Md5Computation::Frame),
            _ => Err("unrecognized MD5 computation option. Valid values: stream, frame"),
        }
    }
}

/// Decodes an MPEG-2 video elementary stream
#[derive(Debug, FromArgs)]
pub struct Args {
    /// input file
    #[argh(positional)]
    pub input: PathBuf,

    /// output file to write the decoded frames to, as raw I420
    #[argh(option)]
    pub output: Option<PathBuf>,

    /// whether to decode frames synchronously on the main thread
    #[argh(switch)]
    pub synchronous: bool,

    /// whether to display the MD5 of the decoded stream, and at which granularity (stream or
    /// frame)
    #[argh(option)]
    pub compute_md5: Option<Md5Computation>,

    /// number of frames in the buffer pool. Default: 50
    #[argh(option, default = "50")]
    pub pool_frames: usize,

    /// stop after this many frames
    #[argh(option)]
    pub frames: Option<usize>,

    /// print the picture graph before decoding
    #[argh(switch)]
    pub show_graph: bool,
}
