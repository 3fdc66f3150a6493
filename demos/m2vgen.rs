// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! m2vgen, writes a synthetic MPEG-2 elementary stream that m2vdec and m2vparse can read.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use argh::FromArgs;
use mpeg2_es::codec::mpeg2::parser::CodingType;
use mpeg2_es::codec::mpeg2::synthesizer::StreamParams;

/// Generates a synthetic MPEG-2 video elementary stream
#[derive(Debug, FromArgs)]
struct Args {
    /// output file
    #[argh(positional)]
    output: PathBuf,

    /// width in pixels. Default: 720
    #[argh(option, default = "720")]
    width: u16,

    /// height in pixels. Default: 576
    #[argh(option, default = "576")]
    height: u16,

    /// picture types of one group of pictures in coded order. Default: IPBBPBBPBB
    #[argh(option, default = "String::from(\"IPBBPBBPBB\")")]
    gop: String,

    /// number of groups of pictures. Default: 10
    #[argh(option, default = "10")]
    groups: usize,

    /// number of slices per macroblock row. Default: 1
    #[argh(option, default = "1")]
    slices_per_row: usize,

    /// f_code of all motion vectors, 1 to 9 or 15 for unbounded. Default: 2
    #[argh(option, default = "2")]
    f_code: u8,

    /// frame_rate_code of the sequence header. Default: 3 (25 fps)
    #[argh(option, default = "3")]
    frame_rate_code: u8,

    /// write an interlaced sequence
    #[argh(switch)]
    interlaced: bool,

    /// number of pictures written before the first sequence header
    #[argh(option, default = "0")]
    leading_pictures: usize,
}

fn parse_gop(gop: &str) -> Result<Vec<CodingType>, String> {
    gop.chars()
        .map(|c| match c.to_ascii_uppercase() {
            'I' => Ok(CodingType::I),
            'P' => Ok(CodingType::P),
            'B' => Ok(CodingType::B),
            c => Err(format!("invalid picture type {:?}", c)),
        })
        .collect()
}

fn main() {
    env_logger::init();

    let args: Args = argh::from_env();
    let gop = parse_gop(&args.gop).expect("invalid group of pictures");

    let params = StreamParams {
        width: args.width,
        height: args.height,
        frame_rate_code: args.frame_rate_code,
        progressive_sequence: !args.interlaced,
        f_code: args.f_code,
        pictures: gop.repeat(args.groups),
        slices_per_row: args.slices_per_row,
        leading_pictures: args.leading_pictures,
        sequence_end: true,
    };

    let output = File::create(&args.output).expect("error creating output file");
    params
        .write(BufWriter::new(output))
        .expect("error writing stream");

    println!(
        "wrote {} pictures of {}x{} to {}",
        params.pictures.len(),
        args.width,
        args.height,
        args.output.display()
    );
}
