// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! m2vparse, indexes an MPEG-2 elementary stream without decoding it and prints statistics about
//! its headers and pictures.

use std::path::PathBuf;
use std::time::Instant;

use argh::FromArgs;
use mpeg2_es::codec::mpeg2::parser::CodingType;
use mpeg2_es::codec::mpeg2::parser::HeaderKind;
use mpeg2_es::codec::mpeg2::stream::ElementaryStream;
use mpeg2_es::codec::mpeg2::stream::ScanConfig;
use mpeg2_es::source::ByteSource;
use mpeg2_es::source::MappedFile;

/// Parses an MPEG-2 video elementary stream
#[derive(Debug, FromArgs)]
struct Args {
    /// input file
    #[argh(positional)]
    input: PathBuf,

    /// size of the windows the file is scanned in. Default: 65536
    #[argh(option, default = "65536")]
    block_size: usize,

    /// number of times to parse the file
    #[argh(option, default = "1")]
    iterations: usize,

    /// print every picture in display order
    #[argh(switch)]
    verbose: bool,
}

#[derive(Debug, Default)]
struct HeaderCounts {
    sequences: usize,
    groups: usize,
    pictures: usize,
    slices: usize,
    extensions: usize,
    other: usize,
}

fn main() {
    env_logger::init();

    let args: Args = argh::from_env();
    let config = ScanConfig {
        block_size: args.block_size,
        ..Default::default()
    };

    let start = Instant::now();
    let mut stream = None;
    for _ in 0..args.iterations.max(1) {
        let source = MappedFile::open(&args.input).expect("error opening input file");
        stream = Some(ElementaryStream::with_config(source, config).expect("error parsing stream"));
    }
    let elapsed = start.elapsed();
    let Some(stream) = stream else {
        return;
    };

    let mut counts = HeaderCounts::default();
    for header in stream.headers() {
        match header.kind {
            HeaderKind::Sequence(_) => counts.sequences += 1,
            HeaderKind::Group(_) => counts.groups += 1,
            HeaderKind::Picture(_) => counts.pictures += 1,
            HeaderKind::Slice(_) => counts.slices += 1,
            HeaderKind::SequenceExtension(_)
            | HeaderKind::PictureCodingExtension(_)
            | HeaderKind::QuantMatrixExtension(_)
            | HeaderKind::OtherExtension(_) => counts.extensions += 1,
            _ => counts.other += 1,
        }
    }
    // The ghost sequence header and its extension are not in the file.
    counts.sequences -= 1;
    counts.extensions -= 1;

    let seq = stream.first_sequence();
    println!("first sequence header at offset {}", stream.first_sequence_offset());
    println!(
        "{}x{} ({}x{} macroblocks), {} aspect {:.4}, {:.3} fps",
        seq.resolution.width,
        seq.resolution.height,
        seq.mb_width,
        seq.mb_height,
        if seq.progressive {
            "progressive"
        } else {
            "interlaced"
        },
        seq.sample_aspect_ratio(),
        seq.frame_rate()
    );
    println!("{:?}", counts);

    let pictures = stream.pictures();
    let count = |coding_type| pictures.iter().filter(|p| p.coding_type == coding_type).count();
    println!(
        "{} pictures: {} I, {} P, {} B, {} with problems, {:.3} seconds",
        pictures.len(),
        count(CodingType::I),
        count(CodingType::P),
        count(CodingType::B),
        pictures.iter().filter(|p| p.problem()).count(),
        stream.duration_seconds()
    );

    if args.verbose {
        for &coded in stream.displayed() {
            println!(
                "{:9.3} {}",
                stream.presentation_seconds(stream.picture(coded)),
                stream
                    .picture(coded)
                    .describe(|i| stream.picture(i).display_order)
            );
        }
    }

    let per_iteration = elapsed.as_secs_f64() / args.iterations.max(1) as f64;
    println!(
        "parsed in {:.3} ms, {:.1} MB/s",
        per_iteration * 1000.0,
        stream.source().len() as f64 / per_iteration.max(f64::EPSILON) / 1e6
    );
}
