// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! m2vdec, decodes an MPEG-2 elementary stream in display order with the dummy backend. Prints a
//! CRC of every frame, and optionally MD5 checksums, and can write the raw frames to a file.

use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::time::Instant;

use mpeg2_es::backend::dummy::Backend;
use mpeg2_es::codec::mpeg2::stream::ElementaryStream;
use mpeg2_es::decoder::mpeg2::Decoder;
use mpeg2_es::decoder::DecoderConfig;
use mpeg2_es::source::MappedFile;

use crate::util::Args;
use crate::util::Md5Computation;

mod util;

fn main() {
    env_logger::init();

    let args: Args = argh::from_env();

    let source = MappedFile::open(&args.input).expect("error opening input file");
    let stream = ElementaryStream::new(source).expect("error parsing input stream");

    let seq = stream.first_sequence();
    println!(
        "{}x{} at {:.3} fps, {} pictures, {:.3} seconds",
        seq.resolution.width,
        seq.resolution.height,
        seq.frame_rate(),
        stream.pictures().len(),
        stream.duration_seconds()
    );

    if args.show_graph {
        for &coded in stream.displayed() {
            let pic = stream.picture(coded);
            println!("{}", pic.describe(|i| stream.picture(i).display_order));
        }
    }

    let decoder = Decoder::new(
        stream,
        Backend::new(),
        DecoderConfig {
            pool_frames: args.pool_frames,
            ..Default::default()
        },
    );

    let mut output = args
        .output
        .as_ref()
        .map(|p| BufWriter::new(File::create(p).expect("error creating output file")));

    let num_frames = decoder
        .stream()
        .displayed()
        .len()
        .min(args.frames.unwrap_or(usize::MAX));
    let mut stream_md5 = md5::Context::new();
    let mut problems = 0;
    let start = Instant::now();

    for display in 0..num_frames {
        let frame = if args.synchronous {
            decoder.decode_sync(decoder.stream().displayed()[display])
        } else {
            decoder.decode_displayed(display)
        }
        .expect("error decoding frame");

        let data = frame.to_i420();
        if frame.problem() {
            problems += 1;
        }

        let mut line = format!(
            "frame {:5} coded {:5} t={:9.3} crc {:08x}",
            frame.display_index(),
            frame.coded_index(),
            frame.timestamp_seconds(),
            frame.crc32()
        );
        match args.compute_md5 {
            Some(Md5Computation::Frame) => {
                line.push_str(&format!(" md5 {:x}", md5::compute(&data)))
            }
            Some(Md5Computation::Stream) => stream_md5.consume(&data),
            None => (),
        }
        if frame.problem() {
            line.push_str(" (problem)");
        }
        println!("{}", line);

        if let Some(output) = &mut output {
            output.write_all(&data).expect("error writing output file");
        }
    }

    let elapsed = start.elapsed();
    if let Some(Md5Computation::Stream) = args.compute_md5 {
        println!("{:x}", stream_md5.compute());
    }
    if let Some(mut output) = output {
        output.flush().expect("error writing output file");
    }

    println!(
        "decoded {} frames ({} with problems) in {:.3}s, {:.1} fps, {} slices, {} workers",
        num_frames,
        problems,
        elapsed.as_secs_f64(),
        num_frames as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        decoder.backend().calls(),
        decoder.num_workers()
    );
}
