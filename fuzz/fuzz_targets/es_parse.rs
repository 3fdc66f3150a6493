#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use mpeg2_es::backend::dummy::Backend;
use mpeg2_es::codec::mpeg2::stream::ElementaryStream;
use mpeg2_es::decoder::mpeg2::Decoder;
use mpeg2_es::decoder::DecoderConfig;

/// Keeps the frame pool small enough for the fuzzer.
const MAX_MACROBLOCKS: usize = 45 * 36;
const MAX_PICTURES: usize = 64;

fuzz_target!(|data: &[u8]| {
    let Ok(stream) = ElementaryStream::new(Bytes::copy_from_slice(data)) else {
        return;
    };

    let seq = stream.first_sequence();
    if seq.mb_width * seq.mb_height > MAX_MACROBLOCKS {
        return;
    }

    let num_pictures = stream.pictures().len().min(MAX_PICTURES);
    let decoder = Decoder::new(
        stream,
        Backend::new(),
        DecoderConfig {
            pool_frames: 8,
            ..Default::default()
        },
    );
    for coded in 0..num_pictures {
        let _ = decoder.decode_sync(coded);
    }
    assert_eq!(decoder.backend().ordering_violations(), 0);
});
