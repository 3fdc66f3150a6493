#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use mpeg2_es::codec::mpeg2::stream::ElementaryStream;
use mpeg2_es::codec::mpeg2::stream::ScanConfig;

// Indexing must not depend on the window size the stream is scanned with.
fuzz_target!(|data: &[u8]| {
    let Some((&block, data)) = data.split_first() else {
        return;
    };
    let source = Bytes::copy_from_slice(data);

    let reference = ElementaryStream::new(source.clone());
    let windowed = ElementaryStream::with_config(
        source,
        ScanConfig {
            block_size: block as usize,
            largest_header: 0,
        },
    );

    match (reference, windowed) {
        (Ok(reference), Ok(windowed)) => {
            assert_eq!(reference.headers(), windowed.headers());
            assert_eq!(reference.displayed(), windowed.displayed());
        }
        (Err(_), Err(_)) => (),
        (reference, windowed) => panic!(
            "window size changed the outcome: {:?} vs {:?}",
            reference.err(),
            windowed.err()
        ),
    }
});
