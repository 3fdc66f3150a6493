// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use bytes::Bytes;
    use mpeg2_es::backend::dummy::Backend;
    use mpeg2_es::codec::mpeg2::parser::CodingType;
    use mpeg2_es::codec::mpeg2::stream::ElementaryStream;
    use mpeg2_es::codec::mpeg2::stream::ScanConfig;
    use mpeg2_es::codec::mpeg2::synthesizer::StreamParams;
    use mpeg2_es::decoder::mpeg2::Decoder;
    use mpeg2_es::decoder::DecoderConfig;
    use mpeg2_es::decoder::Error;
    use mpeg2_es::i420_frame_size;
    use mpeg2_es::source::ByteSource;
    use mpeg2_es::source::MappedFile;
    use mpeg2_es::Resolution;

    /// A file in the temporary directory, removed on drop.
    struct TempStream {
        path: PathBuf,
    }

    impl TempStream {
        fn new(name: &str, params: &StreamParams) -> Self {
            let path = std::env::temp_dir().join(format!(
                "mpeg2-es-{}-{}.m2v",
                name,
                std::process::id()
            ));
            fs::write(&path, params.to_vec().unwrap()).unwrap();
            Self { path }
        }
    }

    impl Drop for TempStream {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn broadcast_params() -> StreamParams {
        use CodingType::*;
        StreamParams {
            width: 720,
            height: 576,
            slices_per_row: 3,
            pictures: [I, P, B, B, P, B, B, P, B, B].repeat(3),
            ..Default::default()
        }
    }

    fn decode_all<S: ByteSource + 'static>(decoder: &Decoder<S, Backend>) -> Vec<u32> {
        (0..decoder.stream().displayed().len())
            .map(|i| decoder.decode_displayed(i).unwrap().crc32())
            .collect()
    }

    #[test]
    fn mapped_file_matches_memory() {
        init_logging();
        let params = broadcast_params();
        let file = TempStream::new("mapped", &params);

        let source = MappedFile::open(&file.path).unwrap();
        assert_eq!(source.len(), fs::metadata(&file.path).unwrap().len() as usize);
        let stream = ElementaryStream::new(source).unwrap();
        assert_eq!(stream.pictures().len(), 30);
        assert_eq!(stream.first_sequence().resolution, Resolution::from((720, 576)));

        let mapped = Decoder::new(stream, Backend::new(), Default::default());
        let memory = Decoder::new(
            ElementaryStream::new(Bytes::from(params.to_vec().unwrap())).unwrap(),
            Backend::new(),
            Default::default(),
        );

        assert_eq!(decode_all(&mapped), decode_all(&memory));
        assert_eq!(mapped.backend().ordering_violations(), 0);
        // 36 rows of 3 slices each.
        assert_eq!(mapped.backend().calls(), 30 * 36 * 3);
    }

    #[test]
    fn small_scan_windows_over_a_file() {
        init_logging();
        let params = broadcast_params();
        let file = TempStream::new("windows", &params);

        let reference = ElementaryStream::new(MappedFile::open(&file.path).unwrap()).unwrap();
        let windowed = ElementaryStream::with_config(
            MappedFile::open(&file.path).unwrap(),
            ScanConfig {
                block_size: 100,
                largest_header: 0,
            },
        )
        .unwrap();

        assert_eq!(windowed.headers(), reference.headers());
        assert_eq!(windowed.displayed(), reference.displayed());
    }

    #[test]
    fn frames_in_display_order() {
        init_logging();
        let params = broadcast_params();
        let file = TempStream::new("display", &params);
        let stream = ElementaryStream::new(MappedFile::open(&file.path).unwrap()).unwrap();
        let decoder = Decoder::new(stream, Backend::new(), Default::default());

        let frame_size = i420_frame_size(Resolution::from((720, 576)));
        let mut last_time = None;
        for display in 0..30 {
            let frame = decoder.decode_displayed(display).unwrap();
            assert_eq!(frame.display_index(), display);
            assert_eq!(frame.to_i420().len(), frame_size);
            assert!(!frame.problem());
            if let Some(last) = last_time {
                assert_eq!(frame.presentation_time(), last + 2);
            }
            last_time = Some(frame.presentation_time());
        }

        let stream = decoder.stream();
        assert_eq!(stream.time_base(), 50);
        assert_eq!(stream.duration(), 60);
        assert_eq!(stream.duration_seconds(), 1.2);
    }

    #[test]
    fn synchronous_decode_of_interlaced_stream() {
        init_logging();
        let params = StreamParams {
            height: 80,
            progressive_sequence: false,
            ..broadcast_params()
        };
        let file = TempStream::new("interlaced", &params);
        let stream = ElementaryStream::new(MappedFile::open(&file.path).unwrap()).unwrap();
        // Interlaced heights are rounded to pairs of field macroblock rows.
        assert_eq!(stream.first_sequence().mb_height, 6);

        let decoder = Decoder::new(stream, Backend::new(), Default::default());
        let parallel = decode_all(&decoder);

        let sync = Decoder::new(
            ElementaryStream::new(MappedFile::open(&file.path).unwrap()).unwrap(),
            Backend::new(),
            Default::default(),
        );
        let displayed = sync.stream().displayed().to_vec();
        let crcs: Vec<_> = displayed
            .into_iter()
            .map(|coded| sync.decode_sync(coded).unwrap().crc32())
            .collect();

        assert_eq!(crcs, parallel);
    }

    #[test]
    fn exhausted_pool_in_synchronous_mode() {
        init_logging();
        let file = TempStream::new("exhausted", &broadcast_params());
        let stream = ElementaryStream::new(MappedFile::open(&file.path).unwrap()).unwrap();
        let decoder = Decoder::new(
            stream,
            Backend::new(),
            DecoderConfig {
                pool_frames: 2,
                ..Default::default()
            },
        );

        // Keeping the I picture locked leaves a single frame for its P picture.
        let first = decoder.decode_sync(0).unwrap();
        let _second = decoder.decode_sync(1).unwrap();
        assert!(matches!(decoder.decode_sync(2), Err(Error::PoolExhausted)));

        // The next P picture only needs the locked P picture, and can take the I picture's frame.
        drop(first);
        let fourth = decoder.decode_sync(4).unwrap();
        assert_eq!(fourth.display_index(), 6);
        assert_eq!(decoder.backend().calls(), 3 * 36 * 3);
    }
}
