// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Parallel decoding of MPEG-2 pictures.
//!
//! Decoding a picture first makes sure its references are decoded or being decoded, then claims
//! a frame for it and dispatches three jobs: two slice scans, one walking the macroblock rows
//! from the top and one from the bottom, and a cleanup job that waits for both. Every row waits
//! for the reference rows its motion vectors can reach, so a picture can start decoding while
//! its references are still being decoded.

use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;

use log::debug;
use log::error;
use log::warn;

use crate::backend::References;
use crate::backend::SliceBackend;
use crate::backend::SliceParams;
use crate::backend::SliceStatus;
use crate::codec::mpeg2::picture::Direction;
use crate::codec::mpeg2::picture::Picture;
use crate::codec::mpeg2::stream::ElementaryStream;
use crate::codec::mpeg2::stream::SliceData;
use crate::decoder::engine::DecodeEngine;
use crate::decoder::BlockingMode;
use crate::decoder::DecodedFrame;
use crate::decoder::DecoderConfig;
use crate::decoder::Error;
use crate::decoder::Result;
use crate::decoder::MIN_BLOCKING_POOL_FRAMES;
use crate::source::ByteSource;
use crate::video_frame::frame_pool::BufferPool;
use crate::video_frame::frame_pool::FrameHandle;
use crate::video_frame::frame_pool::PoolStats;
use crate::video_frame::slice_row::RowDependency;
use crate::video_frame::slice_row::RowSetup;
use crate::video_frame::slice_row::RowState;
use crate::video_frame::Frame;
use crate::video_frame::NEUTRAL_SAMPLE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Idle,
    /// A decode is locking the references and claiming a frame.
    Starting,
    /// The frame is claimed. Holds the number of slice scans still running.
    Scanning(usize),
}

struct PictureState {
    handle: Arc<FrameHandle>,
    progress: Mutex<Progress>,
    activity: Condvar,
}

/// State shared between the decoder and its jobs.
struct Shared<S: ByteSource, B: SliceBackend> {
    stream: ElementaryStream<S>,
    pool: Arc<BufferPool>,
    backend: B,
    /// Indexed like the pictures of the stream.
    pictures: Vec<PictureState>,
}

impl<S: ByteSource, B: SliceBackend> Shared<S, B> {
    /// Returns the frame of a picture the caller holds a lock on.
    fn frame(&self, index: usize) -> &Frame {
        match self.pictures[index].handle.frame() {
            Some(frame) => frame,
            None => panic!("picture {} has no frame", index),
        }
    }

    fn row_setup(&self, pic: &Picture) -> RowSetup {
        let reference = |direction| {
            pic.reference(direction)
                .map(|r| (pic.vertical_f_code(direction), self.frame(r).mb_height()))
        };

        RowSetup {
            forward: reference(Direction::Forward),
            backward: reference(Direction::Backward),
        }
    }

    fn references(&self, pic: &Picture) -> References<'_> {
        References {
            forward: pic.forward_reference.map(|r| self.frame(r)),
            backward: pic.backward_reference.map(|r| self.frame(r)),
        }
    }

    fn release_all(&self, pictures: &[usize]) {
        for &index in pictures {
            self.pictures[index].handle.release();
        }
    }

    fn map_slices(&self, index: usize) -> Option<SliceData<'_, S>> {
        let pic = self.stream.picture(index);
        match self.stream.map_slices(pic) {
            Ok(slices) => slices,
            Err(e) => {
                error!("unable to map slices of picture {}: {}", index, e);
                pic.set_invalid();
                None
            }
        }
    }

    /// Blocks until every reference row that `row` of `frame` depends on is rendered.
    fn wait_for_dependencies(&self, pic: &Picture, frame: &Frame, row: usize) {
        for direction in [Direction::Forward, Direction::Backward] {
            let Some(reference) = pic.reference(direction) else {
                continue;
            };

            match frame.slice_row(row).dependency(direction) {
                Some(RowDependency::Rows { top, bottom }) => {
                    let reference_frame = self.frame(reference);
                    for dep in top..=bottom {
                        reference_frame.slice_row(dep).wait_rendered();
                    }
                }
                Some(RowDependency::WholeFrame) => self.pictures[reference].handle.wait_rendered(),
                None => (),
            }
        }
    }

    fn decode_row(
        &self,
        index: usize,
        params: &SliceParams,
        frame: &Frame,
        row: usize,
        slices: Option<&SliceData<'_, S>>,
    ) {
        let pic = self.stream.picture(index);
        let refs = self.references(pic);
        let mut target = frame.row_mut(row);

        for (offset, slice) in self.stream.slices_in_row(pic, row) {
            let data = slices
                .map(|slices| slices.payload(offset, slice))
                .unwrap_or_default();

            match self
                .backend
                .decode_slice(params, row, &mut target, refs, data)
            {
                Ok(SliceStatus::Ok) => (),
                Ok(SliceStatus::Corrupt) => {
                    warn!("corrupt slice at offset {} in picture {}", offset, index);
                    pic.set_invalid();
                }
                Err(e) => {
                    error!("failed to decode slice at offset {}: {:#}", offset, e);
                    target.fill(NEUTRAL_SAMPLE);
                    pic.set_invalid();
                }
            }
        }
    }

    /// Decodes rows from one end of the picture until meeting the scan coming from the other end.
    fn scan_slices(&self, index: usize, params: &SliceParams, top_down: bool) {
        let pic = self.stream.picture(index);
        let frame = self.frame(index);
        let slices = self.map_slices(index);

        let rows = frame.mb_height();
        let order: Box<dyn Iterator<Item = usize>> = if top_down {
            Box::new(0..rows)
        } else {
            Box::new((0..rows).rev())
        };

        for row in order {
            // Claimed by the other scan, which also has the remaining rows.
            if frame.slice_row(row).lock() != RowState::Ready {
                break;
            }
            self.wait_for_dependencies(pic, frame, row);
            self.decode_row(index, params, frame, row, slices.as_ref());
            frame.slice_row(row).set_rendered();
        }

        let state = &self.pictures[index];
        let mut progress = state.progress.lock().unwrap();
        match &mut *progress {
            Progress::Scanning(pending) if *pending > 0 => *pending -= 1,
            other => panic!("scan of picture {} ended while {:?}", index, other),
        }
        state.activity.notify_all();
    }

    /// Waits for both scans, then releases the references and publishes the frame.
    fn cleanup(&self, index: usize, keep_locked: bool) {
        let state = &self.pictures[index];
        let pic = self.stream.picture(index);

        {
            let mut progress = state.progress.lock().unwrap();
            while *progress != Progress::Scanning(0) {
                progress = state.activity.wait(progress).unwrap();
            }
        }

        // References can still be decoding rows this picture never reads.
        for reference in [pic.forward_reference, pic.backward_reference]
            .into_iter()
            .flatten()
        {
            let handle = &self.pictures[reference].handle;
            handle.wait_rendered();
            handle.release();
        }

        let mut progress = state.progress.lock().unwrap();
        state.handle.set_rendered();
        if !keep_locked {
            state.handle.release();
        }
        *progress = Progress::Idle;
        state.activity.notify_all();

        debug!("decoded picture {}", index);
    }
}

pub struct Decoder<S: ByteSource + 'static, B: SliceBackend + 'static> {
    shared: Arc<Shared<S, B>>,
    engine: DecodeEngine,
    config: DecoderConfig,
}

impl<S: ByteSource + 'static, B: SliceBackend + 'static> Decoder<S, B> {
    pub fn new(stream: ElementaryStream<S>, backend: B, config: DecoderConfig) -> Self {
        let seq = stream.first_sequence();
        let pool = BufferPool::new(config.pool_frames, seq.mb_width, seq.mb_height);
        let pictures = stream
            .pictures()
            .iter()
            .map(|_| PictureState {
                handle: Arc::new(pool.new_handle()),
                progress: Mutex::new(Progress::Idle),
                activity: Condvar::new(),
            })
            .collect();

        debug!(
            "decoding {} pictures with {} frames of {}x{} macroblocks",
            stream.pictures().len(),
            config.pool_frames,
            seq.mb_width,
            seq.mb_height
        );

        Self {
            shared: Arc::new(Shared {
                stream,
                pool,
                backend,
                pictures,
            }),
            engine: DecodeEngine::new(),
            config,
        }
    }

    pub fn stream(&self) -> &ElementaryStream<S> {
        &self.shared.stream
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.shared.pool.stats()
    }

    pub fn num_workers(&self) -> usize {
        self.engine.num_workers()
    }

    fn check_index(&self, coded: usize) -> Result<()> {
        if coded >= self.shared.pictures.len() {
            return Err(Error::InvalidPicture(coded));
        }
        Ok(())
    }

    /// Makes sure the picture at coded index `coded` gets decoded, without waiting for it.
    ///
    /// If `keep_locked` is set, the caller gets a lock on the picture's frame which must be given
    /// back with [`Self::release`].
    ///
    /// Fails with [`Error::PoolTooSmall`] if the decode could wait forever for a frame.
    pub fn request_decode(&self, coded: usize, keep_locked: bool) -> Result<()> {
        self.check_index(coded)?;
        if self.config.blocking_mode == BlockingMode::Blocking
            && self.config.pool_frames < MIN_BLOCKING_POOL_FRAMES
        {
            return Err(Error::PoolTooSmall(self.config.pool_frames));
        }
        self.request(coded, keep_locked)
    }

    /// Releases a lock obtained through [`Self::request_decode`].
    pub fn release(&self, coded: usize) {
        self.shared.pictures[coded].handle.release();
    }

    fn request(&self, index: usize, keep_locked: bool) -> Result<()> {
        let state = &self.shared.pictures[index];

        {
            let mut progress = state.progress.lock().unwrap();
            loop {
                if state.handle.retain_if_rendered() {
                    if !keep_locked {
                        state.handle.release();
                    }
                    return Ok(());
                }

                let current = *progress;
                match current {
                    Progress::Idle => break,
                    Progress::Starting => progress = state.activity.wait(progress).unwrap(),
                    Progress::Scanning(_) => {
                        if keep_locked {
                            state.handle.add_lock();
                        }
                        return Ok(());
                    }
                }
            }
            *progress = Progress::Starting;
        }

        let result = self.start_decode(index, keep_locked);
        if result.is_err() {
            *state.progress.lock().unwrap() = Progress::Idle;
            state.activity.notify_all();
        }

        result
    }

    /// Locks every reference of `pic` through `lock`, undoing the locks taken so far on failure.
    fn lock_references(
        &self,
        pic: &Picture,
        mut lock: impl FnMut(usize) -> Result<()>,
    ) -> Result<Vec<usize>> {
        let mut locked = Vec::with_capacity(2);
        for reference in [pic.forward_reference, pic.backward_reference]
            .into_iter()
            .flatten()
        {
            if let Err(e) = lock(reference) {
                self.shared.release_all(&locked);
                return Err(e);
            }
            locked.push(reference);
        }

        Ok(locked)
    }

    fn start_decode(&self, index: usize, keep_locked: bool) -> Result<()> {
        let shared = &self.shared;
        let pic = shared.stream.picture(index);
        let state = &shared.pictures[index];

        // Referenced pictures stay locked until the cleanup job of this one.
        let references = self.lock_references(pic, |r| self.request(r, true))?;

        if let Err(e) = state
            .handle
            .retain(self.config.blocking_mode, &shared.row_setup(pic))
        {
            shared.release_all(&references);
            return Err(e.into());
        }

        if pic.problem() {
            shared.frame(index).fill_neutral();
        }
        let params = Arc::new(SliceParams::new(&shared.stream, index));

        *state.progress.lock().unwrap() = Progress::Scanning(2);
        state.activity.notify_all();

        for top_down in [true, false] {
            let shared = Arc::clone(shared);
            let params = Arc::clone(&params);
            self.engine.dispatch(Box::new(move || {
                shared.scan_slices(index, &params, top_down)
            }));
        }

        let shared = Arc::clone(shared);
        self.engine
            .dispatch(Box::new(move || shared.cleanup(index, keep_locked)));

        Ok(())
    }

    fn decoded_frame(&self, index: usize) -> DecodedFrame {
        let stream = &self.shared.stream;
        let pic = stream.picture(index);
        let Some(display_index) = pic.display_order else {
            panic!("picture {} has no display order", index);
        };

        DecodedFrame {
            handle: Arc::clone(&self.shared.pictures[index].handle),
            coded_index: index,
            display_index,
            presentation_time: pic.presentation_time,
            time_base: stream.time_base(),
            resolution: stream.sequence_of(pic).resolution,
            problem: pic.problem(),
        }
    }

    /// Decodes the picture at coded index `coded` on the worker threads and waits for it.
    pub fn decode_coded(&self, coded: usize) -> Result<DecodedFrame> {
        self.request_decode(coded, true)?;
        self.shared.pictures[coded].handle.wait_rendered();
        Ok(self.decoded_frame(coded))
    }

    /// Decodes the `display`-th picture in display order on the worker threads and waits for it.
    pub fn decode_displayed(&self, display: usize) -> Result<DecodedFrame> {
        let coded = *self
            .shared
            .stream
            .displayed()
            .get(display)
            .ok_or(Error::InvalidPicture(display))?;
        self.decode_coded(coded)
    }

    /// Decodes the picture at coded index `coded`, and whatever references it needs, on the
    /// calling thread. Fails instead of waiting if the pool runs out of frames.
    pub fn decode_sync(&self, coded: usize) -> Result<DecodedFrame> {
        self.check_index(coded)?;
        self.lock_sync(coded)?;
        Ok(self.decoded_frame(coded))
    }

    /// Takes a lock on a rendered frame of the picture, decoding it first if needed.
    fn lock_sync(&self, index: usize) -> Result<()> {
        let state = &self.shared.pictures[index];

        {
            let mut progress = state.progress.lock().unwrap();
            loop {
                if state.handle.retain_if_rendered() {
                    return Ok(());
                }

                let current = *progress;
                match current {
                    Progress::Idle => break,
                    Progress::Starting => progress = state.activity.wait(progress).unwrap(),
                    Progress::Scanning(_) => {
                        state.handle.add_lock();
                        drop(progress);
                        state.handle.wait_rendered();
                        return Ok(());
                    }
                }
            }
            *progress = Progress::Starting;
        }

        let result = self.decode_in_place(index);
        *state.progress.lock().unwrap() = Progress::Idle;
        state.activity.notify_all();

        result
    }

    fn decode_in_place(&self, index: usize) -> Result<()> {
        let shared = &*self.shared;
        let pic = shared.stream.picture(index);
        let handle = &shared.pictures[index].handle;

        let references = self.lock_references(pic, |r| self.lock_sync(r))?;
        if let Err(e) = handle.retain(BlockingMode::NonBlocking, &shared.row_setup(pic)) {
            shared.release_all(&references);
            return Err(e.into());
        }

        let frame = shared.frame(index);
        if pic.problem() {
            frame.fill_neutral();
        }

        let params = SliceParams::new(&shared.stream, index);
        let slices = shared.map_slices(index);
        for row in 0..frame.mb_height() {
            let previous = frame.slice_row(row).lock();
            assert_eq!(previous, RowState::Ready, "row {} of picture {}", row, index);
            shared.decode_row(index, &params, frame, row, slices.as_ref());
            frame.slice_row(row).set_rendered();
        }

        handle.set_rendered();
        shared.release_all(&references);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use bytes::Bytes;

    use super::*;
    use crate::backend::dummy::Backend;
    use crate::codec::mpeg2::parser::CodingType;
    use crate::codec::mpeg2::parser::PictureCodingExtension;
    use crate::codec::mpeg2::parser::PictureHeader;
    use crate::codec::mpeg2::synthesizer::StreamParams;
    use crate::codec::mpeg2::synthesizer::Synthesizer;

    fn decoder(params: &StreamParams, config: DecoderConfig) -> Decoder<Bytes, Backend> {
        let data = Bytes::from(params.to_vec().unwrap());
        let stream = ElementaryStream::new(data).unwrap();
        Decoder::new(stream, Backend::new(), config)
    }

    fn long_gop() -> StreamParams {
        use CodingType::*;
        StreamParams {
            width: 96,
            height: 256,
            f_code: 1,
            slices_per_row: 2,
            pictures: vec![I, P, B, B, P, B, B, P, B, B, I, B, B, P],
            ..Default::default()
        }
    }

    fn display_crcs(decoder: &Decoder<Bytes, Backend>) -> Vec<u32> {
        (0..decoder.stream().displayed().len())
            .map(|i| decoder.decode_displayed(i).unwrap().crc32())
            .collect()
    }

    /// Waits for the decode jobs still releasing locks after the last frame was handed out.
    fn wait_until_idle(decoder: &Decoder<Bytes, Backend>) -> PoolStats {
        for _ in 0..100 {
            let stats = decoder.pool_stats();
            if stats.held == 0 {
                return stats;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        decoder.pool_stats()
    }

    #[test]
    fn decode_in_display_order() {
        let decoder = decoder(&StreamParams::default(), Default::default());

        let frames: Vec<_> = (0..3)
            .map(|i| decoder.decode_displayed(i).unwrap())
            .collect();
        let coded: Vec<_> = frames.iter().map(|f| f.coded_index()).collect();
        assert_eq!(coded, vec![0, 2, 1]);
        let times: Vec<_> = frames.iter().map(|f| f.presentation_time()).collect();
        assert_eq!(times, vec![0, 2, 4]);
        assert!(frames.iter().all(|f| !f.problem()));

        // Row 1 of each picture: the payload value plus half of each reference.
        let luma = |frame: &DecodedFrame| frame.frame().row(1).y[0];
        assert_eq!(luma(&frames[0]), 27);
        assert_eq!(luma(&frames[2]), 64 + 27 / 2);
        assert_eq!(luma(&frames[1]), 101 + 27 / 2 + 77 / 2);

        assert_eq!(frames[0].to_i420().len(), 64 * 64 * 3 / 2);
        assert_eq!(decoder.backend().ordering_violations(), 0);

        drop(frames);
        assert_eq!(
            wait_until_idle(&decoder),
            PoolStats {
                free: 47,
                freeable: 3,
                held: 0,
            }
        );
    }

    #[test]
    fn rendered_pictures_are_not_decoded_again() {
        let decoder = decoder(&StreamParams::default(), Default::default());

        let first = decoder.decode_displayed(2).unwrap().crc32();
        let calls = decoder.backend().calls();
        // One slice per row, 4 rows, for the P picture and its I reference.
        assert_eq!(calls, 8);

        assert_eq!(decoder.decode_displayed(2).unwrap().crc32(), first);
        decoder.decode_displayed(0).unwrap();
        assert_eq!(decoder.backend().calls(), calls);
    }

    #[test]
    fn rows_wait_for_their_references() {
        let decoder = decoder(&long_gop(), Default::default());
        let crcs = display_crcs(&decoder);

        assert_eq!(crcs.len(), 14);
        assert_eq!(decoder.backend().ordering_violations(), 0);
        assert_eq!(decoder.backend().calls(), 14 * 16 * 2);
    }

    #[test]
    fn sync_and_parallel_paths_agree() {
        let params = long_gop();
        let parallel = display_crcs(&decoder(&params, Default::default()));

        let sync = decoder(&params, Default::default());
        let crcs: Vec<_> = sync
            .stream()
            .displayed()
            .to_vec()
            .into_iter()
            .map(|coded| sync.decode_sync(coded).unwrap().crc32())
            .collect();

        assert_eq!(crcs, parallel);
        assert_eq!(sync.num_workers(), 0);
        assert_eq!(sync.backend().ordering_violations(), 0);
    }

    #[test]
    fn concurrent_consumers() {
        let params = long_gop();
        let expected = display_crcs(&decoder(&params, Default::default()));
        let decoder = decoder(&params, Default::default());

        thread::scope(|s| {
            let consumers: Vec<_> = (0..4)
                .map(|_| s.spawn(|| display_crcs(&decoder)))
                .collect();
            for consumer in consumers {
                assert_eq!(consumer.join().unwrap(), expected);
            }
        });

        assert_eq!(decoder.backend().calls(), 14 * 16 * 2);
        assert_eq!(wait_until_idle(&decoder).held, 0);
    }

    #[test]
    fn small_pool_evicts_and_redecodes() {
        let params = long_gop();
        let expected = display_crcs(&decoder(&params, Default::default()));
        let decoder = decoder(
            &params,
            DecoderConfig {
                pool_frames: 4,
                ..Default::default()
            },
        );

        assert_eq!(display_crcs(&decoder), expected);
        // Going back to the start needs frames that were evicted meanwhile.
        assert_eq!(decoder.decode_displayed(0).unwrap().crc32(), expected[0]);
        assert_eq!(decoder.backend().ordering_violations(), 0);
    }

    #[test]
    fn sync_decode_reports_exhausted_pool() {
        let decoder = decoder(
            &StreamParams::default(),
            DecoderConfig {
                pool_frames: 2,
                ..Default::default()
            },
        );

        assert!(matches!(decoder.decode_sync(2), Err(Error::PoolExhausted)));
        // The references decoded on the way are kept for later.
        assert_eq!(
            decoder.pool_stats(),
            PoolStats {
                free: 0,
                freeable: 2,
                held: 0,
            }
        );
        assert_eq!(decoder.backend().calls(), 8);

        let p = decoder.decode_sync(1).unwrap();
        assert_eq!(p.display_index(), 2);
        assert_eq!(decoder.backend().calls(), 8);
    }

    #[test]
    fn blocking_decode_needs_three_frames() {
        let blocking = decoder(
            &StreamParams::default(),
            DecoderConfig {
                pool_frames: 2,
                ..Default::default()
            },
        );
        assert!(matches!(
            blocking.decode_displayed(1),
            Err(Error::PoolTooSmall(2))
        ));
        assert!(matches!(
            blocking.request_decode(0, false),
            Err(Error::PoolTooSmall(2))
        ));
        assert_eq!(blocking.backend().calls(), 0);

        // Without blocking the decode fails on exhaustion instead, and the synchronous path does
        // not wait either.
        let non_blocking = decoder(
            &StreamParams::default(),
            DecoderConfig {
                pool_frames: 2,
                blocking_mode: BlockingMode::NonBlocking,
            },
        );
        let i = non_blocking.decode_coded(0).unwrap();
        assert_eq!(i.display_index(), 0);
        drop(i);
        assert_eq!(non_blocking.decode_sync(1).unwrap().display_index(), 2);
    }

    #[test]
    fn out_of_range_pictures() {
        let decoder = decoder(&StreamParams::default(), Default::default());
        assert!(matches!(
            decoder.decode_displayed(3),
            Err(Error::InvalidPicture(3))
        ));
        assert!(matches!(decoder.decode_sync(7), Err(Error::InvalidPicture(7))));
        assert!(matches!(
            decoder.request_decode(3, false),
            Err(Error::InvalidPicture(3))
        ));
    }

    #[test]
    fn request_without_keeping_the_frame() {
        let decoder = decoder(&StreamParams::default(), Default::default());
        decoder.request_decode(1, false).unwrap();

        let p = decoder.decode_coded(1).unwrap();
        assert_eq!(p.display_index(), 2);
        drop(p);

        decoder.request_decode(2, true).unwrap();
        decoder.decode_coded(2).unwrap();
        decoder.release(2);
        assert_eq!(wait_until_idle(&decoder).held, 0);
    }

    #[test]
    fn corrupt_slice_marks_picture_invalid() {
        let params = StreamParams::default();
        let mut data = Vec::new();
        let mut synth = Synthesizer::new(&mut data);
        synth
            .sequence(&params.sequence_header())
            .unwrap()
            .sequence_extension(&params.sequence_extension())
            .unwrap()
            .picture(&PictureHeader {
                temporal_reference: 0,
                picture_coding_type: CodingType::I,
                vbv_delay: 0xffff,
            })
            .unwrap()
            .picture_coding_extension(&PictureCodingExtension {
                f_code: [[15; 2]; 2],
                ..Default::default()
            })
            .unwrap();
        for row in 1..=4 {
            let payload: &[u8] = if row == 3 { &[] } else { &[0x40, 0x50] };
            synth.slice(row, payload).unwrap();
        }
        synth.sequence_end().unwrap().flush().unwrap();
        drop(synth);

        let stream = ElementaryStream::new(Bytes::from(data)).unwrap();
        let decoder = Decoder::new(stream, Backend::new(), Default::default());
        assert!(!decoder.stream().picture(0).problem());

        let frame = decoder.decode_displayed(0).unwrap();
        assert!(frame.problem());
        assert!(decoder.stream().picture(0).invalid());
        assert_eq!(frame.frame().row(0).y[0], 0x40);
        assert_eq!(frame.frame().row(2).y[0], NEUTRAL_SAMPLE);
        assert_eq!(decoder.backend().calls(), 4);
    }

    #[test]
    fn leading_pictures_decode_over_neutral_frames() {
        use CodingType::*;
        let params = StreamParams {
            pictures: vec![B, B, I, B, P],
            leading_pictures: 2,
            ..Default::default()
        };
        let decoder = decoder(&params, Default::default());

        let frames: Vec<_> = (0..5)
            .map(|i| decoder.decode_displayed(i).unwrap())
            .collect();
        let coded: Vec<_> = frames.iter().map(|f| f.coded_index()).collect();
        assert_eq!(coded, vec![0, 1, 3, 2, 4]);
        // The B picture after the I picture has no forward reference.
        let problems: Vec<_> = frames.iter().map(|f| f.problem()).collect();
        assert_eq!(problems, vec![true, true, true, false, false]);
        assert_eq!(decoder.backend().ordering_violations(), 0);
    }
}
