// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! This file contains a dummy backend whose only purpose is to let the decoder
//! run so we can test it in isolation.
//!
//! Instead of reconstructing macroblocks, it paints every slice with a value derived from the
//! first bytes of its payload and from the co-located samples of the reference frames. It also
//! checks that every reference row the slice could reach has been rendered.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use log::error;

use crate::backend::References;
use crate::backend::SliceBackend;
use crate::backend::SliceParams;
use crate::backend::SliceStatus;
use crate::codec::mpeg2::picture::Direction;
use crate::video_frame::slice_row::RowDependency;
use crate::video_frame::slice_row::RowState;
use crate::video_frame::Frame;
use crate::video_frame::MacroblockRow;
use crate::video_frame::NEUTRAL_SAMPLE;

#[derive(Debug, Default)]
pub struct Backend {
    calls: AtomicUsize,
    ordering_violations: AtomicUsize,
}

impl Backend {
    pub fn new() -> Self {
        Default::default()
    }

    /// Number of slices decoded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of slices that were decoded while a row they depend on was not rendered.
    pub fn ordering_violations(&self) -> usize {
        self.ordering_violations.load(Ordering::SeqCst)
    }

    fn check_reference(&self, params: &SliceParams, row: usize, direction: Direction, frame: &Frame) {
        let f_code = params.f_code[direction as usize][1];
        let (top, bottom) = match RowDependency::for_row(row, frame.mb_height(), f_code) {
            RowDependency::Rows { top, bottom } => (top, bottom),
            RowDependency::WholeFrame => (0, frame.mb_height() - 1),
        };

        for dep in top..=bottom {
            if frame.slice_row(dep).state() != RowState::Rendered {
                error!(
                    "picture {} row {} decoded before {:?} reference row {}",
                    params.picture, row, direction, dep
                );
                self.ordering_violations.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

impl SliceBackend for Backend {
    fn decode_slice(
        &self,
        params: &SliceParams,
        row: usize,
        target: &mut MacroblockRow,
        refs: References,
        data: &[u8],
    ) -> anyhow::Result<SliceStatus> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if data.len() < 2 {
            target.fill(NEUTRAL_SAMPLE);
            return Ok(SliceStatus::Corrupt);
        }

        let mut luma = data[0];
        let mut chroma = data[1];
        for (direction, reference) in [
            (Direction::Forward, refs.forward),
            (Direction::Backward, refs.backward),
        ] {
            let Some(frame) = reference else {
                continue;
            };
            self.check_reference(params, row, direction, frame);

            let colocated = frame.row(row.min(frame.mb_height() - 1));
            luma = luma.wrapping_add(colocated.y[0] / 2);
            chroma = chroma.wrapping_add(colocated.cb[0] / 2);
        }

        target.y.fill(luma);
        target.cb.fill(chroma);
        target.cr.fill(chroma ^ 0x80);

        Ok(SliceStatus::Ok)
    }
}
