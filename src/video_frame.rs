// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Decoded pixel storage.
//!
//! A [`Frame`] is stored as independent macroblock rows, each behind its own lock, so that worker
//! threads can write different rows of the same picture concurrently while other pictures read
//! rows that have already been rendered.

use std::io::Write;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use crate::video_frame::slice_row::RowSetup;
use crate::video_frame::slice_row::SliceRow;
use crate::Resolution;

pub mod frame_pool;
pub mod slice_row;

pub const Y_PLANE: usize = 0;
pub const U_PLANE: usize = 1;
pub const V_PLANE: usize = 2;

/// Height in luma lines of a macroblock row.
pub const MB_SIZE: usize = 16;

/// Sample value that frames of problem pictures are filled with before decoding.
pub const NEUTRAL_SAMPLE: u8 = 128;

/// Pixels of one macroblock row: 16 luma lines and 8 lines of each chroma plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroblockRow {
    pub y: Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
    mb_width: usize,
}

impl MacroblockRow {
    pub fn new(mb_width: usize) -> Self {
        let luma = mb_width * MB_SIZE * MB_SIZE;
        Self {
            y: vec![0; luma],
            cb: vec![0; luma / 4],
            cr: vec![0; luma / 4],
            mb_width,
        }
    }

    /// Bytes per luma line.
    pub fn luma_stride(&self) -> usize {
        self.mb_width * MB_SIZE
    }

    /// Bytes per chroma line.
    pub fn chroma_stride(&self) -> usize {
        self.mb_width * MB_SIZE / 2
    }

    pub fn fill(&mut self, value: u8) {
        self.y.fill(value);
        self.cb.fill(value);
        self.cr.fill(value);
    }

    pub fn plane(&self, plane: usize) -> &[u8] {
        match plane {
            Y_PLANE => &self.y,
            U_PLANE => &self.cb,
            V_PLANE => &self.cr,
            _ => panic!("invalid plane {}", plane),
        }
    }
}

/// A frame of `mb_width` x `mb_height` macroblocks plus the decode state of each of its rows.
#[derive(Debug)]
pub struct Frame {
    mb_width: usize,
    rows: Vec<RwLock<MacroblockRow>>,
    slice_rows: Vec<SliceRow>,
}

impl Frame {
    pub fn new(mb_width: usize, mb_height: usize) -> Self {
        Self {
            mb_width,
            rows: (0..mb_height).map(|_| RwLock::new(MacroblockRow::new(mb_width))).collect(),
            slice_rows: (0..mb_height).map(|_| SliceRow::new()).collect(),
        }
    }

    pub fn mb_width(&self) -> usize {
        self.mb_width
    }

    pub fn mb_height(&self) -> usize {
        self.rows.len()
    }

    pub fn row(&self, row: usize) -> RwLockReadGuard<'_, MacroblockRow> {
        self.rows[row].read().unwrap()
    }

    pub fn row_mut(&self, row: usize) -> RwLockWriteGuard<'_, MacroblockRow> {
        self.rows[row].write().unwrap()
    }

    pub fn slice_row(&self, row: usize) -> &SliceRow {
        &self.slice_rows[row]
    }

    pub fn slice_rows(&self) -> &[SliceRow] {
        &self.slice_rows
    }

    /// Prepares every row for decoding a new picture.
    pub(crate) fn setup_rows(&self, setup: &RowSetup) {
        for (row, slice_row) in self.slice_rows.iter().enumerate() {
            slice_row.setup(setup.forward_for(row), setup.backward_for(row));
        }
    }

    /// Fills the whole frame with mid-gray.
    pub fn fill_neutral(&self) {
        for row in &self.rows {
            row.write().unwrap().fill(NEUTRAL_SAMPLE);
        }
    }

    /// Writes the visible `resolution` of the frame as planar I420.
    pub fn write_i420<W: Write>(&self, resolution: Resolution, out: &mut W) -> std::io::Result<()> {
        let width = (resolution.width as usize).min(self.mb_width * MB_SIZE);
        let height = (resolution.height as usize).min(self.mb_height() * MB_SIZE);
        let chroma_width = (width + 1) / 2;
        let chroma_height = (height + 1) / 2;

        for line in 0..height {
            let row = self.row(line / MB_SIZE);
            let start = (line % MB_SIZE) * row.luma_stride();
            out.write_all(&row.y[start..start + width])?;
        }

        for plane in [U_PLANE, V_PLANE] {
            for line in 0..chroma_height {
                let row = self.row(line / (MB_SIZE / 2));
                let start = (line % (MB_SIZE / 2)) * row.chroma_stride();
                out.write_all(&row.plane(plane)[start..start + chroma_width])?;
            }
        }

        Ok(())
    }

    /// Returns the visible `resolution` of the frame as planar I420.
    pub fn to_i420(&self, resolution: Resolution) -> Vec<u8> {
        let mut out = Vec::with_capacity(crate::i420_frame_size(resolution));
        // Writing to a vector cannot fail.
        let _ = self.write_i420(resolution, &mut out);
        out
    }
}
