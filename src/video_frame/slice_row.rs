// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Per-row decode state and the rows of reference pictures each row depends on.

use std::sync::Condvar;
use std::sync::Mutex;

use crate::codec::mpeg2::picture::Direction;

/// `f_code` value for which no motion vector range is defined.
pub const UNBOUNDED_F_CODE: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    /// The frame has not been claimed for a picture yet.
    Blank,
    /// Dependencies are known, the row can be decoded.
    Ready,
    /// One scan direction is decoding the row.
    Locked,
    /// The row is fully decoded.
    Rendered,
}

/// Rows of a reference frame that must be rendered before a row can be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDependency {
    /// Rows `top..=bottom`.
    Rows { top: usize, bottom: usize },
    /// The motion vector range is unbounded, so the whole reference frame is needed.
    WholeFrame,
}

impl RowDependency {
    /// Returns the rows of a reference frame of `rows` rows that row `row` can reach with vertical
    /// motion vectors coded with `f_code`.
    ///
    /// The reach is one row for `f_code` 1 and `2^(f_code - 2)` rows above it.
    pub fn for_row(row: usize, rows: usize, f_code: u8) -> Self {
        if f_code == UNBOUNDED_F_CODE || f_code == 0 || rows == 0 {
            return RowDependency::WholeFrame;
        }

        let reach = match f_code {
            1 => 1,
            f => 1usize << (f - 2),
        };

        RowDependency::Rows {
            top: row.saturating_sub(reach).min(rows - 1),
            bottom: (row + reach).min(rows - 1),
        }
    }
}

/// What a frame needs to know about a picture and its references to set up its rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowSetup {
    /// Vertical forward `f_code` and row count of the forward reference.
    pub forward: Option<(u8, usize)>,
    /// Vertical backward `f_code` and row count of the backward reference.
    pub backward: Option<(u8, usize)>,
}

impl RowSetup {
    pub(crate) fn forward_for(&self, row: usize) -> Option<RowDependency> {
        self.forward.map(|(f_code, rows)| RowDependency::for_row(row, rows, f_code))
    }

    pub(crate) fn backward_for(&self, row: usize) -> Option<RowDependency> {
        self.backward.map(|(f_code, rows)| RowDependency::for_row(row, rows, f_code))
    }
}

#[derive(Debug)]
struct SliceRowInner {
    state: RowState,
    forward: Option<RowDependency>,
    backward: Option<RowDependency>,
}

#[derive(Debug)]
pub struct SliceRow {
    inner: Mutex<SliceRowInner>,
    rendered: Condvar,
}

impl Default for SliceRow {
    fn default() -> Self {
        Self::new()
    }
}

impl SliceRow {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SliceRowInner {
                state: RowState::Blank,
                forward: None,
                backward: None,
            }),
            rendered: Condvar::new(),
        }
    }

    pub(crate) fn setup(&self, forward: Option<RowDependency>, backward: Option<RowDependency>) {
        let mut inner = self.inner.lock().unwrap();
        inner.state = RowState::Ready;
        inner.forward = forward;
        inner.backward = backward;
    }

    pub fn state(&self) -> RowState {
        self.inner.lock().unwrap().state
    }

    pub fn dependency(&self, direction: Direction) -> Option<RowDependency> {
        let inner = self.inner.lock().unwrap();
        match direction {
            Direction::Forward => inner.forward,
            Direction::Backward => inner.backward,
        }
    }

    /// Claims the row for decoding if it is `Ready`. Returns the state the row was in, so the
    /// claim succeeded only if `Ready` is returned.
    pub fn lock(&self) -> RowState {
        let mut inner = self.inner.lock().unwrap();
        let previous = inner.state;
        if previous == RowState::Ready {
            inner.state = RowState::Locked;
        }
        previous
    }

    pub fn set_rendered(&self) {
        let mut inner = self.inner.lock().unwrap();
        assert_eq!(inner.state, RowState::Locked, "rendering a row that was not claimed");
        inner.state = RowState::Rendered;
        self.rendered.notify_all();
    }

    pub fn wait_rendered(&self) {
        let mut inner = self.inner.lock().unwrap();
        while inner.state != RowState::Rendered {
            inner = self.rendered.wait(inner).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn dependency_ranges() {
        let rows = |top, bottom| RowDependency::Rows { top, bottom };
        for (f_code, expected) in [
            (1, rows(4, 6)),
            (2, rows(4, 6)),
            (3, rows(3, 7)),
            (4, rows(1, 9)),
            (9, rows(0, 19)),
        ] {
            assert_eq!(RowDependency::for_row(5, 20, f_code), expected, "f_code {}", f_code);
        }
        assert_eq!(RowDependency::for_row(5, 20, 15), RowDependency::WholeFrame);
        assert_eq!(RowDependency::for_row(5, 20, 0), RowDependency::WholeFrame);
    }

    #[test]
    fn dependency_ranges_are_clipped() {
        let rows = |top, bottom| RowDependency::Rows { top, bottom };
        // First and last rows of a 20-row reference.
        assert_eq!(RowDependency::for_row(0, 20, 1), rows(0, 1));
        assert_eq!(RowDependency::for_row(0, 20, 3), rows(0, 2));
        assert_eq!(RowDependency::for_row(19, 20, 2), rows(18, 19));
        assert_eq!(RowDependency::for_row(19, 20, 3), rows(17, 19));
        assert_eq!(RowDependency::for_row(3, 4, 9), rows(0, 3));
        // A reference with fewer rows than the current picture.
        assert_eq!(RowDependency::for_row(10, 4, 1), rows(3, 3));
    }

    #[test]
    fn first_claim_wins() {
        let row = SliceRow::new();
        assert_eq!(row.lock(), RowState::Blank);
        assert_eq!(row.state(), RowState::Blank);

        row.setup(None, Some(RowDependency::WholeFrame));
        assert_eq!(row.dependency(Direction::Backward), Some(RowDependency::WholeFrame));
        assert_eq!(row.lock(), RowState::Ready);
        assert_eq!(row.lock(), RowState::Locked);

        row.set_rendered();
        assert_eq!(row.lock(), RowState::Rendered);
        assert_eq!(row.state(), RowState::Rendered);
    }

    #[test]
    fn wait_for_rendering() {
        let row = Arc::new(SliceRow::new());
        row.setup(None, None);

        let waiter = {
            let row = Arc::clone(&row);
            thread::spawn(move || row.wait_rendered())
        };

        assert_eq!(row.lock(), RowState::Ready);
        row.set_rendered();
        waiter.join().unwrap();
    }
}
