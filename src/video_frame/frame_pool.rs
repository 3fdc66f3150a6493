// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A fixed set of frames shared by all pictures of a stream.
//!
//! Pictures never own a frame directly. Each holds a [`FrameHandle`] that gets bound to a frame
//! of the [`BufferPool`] when it is first retained. Once the last lock of a rendered frame is
//! released, the frame stays bound but becomes `Freeable`: retaining the handle again reuses the
//! decoded pixels, unless the frame has meanwhile been evicted to serve another handle.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;

use log::debug;
use log::warn;
use thiserror::Error;

use crate::decoder::BlockingMode;
use crate::video_frame::slice_row::RowSetup;
use crate::video_frame::Frame;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FramePoolError {
    #[error("all frames of the pool are in use")]
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Not bound to any handle, queued in the free list.
    Free,
    /// Bound to a handle and being written.
    Locked,
    /// Bound to a handle and fully decoded.
    Rendered,
    /// Fully decoded but not locked by anyone, queued in the freeable list.
    Freeable,
}

/// Number of frames in each part of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub free: usize,
    pub freeable: usize,
    /// Frames that are locked through a handle.
    pub held: usize,
}

#[derive(Debug, Default)]
struct HandleSlot {
    frame: Option<usize>,
    locks: usize,
}

#[derive(Debug)]
struct PoolInner {
    states: Vec<FrameState>,
    /// Handle each frame is bound to.
    owners: Vec<Option<usize>>,
    free: VecDeque<usize>,
    freeable: VecDeque<usize>,
    handles: Vec<HandleSlot>,
}

impl PoolInner {
    fn take_frame(&mut self) -> Option<usize> {
        if let Some(frame) = self.free.pop_front() {
            return Some(frame);
        }

        let frame = self.freeable.pop_front()?;
        if let Some(owner) = self.owners[frame].take() {
            debug!("evicting frame {} from handle {}", frame, owner);
            self.handles[owner].frame = None;
        }
        self.states[frame] = FrameState::Free;

        Some(frame)
    }

    fn unqueue_freeable(&mut self, frame: usize) {
        self.freeable.retain(|&f| f != frame);
    }
}

#[derive(Debug)]
pub struct BufferPool {
    frames: Vec<Frame>,
    inner: Mutex<PoolInner>,
    /// Signalled whenever a frame is released or rendered.
    activity: Condvar,
}

impl BufferPool {
    /// Creates a pool of `num_frames` frames of `mb_width` x `mb_height` macroblocks.
    pub fn new(num_frames: usize, mb_width: usize, mb_height: usize) -> Arc<Self> {
        Arc::new(Self {
            frames: (0..num_frames).map(|_| Frame::new(mb_width, mb_height)).collect(),
            inner: Mutex::new(PoolInner {
                states: vec![FrameState::Free; num_frames],
                owners: vec![None; num_frames],
                free: (0..num_frames).collect(),
                freeable: VecDeque::new(),
                handles: Vec::new(),
            }),
            activity: Condvar::new(),
        })
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Creates a new handle, initially not bound to any frame.
    pub fn new_handle(self: &Arc<Self>) -> FrameHandle {
        let mut inner = self.inner.lock().unwrap();
        inner.handles.push(Default::default());
        FrameHandle {
            pool: Arc::clone(self),
            id: inner.handles.len() - 1,
        }
    }

    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock().unwrap();
        let stats = PoolStats {
            free: inner.free.len(),
            freeable: inner.freeable.len(),
            held: inner
                .states
                .iter()
                .filter(|s| matches!(s, FrameState::Locked | FrameState::Rendered))
                .count(),
        };
        assert_eq!(stats.free + stats.freeable + stats.held, self.frames.len());

        stats
    }
}

/// The identity of the frame of a picture.
#[derive(Debug)]
pub struct FrameHandle {
    pool: Arc<BufferPool>,
    id: usize,
}

impl FrameHandle {
    /// Adds a lock on the frame of this handle, binding the handle to a frame first if needed.
    ///
    /// A newly bound frame is `Locked` and its rows are set up from `setup`. A bound frame is
    /// reused as is. If no frame is available, waits for one in blocking mode and fails otherwise.
    pub fn retain(&self, mode: BlockingMode, setup: &RowSetup) -> Result<(), FramePoolError> {
        let pool = &self.pool;
        let mut inner = pool.inner.lock().unwrap();

        loop {
            if let Some(frame) = inner.handles[self.id].frame {
                if inner.handles[self.id].locks == 0 {
                    assert_eq!(inner.states[frame], FrameState::Freeable);
                    inner.states[frame] = FrameState::Rendered;
                    inner.unqueue_freeable(frame);
                }
                inner.handles[self.id].locks += 1;
                return Ok(());
            }

            let Some(frame) = inner.take_frame() else {
                match mode {
                    BlockingMode::NonBlocking => {
                        warn!("frame pool of {} frames exhausted", pool.frames.len());
                        return Err(FramePoolError::Exhausted);
                    }
                    BlockingMode::Blocking => {
                        inner = pool.activity.wait(inner).unwrap();
                        continue;
                    }
                }
            };

            assert!(inner.owners[frame].is_none());
            inner.states[frame] = FrameState::Locked;
            inner.owners[frame] = Some(self.id);
            inner.handles[self.id] = HandleSlot {
                frame: Some(frame),
                locks: 1,
            };
            pool.frames[frame].setup_rows(setup);

            return Ok(());
        }
    }

    /// Adds a lock if the handle's frame holds a rendered picture, which is then guaranteed to
    /// stay valid until released. Returns whether a lock was added.
    pub fn retain_if_rendered(&self) -> bool {
        let mut inner = self.pool.inner.lock().unwrap();
        let Some(frame) = inner.handles[self.id].frame else {
            return false;
        };

        match inner.states[frame] {
            FrameState::Rendered => (),
            FrameState::Freeable => {
                inner.states[frame] = FrameState::Rendered;
                inner.unqueue_freeable(frame);
            }
            FrameState::Locked => return false,
            FrameState::Free => panic!("handle {} bound to free frame {}", self.id, frame),
        }

        inner.handles[self.id].locks += 1;
        true
    }

    /// Adds a lock on a handle that is already locked, and therefore bound.
    pub fn add_lock(&self) {
        let mut inner = self.pool.inner.lock().unwrap();
        let slot = &mut inner.handles[self.id];
        assert!(
            slot.frame.is_some() && slot.locks > 0,
            "adding a lock to unlocked handle {}",
            self.id
        );
        slot.locks += 1;
    }

    /// Removes a lock. When the last lock goes, a rendered frame becomes `Freeable` and a frame
    /// that was never rendered goes back to the free list.
    pub fn release(&self) {
        let mut inner = self.pool.inner.lock().unwrap();
        let slot = &mut inner.handles[self.id];
        assert!(slot.locks > 0, "releasing unlocked handle {}", self.id);
        slot.locks -= 1;
        if slot.locks > 0 {
            return;
        }

        let Some(frame) = slot.frame else {
            panic!("locked handle {} has no frame", self.id);
        };
        match inner.states[frame] {
            FrameState::Rendered => {
                inner.states[frame] = FrameState::Freeable;
                inner.freeable.push_back(frame);
            }
            FrameState::Locked => {
                inner.states[frame] = FrameState::Free;
                inner.owners[frame] = None;
                inner.handles[self.id].frame = None;
                inner.free.push_back(frame);
            }
            state => panic!("releasing frame {} in state {:?}", frame, state),
        }

        self.pool.activity.notify_all();
    }

    /// Marks the frame as completely decoded.
    pub fn set_rendered(&self) {
        let mut inner = self.pool.inner.lock().unwrap();
        let slot = &inner.handles[self.id];
        let frame = match slot.frame {
            Some(frame) if slot.locks > 0 => frame,
            _ => panic!("rendering handle {} without a locked frame", self.id),
        };

        assert_eq!(inner.states[frame], FrameState::Locked);
        inner.states[frame] = FrameState::Rendered;
        self.pool.activity.notify_all();
    }

    /// Waits until the frame is completely decoded. The caller must hold a lock.
    pub fn wait_rendered(&self) {
        let mut inner = self.pool.inner.lock().unwrap();
        loop {
            let Some(frame) = inner.handles[self.id].frame else {
                panic!("waiting on handle {} without a frame", self.id);
            };
            if inner.states[frame] == FrameState::Rendered {
                return;
            }
            inner = self.pool.activity.wait(inner).unwrap();
        }
    }

    pub fn is_rendered(&self) -> bool {
        let inner = self.pool.inner.lock().unwrap();
        inner.handles[self.id]
            .frame
            .map(|frame| matches!(inner.states[frame], FrameState::Rendered | FrameState::Freeable))
            .unwrap_or(false)
    }

    /// Number of locks held on this handle.
    pub fn locks(&self) -> usize {
        self.pool.inner.lock().unwrap().handles[self.id].locks
    }

    /// Returns the frame bound to this handle. The frame is only guaranteed to stay bound while
    /// the caller holds a lock.
    pub fn frame(&self) -> Option<&Frame> {
        let inner = self.pool.inner.lock().unwrap();
        inner.handles[self.id].frame.map(|frame| &self.pool.frames[frame])
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::codec::mpeg2::picture::Direction;
    use crate::video_frame::slice_row::RowDependency;
    use crate::video_frame::slice_row::RowState;

    fn stats(free: usize, freeable: usize, held: usize) -> PoolStats {
        PoolStats {
            free,
            freeable,
            held,
        }
    }

    #[test]
    fn lifecycle() {
        let pool = BufferPool::new(2, 1, 4);
        let handle = pool.new_handle();
        assert!(!handle.retain_if_rendered());

        handle.retain(BlockingMode::NonBlocking, &Default::default()).unwrap();
        assert_eq!(pool.stats(), stats(1, 0, 1));
        assert!(!handle.is_rendered());
        assert!(!handle.retain_if_rendered());

        handle.set_rendered();
        handle.release();
        assert_eq!(pool.stats(), stats(1, 1, 0));
        assert!(handle.is_rendered());

        // Reclaimed without decoding.
        assert!(handle.retain_if_rendered());
        assert_eq!(pool.stats(), stats(1, 0, 1));
        assert_eq!(handle.locks(), 1);
        handle.release();
        assert_eq!(pool.stats(), stats(1, 1, 0));
    }

    #[test]
    fn abandoned_claim_returns_to_free_list() {
        let pool = BufferPool::new(1, 1, 1);
        let handle = pool.new_handle();
        handle.retain(BlockingMode::NonBlocking, &Default::default()).unwrap();
        handle.release();

        assert_eq!(pool.stats(), stats(1, 0, 0));
        assert!(handle.frame().is_none());
    }

    #[test]
    fn eviction_unbinds_previous_owner() {
        let pool = BufferPool::new(1, 1, 1);
        let first = pool.new_handle();
        let second = pool.new_handle();

        first.retain(BlockingMode::NonBlocking, &Default::default()).unwrap();
        assert_eq!(
            second.retain(BlockingMode::NonBlocking, &Default::default()),
            Err(FramePoolError::Exhausted)
        );

        first.set_rendered();
        first.release();
        second.retain(BlockingMode::NonBlocking, &Default::default()).unwrap();

        assert!(first.frame().is_none());
        assert!(!first.retain_if_rendered());
        assert_eq!(pool.stats(), stats(0, 0, 1));
    }

    #[test]
    fn shared_locks() {
        let pool = BufferPool::new(2, 1, 1);
        let handle = pool.new_handle();
        handle.retain(BlockingMode::NonBlocking, &Default::default()).unwrap();
        handle.add_lock();
        assert_eq!(handle.locks(), 2);
        assert_eq!(pool.stats(), stats(1, 0, 1));

        handle.set_rendered();
        handle.release();
        assert_eq!(pool.stats(), stats(1, 0, 1));
        handle.release();
        assert_eq!(pool.stats(), stats(1, 1, 0));
    }

    #[test]
    fn claim_sets_up_rows() {
        let pool = BufferPool::new(1, 1, 20);
        let handle = pool.new_handle();
        let setup = RowSetup {
            forward: Some((2, 20)),
            backward: Some((15, 20)),
        };
        handle.retain(BlockingMode::NonBlocking, &setup).unwrap();

        let frame = handle.frame().unwrap();
        let row = frame.slice_row(5);
        assert_eq!(row.state(), RowState::Ready);
        assert_eq!(
            row.dependency(Direction::Forward),
            Some(RowDependency::Rows { top: 4, bottom: 6 })
        );
        assert_eq!(
            row.dependency(Direction::Backward),
            Some(RowDependency::WholeFrame)
        );
    }

    #[test]
    fn blocking_retain_waits_for_release() {
        let pool = BufferPool::new(1, 1, 1);
        let first = pool.new_handle();
        let second = pool.new_handle();
        first.retain(BlockingMode::Blocking, &Default::default()).unwrap();

        let waiter = thread::spawn(move || {
            second.retain(BlockingMode::Blocking, &Default::default()).unwrap();
            second
        });

        thread::sleep(Duration::from_millis(20));
        first.set_rendered();
        first.release();

        let second = waiter.join().unwrap();
        assert_eq!(second.locks(), 1);
        assert!(first.frame().is_none());
        assert_eq!(pool.stats(), stats(0, 0, 1));
    }

    #[test]
    fn wait_rendered_wakes_up() {
        let pool = BufferPool::new(1, 1, 1);
        let handle = Arc::new(pool.new_handle());
        handle.retain(BlockingMode::Blocking, &Default::default()).unwrap();

        let waiter = {
            let handle = Arc::clone(&handle);
            thread::spawn(move || handle.wait_rendered())
        };
        thread::sleep(Duration::from_millis(10));
        handle.set_rendered();
        waiter.join().unwrap();
    }
}
