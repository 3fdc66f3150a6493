// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A pool of worker threads that grows on demand.
//!
//! Jobs are handed to an idle worker if there is one, and to a newly spawned worker otherwise.
//! Decode jobs block on each other (a row waits for the reference rows it depends on), so a
//! fixed-size pool could deadlock once all workers wait on jobs that have not started yet.

use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::sync::mpsc::TryRecvError;
use std::sync::Mutex;
use std::thread;
use std::thread::JoinHandle;

use log::debug;
use log::error;

/// A unit of work run on one of the engine's threads.
pub trait Job: Send {
    fn run(self: Box<Self>);
}

impl<F: FnOnce() + Send> Job for F {
    fn run(self: Box<Self>) {
        (*self)()
    }
}

enum Work {
    Run(Box<dyn Job>),
    Shutdown,
}

struct Worker {
    sender: Sender<Work>,
    thread: Option<JoinHandle<()>>,
}

struct EngineInner {
    workers: Vec<Worker>,
    /// Workers send their index here whenever they become idle.
    ready_sender: Sender<usize>,
}

pub struct DecodeEngine {
    inner: Mutex<EngineInner>,
    ready: Mutex<Receiver<usize>>,
}

impl Default for DecodeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeEngine {
    pub fn new() -> Self {
        let (ready_sender, ready) = mpsc::channel();
        Self {
            inner: Mutex::new(EngineInner {
                workers: Vec::new(),
                ready_sender,
            }),
            ready: Mutex::new(ready),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.inner.lock().unwrap().workers.len()
    }

    /// Runs `job` on an idle worker, or on a new one if all are busy.
    pub fn dispatch(&self, job: Box<dyn Job>) {
        let mut work = Work::Run(job);

        loop {
            let idle = match self.ready.lock().unwrap().try_recv() {
                Ok(index) => index,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };

            let inner = self.inner.lock().unwrap();
            match inner.workers[idle].sender.send(work) {
                Ok(()) => return,
                // The worker died, most likely from a panicking job. Try the next one.
                Err(mpsc::SendError(unsent)) => work = unsent,
            }
        }

        let mut inner = self.inner.lock().unwrap();
        let index = inner.workers.len();
        let (sender, receiver) = mpsc::channel();
        let ready_sender = inner.ready_sender.clone();

        debug!("spawning decode worker {}", index);
        let thread = thread::Builder::new()
            .name(format!("mpeg2-worker-{}", index))
            .spawn(move || worker_loop(index, work, receiver, ready_sender));

        match thread {
            Ok(thread) => inner.workers.push(Worker {
                sender,
                thread: Some(thread),
            }),
            Err(e) => panic!("unable to spawn decode worker: {}", e),
        }
    }
}

fn worker_loop(index: usize, first: Work, receiver: Receiver<Work>, ready: Sender<usize>) {
    let mut work = first;
    loop {
        match work {
            Work::Run(job) => job.run(),
            Work::Shutdown => break,
        }

        if ready.send(index).is_err() {
            break;
        }
        work = match receiver.recv() {
            Ok(work) => work,
            Err(_) => break,
        };
    }

    debug!("decode worker {} exiting", index);
}

impl Drop for DecodeEngine {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap();

        for worker in &inner.workers {
            // Fails only for workers that already exited.
            let _ = worker.sender.send(Work::Shutdown);
        }

        for (index, worker) in inner.workers.iter_mut().enumerate() {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    error!("decode worker {} panicked", index);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Barrier;
    use std::time::Duration;

    use super::*;

    #[test]
    fn grows_when_all_workers_are_busy() {
        let engine = DecodeEngine::new();
        let barrier = Arc::new(Barrier::new(5));

        for _ in 0..4 {
            let barrier = Arc::clone(&barrier);
            engine.dispatch(Box::new(move || {
                barrier.wait();
            }));
        }

        // All four jobs have to run concurrently for the barrier to open.
        barrier.wait();
        assert_eq!(engine.num_workers(), 4);
    }

    #[test]
    fn idle_workers_are_reused() {
        let engine = DecodeEngine::new();
        let (done_sender, done) = mpsc::channel();

        for i in 0..8 {
            let done_sender = done_sender.clone();
            engine.dispatch(Box::new(move || done_sender.send(i).unwrap()));
            assert_eq!(done.recv().unwrap(), i);
            // Let the worker report itself idle.
            thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(engine.num_workers(), 1);
    }

    #[test]
    fn drop_waits_for_running_jobs() {
        let finished = Arc::new(Mutex::new(0));
        {
            let engine = DecodeEngine::new();
            for _ in 0..3 {
                let finished = Arc::clone(&finished);
                engine.dispatch(Box::new(move || {
                    thread::sleep(Duration::from_millis(20));
                    *finished.lock().unwrap() += 1;
                }));
            }
        }

        assert_eq!(*finished.lock().unwrap(), 3);
    }
}
