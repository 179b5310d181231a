//! Bounded pools of worker threads.
//!
//! A [`WorkerPool`] owns a fixed number of threads that all pull messages from one shared queue.
//! Submitting never blocks: messages beyond the number of idle workers wait in the queue until a
//! worker frees up. Results are not returned by the pool itself; handlers report them through
//! whatever channel they captured, which keeps the pool oblivious to completion order.

use std::{
    io,
    panic::resume_unwind,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};

/// A builder object that can be used to configure and spawn a [`WorkerPool`].
#[derive(Clone)]
pub struct WorkerPoolBuilder {
    name: Option<String>,
    workers: usize,
}

impl WorkerPoolBuilder {
    /// Sets the name prefix of the worker threads.
    ///
    /// Threads are named `<name>-<index>`.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the number of worker threads, which is the maximum number of messages processed at
    /// the same time.
    ///
    /// By default, 1 worker is spawned. A value of 0 is treated as 1.
    pub fn workers(self, workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            ..self
        }
    }

    /// Spawns the worker threads, each using `handler` to process incoming messages.
    pub fn spawn<I, F>(self, handler: F) -> io::Result<WorkerPool<I>>
    where
        I: Send + 'static,
        F: Fn(I) + Send + Sync + 'static,
    {
        let (sender, recv) = crossbeam::channel::unbounded();
        let handler = Arc::new(handler);
        let mut handles = Vec::with_capacity(self.workers);
        for index in 0..self.workers {
            let name = self.name.as_ref().map(|name| format!("{name}-{index}"));
            let mut builder = thread::Builder::new();
            if let Some(name) = name.clone() {
                builder = builder.name(name);
            }

            let recv: Receiver<I> = recv.clone();
            let handler = handler.clone();
            let handle = builder.spawn(move || {
                if let Some(name) = &name {
                    log::trace!("worker '{name}' starting");
                }
                for message in recv {
                    handler(message);
                }
                if let Some(name) = &name {
                    log::trace!("worker '{name}' exiting");
                }
            })?;
            handles.push(handle);
        }

        Ok(WorkerPool {
            sender: Some(sender),
            recv,
            handles,
        })
    }
}

/// A fixed set of worker threads processing messages of type `I`.
///
/// When dropped, the queue is closed, the remaining queued messages are processed, and all threads
/// are joined. If a worker thread has panicked, the panic will be forwarded to the thread dropping
/// the [`WorkerPool`].
pub struct WorkerPool<I: Send + 'static> {
    sender: Option<Sender<I>>,
    /// Kept to allow discarding queued messages.
    recv: Receiver<I>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool<()> {
    /// Returns a builder that can be used to configure and spawn a [`WorkerPool`].
    #[inline]
    pub fn builder() -> WorkerPoolBuilder {
        WorkerPoolBuilder {
            name: None,
            workers: 1,
        }
    }
}

impl<I: Send + 'static> WorkerPool<I> {
    /// Returns the number of worker threads in this pool.
    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    /// Queues a message for processing by the next free worker.
    ///
    /// This never blocks.
    pub fn submit(&self, msg: I) {
        if let Some(sender) = &self.sender {
            // The pool holds a receiver itself, so the channel cannot be disconnected here.
            sender.send(msg).ok();
        }
    }

    /// Removes all messages that no worker has picked up yet, returning how many were removed.
    ///
    /// Messages that are already being processed are not affected.
    pub fn discard_queued(&self) -> usize {
        self.recv.try_iter().count()
    }

    /// Closes the queue and waits for all workers to finish the remaining messages.
    ///
    /// If a worker has panicked, the panic is propagated to the calling thread.
    pub fn join(mut self) {
        self.wait_for_exit();
    }

    fn wait_for_exit(&mut self) {
        // Close the channel to signal the threads to exit once the queue is drained.
        drop(self.sender.take());

        let mut payload = None;
        for handle in self.handles.drain(..) {
            if let Err(p) = handle.join() {
                payload.get_or_insert(p);
            }
        }
        if let Some(payload) = payload {
            if !thread::panicking() {
                resume_unwind(payload);
            }
        }
    }
}

impl<I: Send + 'static> Drop for WorkerPool<I> {
    fn drop(&mut self) {
        self.wait_for_exit();
    }
}
