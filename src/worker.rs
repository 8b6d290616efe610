//! Runs a [`Simulation`] on its own thread, off the render path.
//!
//! The worker owns the simulation outright and handles one request at a time
//! to completion. Requests and replies cross over `crossbeam` channels, so
//! every position buffer moves to the host instead of being shared.

use std::thread::JoinHandle;

use bevy::log::{debug, warn};
use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::error::{SimError, SimResult};
use crate::messages::{Request, Response, handle};
use crate::resources::SimConfig;
use crate::simulation::Simulation;

pub type Reply = SimResult<Response>;

pub struct PhysicsWorker {
    requests: Option<Sender<Request>>,
    replies: Receiver<Reply>,
    thread: Option<JoinHandle<()>>,
    disconnected: bool,
}

impl PhysicsWorker {
    pub fn spawn(config: SimConfig) -> SimResult<Self> {
        let (request_tx, request_rx) = channel::unbounded();
        let (reply_tx, reply_rx) = channel::unbounded();

        let thread = std::thread::Builder::new()
            .name("physics-worker".to_string())
            .spawn(move || run(Simulation::new(config), request_rx, reply_tx))?;

        Ok(Self {
            requests: Some(request_tx),
            replies: reply_rx,
            thread: Some(thread),
            disconnected: false,
        })
    }

    /// Queues a request. Unknown requests never produce a reply.
    pub fn send(&self, request: Request) -> SimResult<()> {
        let requests = self.requests.as_ref().ok_or(SimError::Disconnected)?;
        requests.send(request).map_err(|_| SimError::Disconnected)
    }

    /// Next reply if one is ready. A worker that has gone away is reported
    /// as `Disconnected` exactly once; after that this returns `None`.
    pub fn try_recv(&mut self) -> Option<Reply> {
        if self.disconnected {
            return None;
        }
        match self.replies.try_recv() {
            Ok(reply) => Some(reply),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.disconnected = true;
                Some(Err(SimError::Disconnected))
            }
        }
    }

    /// Whether `try_recv` has seen the reply channel close.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// A worker with no thread behind it, whose replies are already closed.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (_, replies) = channel::unbounded();
        Self {
            requests: None,
            replies,
            thread: None,
            disconnected: false,
        }
    }

    /// Blocks until the next reply arrives.
    pub fn recv(&self) -> Reply {
        self.replies.recv().map_err(|_| SimError::Disconnected)?
    }

    /// Closes the request queue and waits for queued requests to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.requests.take();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("physics worker panicked");
        }
    }
}

impl Drop for PhysicsWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut sim: Simulation, requests: Receiver<Request>, replies: Sender<Reply>) {
    for request in requests.iter() {
        let reply = match handle(&mut sim, request) {
            Ok(Some(response)) => Ok(response),
            Ok(None) => continue,
            Err(err) => {
                warn!("request rejected: {err}");
                Err(err)
            }
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
    debug!("physics worker stopped");
}
