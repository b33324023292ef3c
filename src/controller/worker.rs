use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};

use super::{Completion, Dispatch, execute};
use crate::api::{ApiClient, ApiError, Transport};

/// Background thread that runs dispatched calls one at a time, in submission
/// order, so the UI never blocks on the network.
pub struct Worker {
    /// Calls waiting for the worker thread.
    calls_tx: mpsc::Sender<Dispatch>,
    /// Finished calls coming back to the UI thread.
    done_rx: mpsc::Receiver<Completion>,
    /// Set once the worker thread has gone away.
    stopped: bool,
}

impl Worker {
    pub fn spawn<T: Transport + 'static>(client: ApiClient<T>) -> Result<Self> {
        let (calls_tx, calls_rx) = mpsc::channel::<Dispatch>();
        let (done_tx, done_rx) = mpsc::channel::<Completion>();

        thread::Builder::new()
            .name("tasky-api".to_string())
            .spawn(move || {
                for Dispatch { ticket, call } in calls_rx {
                    let result = execute(&client, &call);
                    if done_tx.send(Completion { ticket, result }).is_err() {
                        break; // UI gone
                    }
                }
            })
            .context("failed to spawn request worker")?;

        Ok(Self {
            calls_tx,
            done_rx,
            stopped: false,
        })
    }

    /// Queue a call. If the worker is gone, the failure comes back as a
    /// completion so the caller can settle the ticket.
    pub fn submit(&mut self, dispatch: Dispatch) -> Option<Completion> {
        let ticket = dispatch.ticket;
        if self.calls_tx.send(dispatch).is_err() {
            self.stopped = true;
            return Some(Completion {
                ticket,
                result: Err(ApiError::Network("request worker stopped".to_string())),
            });
        }
        None
    }

    /// True once the worker thread has exited; every later call fails.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Drain every completion that has arrived so far.
    pub fn drain(&mut self) -> Vec<Completion> {
        let mut done = Vec::new();
        loop {
            match self.done_rx.try_recv() {
                Ok(completion) => done.push(completion),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.stopped = true;
                    break;
                }
            }
        }
        done
    }

    #[cfg(test)]
    fn wait(&self, timeout: std::time::Duration) -> Option<Completion> {
        self.done_rx.recv_timeout(timeout).ok()
    }
}
