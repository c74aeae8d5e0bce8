//! Delivery of pipeline results to the thread that owns [`ImportList`].
//!
//! Workers never touch presentation state. They post [`UiTask`] values
//! through a [`UiPoster`]; the UI thread applies them one at a time through
//! [`UiExecutor`]. Tasks from one poster keep their order, tasks from
//! different posters interleave freely.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::import_list::ImportList;
use crate::model::{CandidateEntry, ItemPatch, OwnerPatch, ResolverKind, ScanSummary};

pub type ScanFinishedCallback = Box<dyn FnOnce(&mut ImportList) + Send>;

pub enum UiTask {
    AppendRows(Vec<CandidateEntry>),
    PatchOwner(OwnerPatch),
    PatchItem(ItemPatch),
    Warning(String),
    ScanFinished(ScanSummary),
    ResolverStopped(ResolverKind),
    OnScanFinished(ScanFinishedCallback),
}

#[derive(Clone)]
pub struct UiPoster {
    sender: Sender<UiTask>,
}

impl UiPoster {
    /// Queues `task` for the UI thread. Never blocks.
    pub fn post(&self, task: UiTask) {
        // The executor only disappears on exit, when nobody reads results.
        let _ = self.sender.send(task);
    }

    /// Runs `callback` on the UI thread once the initial scan has finished,
    /// immediately if it already has.
    pub fn on_scan_finished(&self, callback: impl FnOnce(&mut ImportList) + Send + 'static) {
        self.post(UiTask::OnScanFinished(Box::new(callback)));
    }
}

pub struct UiExecutor {
    sender: Sender<UiTask>,
    receiver: Receiver<UiTask>,
}

impl Default for UiExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl UiExecutor {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn poster(&self) -> UiPoster {
        UiPoster {
            sender: self.sender.clone(),
        }
    }

    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Applies at most `max` queued tasks without waiting for new ones.
    pub fn drain(&self, list: &mut ImportList, max: usize) -> usize {
        let mut applied = 0;
        while applied < max {
            match self.receiver.try_recv() {
                Ok(task) => {
                    list.apply(task);
                    applied += 1;
                }
                Err(_) => break,
            }
        }
        applied
    }

    /// Waits up to `timeout` for the next task without applying it.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<UiTask> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Blocks the calling thread, applying tasks as they arrive, until `done`
    /// holds or `timeout` elapses. Returns whether `done` was reached.
    pub fn run_until(
        &self,
        list: &mut ImportList,
        timeout: Duration,
        mut done: impl FnMut(&ImportList) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done(list) {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.recv_timeout(remaining) {
                Some(task) => list.apply(task),
                None => return done(list),
            }
        }
    }
}
