//! Background import of controller profiles.
//!
//! One scanner thread reads every user's profile list and posts placeholder
//! rows in batches. For each row it queues one owner-name lookup and one
//! item-name lookup, each drained by its own resolver thread. All results
//! travel to the UI thread as [`UiTask`] values.

pub mod executor;
pub mod queue;
pub mod resolver;
pub mod scanner;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};

use crate::errors::AppError;
use crate::import_list::ImportList;
use crate::model::{ItemLookup, OwnerLookup};
use crate::steam::{SharedFs, SteamLayout};

use self::executor::{UiExecutor, UiPoster, UiTask};
use self::queue::LookupQueue;

#[derive(Clone)]
pub struct PipelineContext {
    pub fs: Arc<SharedFs>,
    pub poster: UiPoster,
    pub owner_queue: Arc<LookupQueue<OwnerLookup>>,
    pub item_queue: Arc<LookupQueue<ItemLookup>>,
}

impl PipelineContext {
    pub fn new(layout: SteamLayout, poster: UiPoster) -> Self {
        Self {
            fs: Arc::new(SharedFs::new(layout)),
            poster,
            owner_queue: Arc::new(LookupQueue::new()),
            item_queue: Arc::new(LookupQueue::new()),
        }
    }
}

/// Logs `message` and shows it on the status line.
pub fn report_warning(poster: &UiPoster, message: String) {
    warn!("{message}");
    poster.post(UiTask::Warning(message));
}

pub struct ImportSession {
    owner_queue: Arc<LookupQueue<OwnerLookup>>,
    item_queue: Arc<LookupQueue<ItemLookup>>,
    joins: Vec<JoinHandle<()>>,
}

impl ImportSession {
    pub fn start(layout: SteamLayout, poster: UiPoster) -> Result<Self, AppError> {
        let ctx = PipelineContext::new(layout, poster);
        let mut session = Self {
            owner_queue: Arc::clone(&ctx.owner_queue),
            item_queue: Arc::clone(&ctx.item_queue),
            joins: Vec::with_capacity(3),
        };

        let owner_ctx = ctx.clone();
        session.spawn("vdf-owner-names", move || {
            resolver::run_owner_resolver(owner_ctx)
        })?;
        let item_ctx = ctx.clone();
        session.spawn("vdf-item-names", move || resolver::run_item_resolver(item_ctx))?;
        session.spawn("vdf-scanner", move || scanner::run_scanner(ctx))?;

        Ok(session)
    }

    fn spawn(&mut self, name: &str, work: impl FnOnce() + Send + 'static) -> Result<(), AppError> {
        let join = thread::Builder::new().name(name.to_string()).spawn(work)?;
        self.joins.push(join);
        Ok(())
    }

    /// Stops both resolvers, even with lookups still queued, and waits for
    /// all three threads.
    pub fn shutdown(&mut self) {
        if self.joins.is_empty() {
            return;
        }
        debug!("shutting down import session");
        self.owner_queue.cancel();
        self.item_queue.cancel();
        for join in self.joins.drain(..) {
            let _ = join.join();
        }
    }
}

impl Drop for ImportSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs a whole session with the calling thread as UI thread and returns the
/// list once both resolvers have stopped or `timeout` has passed.
pub fn run_import_blocking(
    layout: SteamLayout,
    dropped_profiles: &[PathBuf],
    timeout: Duration,
) -> Result<ImportList, AppError> {
    let executor = UiExecutor::new();
    let mut list = ImportList::with_dropped_profiles(dropped_profiles);
    let mut session = ImportSession::start(layout, executor.poster())?;

    executor.run_until(&mut list, timeout, ImportList::is_settled);
    session.shutdown();
    executor.drain(&mut list, usize::MAX);

    Ok(list)
}
