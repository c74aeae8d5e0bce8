use std::collections::{HashMap, HashSet};
use std::mem;
use std::path::{Path, PathBuf};

use crate::model::{CandidateEntry, ItemPatch, OwnerPatch, ResolverKind, ScanSummary};
use crate::pipeline::executor::{ScanFinishedCallback, UiTask};

pub const DROPPED_OWNER_LABEL: &str = "No game";
pub const DROPPED_ITEM_LABEL: &str = "Dropped profile";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RowState {
    Pending,
    OwnerNamed,
    ItemNamed,
    Complete,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImportRow {
    /// Scanner index; `None` for profiles added by path.
    pub index: Option<usize>,
    pub owner_id: String,
    pub item_id: String,
    pub owner_name: Option<String>,
    pub item_name: Option<String>,
    pub profile_path: Option<PathBuf>,
    pub can_advance: bool,
}

impl ImportRow {
    fn from_entry(entry: CandidateEntry) -> Self {
        Self {
            index: Some(entry.index),
            owner_id: entry.owner_id,
            item_id: entry.item_id,
            owner_name: None,
            item_name: None,
            profile_path: entry.resolved_item_path,
            can_advance: false,
        }
    }

    pub fn state(&self) -> RowState {
        match (self.owner_name.is_some(), self.item_name.is_some()) {
            (false, false) => RowState::Pending,
            (true, false) => RowState::OwnerNamed,
            (false, true) => RowState::ItemNamed,
            (true, true) => RowState::Complete,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.can_advance && self.profile_path.is_some()
    }

    pub fn owner_label(&self) -> &str {
        self.owner_name.as_deref().unwrap_or(&self.owner_id)
    }

    pub fn item_label(&self) -> &str {
        self.item_name.as_deref().unwrap_or(&self.item_id)
    }

    fn apply_owner(&mut self, patch: OwnerPatch) {
        self.owner_name = Some(patch.name);
    }

    fn apply_item(&mut self, patch: ItemPatch) {
        self.item_name = Some(patch.title);
        self.profile_path = patch.path;
        self.can_advance = patch.can_advance;
    }
}

/// Everything the import screen shows. Owned by the UI thread and changed
/// only through [`ImportList::apply`].
#[derive(Default)]
pub struct ImportList {
    rows: Vec<ImportRow>,
    positions: HashMap<usize, usize>,
    early_owner: HashMap<usize, OwnerPatch>,
    early_item: HashMap<usize, ItemPatch>,
    warnings: Vec<String>,
    scan: Option<ScanSummary>,
    stopped: HashSet<ResolverKind>,
    scan_callbacks: Vec<ScanFinishedCallback>,
}

impl ImportList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with one row per profile file given by path, ahead of anything
    /// the scanner finds.
    pub fn with_dropped_profiles(paths: &[PathBuf]) -> Self {
        let mut list = Self::new();
        for path in paths {
            list.add_dropped_profile(path.clone());
        }
        list
    }

    pub fn apply(&mut self, task: UiTask) {
        match task {
            UiTask::AppendRows(entries) => self.append_rows(entries),
            UiTask::PatchOwner(patch) => match self.position(patch.index) {
                Some(pos) => self.rows[pos].apply_owner(patch),
                None => {
                    self.early_owner.insert(patch.index, patch);
                }
            },
            UiTask::PatchItem(patch) => match self.position(patch.index) {
                Some(pos) => self.rows[pos].apply_item(patch),
                None => {
                    self.early_item.insert(patch.index, patch);
                }
            },
            UiTask::Warning(message) => self.warnings.push(message),
            UiTask::ScanFinished(summary) => self.finish_scan(summary),
            UiTask::ResolverStopped(kind) => {
                self.stopped.insert(kind);
            }
            UiTask::OnScanFinished(callback) => self.on_scan_finished(callback),
        }
    }

    fn append_rows(&mut self, entries: Vec<CandidateEntry>) {
        for entry in entries {
            let index = entry.index;
            if self.positions.contains_key(&index) {
                continue;
            }
            let mut row = ImportRow::from_entry(entry);
            if let Some(patch) = self.early_owner.remove(&index) {
                row.apply_owner(patch);
            }
            if let Some(patch) = self.early_item.remove(&index) {
                row.apply_item(patch);
            }
            self.positions.insert(index, self.rows.len());
            self.rows.push(row);
        }
    }

    fn finish_scan(&mut self, summary: ScanSummary) {
        if self.scan.is_some() {
            return;
        }
        self.scan = Some(summary);
        for callback in mem::take(&mut self.scan_callbacks) {
            callback(self);
        }
    }

    pub fn on_scan_finished(&mut self, callback: ScanFinishedCallback) {
        if self.scan.is_some() {
            callback(self);
        } else {
            self.scan_callbacks.push(callback);
        }
    }

    pub fn add_dropped_profile(&mut self, path: PathBuf) {
        self.rows.push(ImportRow {
            index: None,
            owner_id: String::new(),
            item_id: String::new(),
            owner_name: Some(DROPPED_OWNER_LABEL.to_string()),
            item_name: Some(DROPPED_ITEM_LABEL.to_string()),
            profile_path: Some(path),
            can_advance: true,
        });
    }

    fn position(&self, index: usize) -> Option<usize> {
        self.positions.get(&index).copied()
    }

    pub fn rows(&self) -> &[ImportRow] {
        &self.rows
    }

    pub fn row_by_index(&self, index: usize) -> Option<&ImportRow> {
        self.position(index).map(|pos| &self.rows[pos])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The "next" affordance for the row at `pos`.
    pub fn can_advance(&self, pos: usize) -> bool {
        self.rows.get(pos).is_some_and(ImportRow::is_actionable)
    }

    pub fn profile_path(&self, pos: usize) -> Option<&Path> {
        self.rows
            .get(pos)
            .filter(|row| row.is_actionable())
            .and_then(|row| row.profile_path.as_deref())
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn scan_summary(&self) -> Option<ScanSummary> {
        self.scan
    }

    pub fn scan_finished(&self) -> bool {
        self.scan.is_some()
    }

    /// Whether the loading indicator is shown.
    pub fn loading(&self) -> bool {
        self.scan.is_none()
    }

    pub fn resolver_stopped(&self, kind: ResolverKind) -> bool {
        self.stopped.contains(&kind)
    }

    /// Scan finished and both resolvers drained their queues.
    pub fn is_settled(&self) -> bool {
        self.scan_finished()
            && self.resolver_stopped(ResolverKind::Owner)
            && self.resolver_stopped(ResolverKind::Item)
    }

    pub fn unresolved_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.state() != RowState::Complete)
            .count()
    }
}
