use std::mem;
use std::path::Path;
use std::thread;

use log::{debug, error, info};

use crate::errors::AppError;
use crate::model::{CandidateEntry, ScanSummary};
use crate::steam::{FsAccess, app_manifest, list_dir_names};
use crate::vdf::VdfValue;

use super::executor::UiTask;
use super::{PipelineContext, report_warning};

/// Rows are posted as soon as a batch grows past this many entries.
pub const BATCH_THRESHOLD: usize = 10;
const CONTROLLER_TYPE: &str = "controller_steamcontroller_gordon";

/// Scans every user's profile list, then reports completion.
///
/// Completion is posted from `Drop`, so it is delivered on early exit and on
/// panic as well.
pub fn run_scanner(ctx: PipelineContext) {
    let mut state = ScannerState {
        ctx: &ctx,
        batch: Vec::new(),
        next_index: 0,
        root_found: false,
    };
    scan(&mut state);
}

struct ScannerState<'a> {
    ctx: &'a PipelineContext,
    batch: Vec<CandidateEntry>,
    next_index: usize,
    root_found: bool,
}

impl ScannerState<'_> {
    fn should_cancel(&self) -> bool {
        self.ctx.owner_queue.is_cancelled() || self.ctx.item_queue.is_cancelled()
    }

    fn send_event(&self, task: UiTask) {
        self.ctx.poster.post(task);
    }

    fn bump_warning(&self, message: String) {
        report_warning(&self.ctx.poster, message);
    }

    fn accept(&mut self, owner_id: String, item_id: String) {
        self.batch.push(CandidateEntry {
            index: self.next_index,
            owner_id,
            item_id,
            resolved_item_path: None,
        });
        self.next_index += 1;

        if self.batch.len() > BATCH_THRESHOLD {
            self.flush();
        }
    }

    /// Rows go out before their lookups, so the UI sees every row before any
    /// patch for it.
    fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }
        let batch = mem::take(&mut self.batch);
        let lookups: Vec<_> = batch
            .iter()
            .map(|entry| (entry.owner_lookup(), entry.item_lookup()))
            .collect();

        self.send_event(UiTask::AppendRows(batch));
        for (owner, item) in lookups {
            self.ctx.owner_queue.push(owner);
            self.ctx.item_queue.push(item);
        }
    }
}

impl Drop for ScannerState<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("profile scan aborted after {} entries", self.next_index);
        }
        self.flush();

        let summary = ScanSummary {
            accepted: self.next_index,
            root_found: self.root_found,
        };
        info!("profile scan finished with {} entries", summary.accepted);
        self.send_event(UiTask::ScanFinished(summary));
        self.ctx.owner_queue.close();
        self.ctx.item_queue.close();
    }
}

fn scan(state: &mut ScannerState<'_>) {
    let layout = state.ctx.fs.layout().clone();

    let Some(steamapps) = state.ctx.fs.lock().steamapps() else {
        state.bump_warning(format!(
            "Cannot find SteamApps directory under '{}'",
            layout.steam_root.display()
        ));
        return;
    };
    state.root_found = true;

    let userdata = layout.userdata_dir();
    if !userdata.is_dir() {
        state.bump_warning(format!(
            "Cannot find '{}'; no profiles to import",
            userdata.display()
        ));
        return;
    }

    for user in list_dir_names(&userdata) {
        if state.should_cancel() {
            debug!("profile scan cancelled");
            return;
        }

        let profile_list = layout.profile_list(&user);
        if !profile_list.is_file() {
            continue;
        }

        let access = state.ctx.fs.lock();
        debug!("Loading profile list from '{}'", profile_list.display());
        let accepted = read_selected_profiles(&access, &profile_list, &user).map(|selections| {
            selections
                .into_iter()
                .filter(|(owner_id, _)| app_manifest(&steamapps, owner_id).exists())
                .collect::<Vec<_>>()
        });
        drop(access);

        match accepted {
            Ok(selections) => {
                for (owner_id, item_id) in selections {
                    state.accept(owner_id, item_id);
                }
            }
            Err(error) => {
                error!("{error}");
                state.send_event(UiTask::Warning(error.to_string()));
            }
        }
    }
}

/// `(app id, selected profile id)` pairs in file order. Entries without a
/// selection are templates and are left out.
fn read_selected_profiles(
    access: &FsAccess<'_>,
    path: &Path,
    user: &str,
) -> Result<Vec<(String, String)>, AppError> {
    let doc = access.read_latin1(path)?;

    let Some(config) = doc
        .get_table("UserLocalConfigStore")
        .and_then(|store| store.get_table("controller_config"))
    else {
        return Ok(Vec::new());
    };

    let defaults = config
        .path(&[user, CONTROLLER_TYPE, "DEFAULT_FOR_TYPE"])
        .and_then(VdfValue::as_table)
        .ok_or_else(|| AppError::MissingKey {
            path: path.to_path_buf(),
            key: format!("controller_config/{user}/{CONTROLLER_TYPE}/DEFAULT_FOR_TYPE"),
        })?;

    Ok(defaults
        .iter()
        .filter_map(|(owner_id, value)| {
            let selected = value.as_table()?.get_str("selected")?;
            Some((owner_id.to_string(), selected.to_string()))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;
    use crate::import_list::ImportList;
    use crate::pipeline::executor::UiExecutor;
    use crate::pipeline::queue::Dequeue;
    use crate::steam::SteamLayout;

    fn profile_list(user: &str, games: &[(&str, Option<&str>)]) -> String {
        let mut body = String::new();
        for (game, selected) in games {
            body.push_str(&format!("\"{game}\"\n{{\n"));
            if let Some(selected) = selected {
                body.push_str(&format!("\"selected\" \"{selected}\"\n"));
            }
            body.push_str("}\n");
        }
        format!(
            "\"UserLocalConfigStore\"\n{{\n\"controller_config\"\n{{\n\"{user}\"\n{{\n\
             \"{CONTROLLER_TYPE}\"\n{{\n\"DEFAULT_FOR_TYPE\"\n{{\n{body}}}\n}}\n}}\n}}\n}}\n"
        )
    }

    fn steam_tree(games: &[(&str, Option<&str>)], installed: &[&str]) -> (TempDir, PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = temp.path().to_path_buf();
        let steamapps = root.join("steamapps");
        fs::create_dir_all(&steamapps).expect("steamapps");
        for app in installed {
            fs::write(app_manifest(&steamapps, app), "\"AppState\" { }").expect("manifest");
        }
        let config = root.join("userdata").join("42").join("config");
        fs::create_dir_all(&config).expect("config");
        fs::write(config.join("localconfig.vdf"), profile_list("42", games)).expect("list");
        (temp, root)
    }

    fn appended_batches(executor: &UiExecutor) -> (Vec<Vec<CandidateEntry>>, Option<ScanSummary>) {
        let mut batches = Vec::new();
        let mut summary = None;
        let mut list = ImportList::new();
        while executor.queued() > 0 {
            let before = list.len();
            executor.drain(&mut list, 1);
            if list.len() > before {
                batches.push(
                    list.rows()[before..]
                        .iter()
                        .map(|row| CandidateEntry {
                            index: row.index.expect("scanned row"),
                            owner_id: row.owner_id.clone(),
                            item_id: row.item_id.clone(),
                            resolved_item_path: None,
                        })
                        .collect(),
                );
            }
            if summary.is_none() {
                summary = list.scan_summary();
            }
        }
        (batches, summary)
    }

    #[test]
    fn posts_batches_of_eleven_and_queues_lookups() {
        let ids: Vec<String> = (0..25).map(|n| format!("{}", 1000 + n)).collect();
        let games: Vec<(&str, Option<&str>)> =
            ids.iter().map(|id| (id.as_str(), Some("777"))).collect();
        let installed: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (_temp, root) = steam_tree(&games, &installed);

        let executor = UiExecutor::new();
        let ctx = PipelineContext::new(SteamLayout::new(root), executor.poster());
        run_scanner(ctx.clone());

        let (batches, summary) = appended_batches(&executor);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, [11, 11, 3]);
        let indices: Vec<usize> = batches.iter().flatten().map(|e| e.index).collect();
        assert_eq!(indices, (0..25).collect::<Vec<_>>());
        assert_eq!(
            summary,
            Some(ScanSummary {
                accepted: 25,
                root_found: true
            })
        );

        assert_eq!(ctx.owner_queue.pushed(), 25);
        assert_eq!(ctx.item_queue.pushed(), 25);
        assert!(ctx.owner_queue.is_closed());
        assert_eq!(
            ctx.item_queue.pop_blocking(),
            Dequeue::Item(crate::model::ItemLookup {
                index: 0,
                owner_id: "1000".to_string(),
                item_id: "777".to_string(),
            })
        );
    }

    #[test]
    fn skips_templates_and_games_not_installed() {
        let games = [("10", Some("a")), ("20", None), ("30", Some("c")), ("40", Some("d"))];
        let (_temp, root) = steam_tree(&games, &["10", "20", "40"]);

        let executor = UiExecutor::new();
        let ctx = PipelineContext::new(SteamLayout::new(root), executor.poster());
        run_scanner(ctx);

        let (batches, _) = appended_batches(&executor);
        let kept: Vec<(usize, String)> = batches
            .into_iter()
            .flatten()
            .map(|entry| (entry.index, entry.owner_id))
            .collect();
        assert_eq!(kept, [(0, "10".to_string()), (1, "40".to_string())]);
    }

    #[test]
    fn malformed_profile_list_is_reported_and_skipped() {
        let (_temp, root) = steam_tree(&[], &[]);
        let broken = root.join("userdata").join("7").join("config");
        fs::create_dir_all(&broken).expect("config");
        fs::write(broken.join("localconfig.vdf"), "\"UserLocalConfigStore\" {").expect("write");

        let executor = UiExecutor::new();
        let ctx = PipelineContext::new(SteamLayout::new(root), executor.poster());
        run_scanner(ctx);

        let mut list = ImportList::new();
        executor.drain(&mut list, usize::MAX);
        assert!(list.scan_finished());
        assert!(list.is_empty());
        assert!(list.warnings().iter().any(|w| w.contains("localconfig.vdf")));
    }

    #[test]
    fn profile_list_without_user_section_names_missing_key() {
        let (_temp, root) = steam_tree(&[], &[]);
        let other = root.join("userdata").join("8").join("config");
        fs::create_dir_all(&other).expect("config");
        fs::write(other.join("localconfig.vdf"), profile_list("9", &[("10", Some("a"))]))
            .expect("write");

        let executor = UiExecutor::new();
        let ctx = PipelineContext::new(SteamLayout::new(root), executor.poster());
        run_scanner(ctx);

        let mut list = ImportList::new();
        executor.drain(&mut list, usize::MAX);
        assert!(list.is_empty());
        assert!(list.warnings().iter().any(|w| w.contains("DEFAULT_FOR_TYPE")));
    }

    #[test]
    fn missing_root_finishes_with_nothing() {
        let temp = TempDir::new().expect("temp dir");
        let executor = UiExecutor::new();
        let ctx = PipelineContext::new(SteamLayout::new(temp.path()), executor.poster());
        run_scanner(ctx.clone());

        let mut list = ImportList::new();
        executor.drain(&mut list, usize::MAX);
        assert_eq!(list.scan_summary(), Some(ScanSummary::default()));
        assert_eq!(list.warnings().len(), 1);
        assert_eq!(ctx.owner_queue.pop_blocking(), Dequeue::Closed);
        assert_eq!(ctx.item_queue.pop_blocking(), Dequeue::Closed);
    }
}
