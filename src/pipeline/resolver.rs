use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;

use log::{debug, error, info};

use crate::model::{
    ItemLookup, ItemPatch, OwnerLookup, OwnerPatch, ResolverKind, unknown_owner_name,
};
use crate::steam::{
    FsAccess, PROFILE_FILE, SharedFs, app_manifest, find_legacy_profile, list_dir_names,
    require_str, workshop_content,
};

use super::executor::{UiPoster, UiTask};
use super::queue::{Dequeue, LookupQueue};
use super::{PipelineContext, report_warning};

pub fn run_owner_resolver(ctx: PipelineContext) {
    serve_queue(
        &ctx.owner_queue,
        &ctx.poster,
        ResolverKind::Owner,
        |request: &OwnerLookup| {
            UiTask::PatchOwner(OwnerPatch {
                index: request.index,
                name: resolve_owner_name(&ctx.fs, &ctx.poster, &request.owner_id),
            })
        },
        |request| {
            UiTask::PatchOwner(OwnerPatch {
                index: request.index,
                name: unknown_owner_name(&request.owner_id),
            })
        },
    );
}

/// Posts [`UiTask::ResolverStopped`] however the resolver loop ends.
struct StopGuard<'a> {
    poster: &'a UiPoster,
    kind: ResolverKind,
}

impl Drop for StopGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            error!("{} resolver aborted", self.kind);
        }
        self.poster.post(UiTask::ResolverStopped(self.kind));
    }
}

/// Answers every request in `queue` until it is closed or cancelled.
///
/// A request whose lookup panics is answered with `fallback`, so every
/// queued row still gets exactly one patch.
pub fn serve_queue<T>(
    queue: &LookupQueue<T>,
    poster: &UiPoster,
    kind: ResolverKind,
    mut resolve: impl FnMut(&T) -> UiTask,
    fallback: impl Fn(&T) -> UiTask,
) {
    let _guard = StopGuard { poster, kind };
    loop {
        let request = match queue.pop_blocking() {
            Dequeue::Item(request) => request,
            Dequeue::Closed => break,
            Dequeue::Cancelled => {
                debug!("{kind} resolver cancelled");
                break;
            }
        };
        let task = match panic::catch_unwind(AssertUnwindSafe(|| resolve(&request))) {
            Ok(task) => task,
            Err(_) => {
                error!("{kind} lookup panicked, using placeholder");
                fallback(&request)
            }
        };
        poster.post(task);
    }
}

/// Display name for an app id, read from its app manifest.
///
/// Ids that are not purely numeric are already names and need no lookup.
/// Any failure degrades to [`unknown_owner_name`].
pub fn resolve_owner_name(fs: &SharedFs, poster: &UiPoster, owner_id: &str) -> String {
    if owner_id.is_empty() || !owner_id.bytes().all(|byte| byte.is_ascii_digit()) {
        return owner_id.to_string();
    }

    let mut access = fs.lock();
    let Some(steamapps) = access.steamapps() else {
        drop(access);
        report_warning(
            poster,
            format!("Cannot find SteamApps directory for app {owner_id}"),
        );
        return unknown_owner_name(owner_id);
    };

    let manifest = app_manifest(&steamapps, owner_id);
    if !manifest.exists() {
        drop(access);
        report_warning(
            poster,
            format!("Skipping non-existing app manifest '{}'", manifest.display()),
        );
        return unknown_owner_name(owner_id);
    }

    let name = access
        .read_utf8(&manifest)
        .and_then(|doc| require_str(&doc, &["AppState", "name"], &manifest));
    drop(access);

    match name {
        Ok(name) => name,
        Err(error) => {
            report_warning(
                poster,
                format!("Failed to load app manifest for '{owner_id}': {error}"),
            );
            unknown_owner_name(owner_id)
        }
    }
}

pub fn run_item_resolver(ctx: PipelineContext) {
    let mut resolver = ItemResolver::new(&ctx.fs, &ctx.poster);
    serve_queue(
        &ctx.item_queue,
        &ctx.poster,
        ResolverKind::Item,
        |request: &ItemLookup| UiTask::PatchItem(resolver.resolve(request)),
        |request| UiTask::PatchItem(ItemPatch::not_found(request.index)),
    );
}

/// Finds the title of a workshop profile.
///
/// Every directory under `workshop/content` is tried in name order and the
/// first one holding a readable `controller_configuration.vdf` wins. A
/// `*_legacy.bin` file alone proves the profile exists but yields no title,
/// so such a profile is reported as not found.
pub struct ItemResolver<'a> {
    fs: &'a SharedFs,
    poster: &'a UiPoster,
    reported_missing_content: bool,
}

impl<'a> ItemResolver<'a> {
    pub fn new(fs: &'a SharedFs, poster: &'a UiPoster) -> Self {
        Self {
            fs,
            poster,
            reported_missing_content: false,
        }
    }

    pub fn resolve(&mut self, request: &ItemLookup) -> ItemPatch {
        let mut access = self.fs.lock();
        let content = access.steamapps().map(|steamapps| workshop_content(&steamapps));

        let found = match &content {
            Some(content) if content.is_dir() => find_title(&access, content, &request.item_id),
            _ => None,
        };
        drop(access);

        if let Some((title, path)) = found {
            return ItemPatch::found(request.index, title, path);
        }

        match content {
            Some(content) if !content.is_dir() && !self.reported_missing_content => {
                self.reported_missing_content = true;
                report_warning(
                    self.poster,
                    format!(
                        "Cannot find '{}'; cannot import anything without it",
                        content.display()
                    ),
                );
            }
            _ => {}
        }
        report_warning(
            self.poster,
            format!(
                "Profile {} for game {} not found.",
                request.item_id, request.owner_id
            ),
        );
        ItemPatch::not_found(request.index)
    }
}

fn find_title(access: &FsAccess<'_>, content: &Path, item_id: &str) -> Option<(String, PathBuf)> {
    for owner_dir in list_dir_names(content) {
        let item_dir = content.join(&owner_dir).join(item_id);
        let primary = item_dir.join(PROFILE_FILE);

        if !primary.is_file() {
            if let Some(legacy) = find_legacy_profile(&item_dir) {
                debug!(
                    "'{}' has no readable title, looking further",
                    legacy.display()
                );
            }
            continue;
        }

        info!("Reading '{}'", primary.display());
        match access
            .read_utf8(&primary)
            .and_then(|doc| require_str(&doc, &["controller_mappings", "title"], &primary))
        {
            Ok(title) => return Some((title, primary)),
            Err(error) => error!("Failed to read profile name: {error}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::import_list::ImportList;
    use crate::model::{CandidateEntry, NOT_FOUND_TITLE, ScanSummary};
    use crate::pipeline::executor::UiExecutor;
    use crate::steam::SteamLayout;

    struct Fixture {
        _temp: TempDir,
        steamapps: PathBuf,
        fs: SharedFs,
        executor: UiExecutor,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().expect("temp dir");
            let steamapps = temp.path().join("SteamApps");
            fs::create_dir_all(workshop_content(&steamapps)).expect("content");
            Self {
                fs: SharedFs::new(SteamLayout::new(temp.path())),
                steamapps,
                _temp: temp,
                executor: UiExecutor::new(),
            }
        }

        fn profile_dir(&self, owner_dir: &str, item_id: &str) -> PathBuf {
            let dir = workshop_content(&self.steamapps).join(owner_dir).join(item_id);
            fs::create_dir_all(&dir).expect("profile dir");
            dir
        }

        fn warnings(&self) -> Vec<String> {
            let mut list = ImportList::new();
            self.executor.drain(&mut list, usize::MAX);
            list.warnings().to_vec()
        }

        fn lookup(&self, item_id: &str) -> ItemPatch {
            let poster = self.executor.poster();
            let mut resolver = ItemResolver::new(&self.fs, &poster);
            resolver.resolve(&ItemLookup {
                index: 0,
                owner_id: "440".to_string(),
                item_id: item_id.to_string(),
            })
        }
    }

    #[test]
    fn panicking_lookup_still_patches_row_and_settles() {
        let executor = UiExecutor::new();
        let poster = executor.poster();
        let queue = LookupQueue::new();
        let entries: Vec<CandidateEntry> = (0..3)
            .map(|index| CandidateEntry {
                index,
                owner_id: "440".to_string(),
                item_id: format!("{index}"),
                resolved_item_path: None,
            })
            .collect();
        for entry in &entries {
            queue.push(entry.item_lookup());
        }
        queue.close();

        serve_queue(
            &queue,
            &poster,
            ResolverKind::Item,
            |request: &ItemLookup| {
                if request.index == 1 {
                    panic!("corrupt profile");
                }
                UiTask::PatchItem(ItemPatch::found(
                    request.index,
                    "Title".to_string(),
                    PathBuf::from("/profile.vdf"),
                ))
            },
            |request| UiTask::PatchItem(ItemPatch::not_found(request.index)),
        );

        let mut list = ImportList::new();
        list.apply(UiTask::AppendRows(entries));
        list.apply(UiTask::ScanFinished(ScanSummary::default()));
        list.apply(UiTask::ResolverStopped(ResolverKind::Owner));
        executor.drain(&mut list, usize::MAX);

        assert!(list.is_settled());
        assert_eq!(list.row_by_index(0).expect("row 0").item_label(), "Title");
        assert_eq!(list.row_by_index(1).expect("row 1").item_label(), NOT_FOUND_TITLE);
        assert!(!list.can_advance(1));
        assert_eq!(list.row_by_index(2).expect("row 2").item_label(), "Title");
    }

    #[test]
    fn owner_name_comes_from_app_manifest() {
        let fixture = Fixture::new();
        fs::write(
            app_manifest(&fixture.steamapps, "440"),
            "\"AppState\"\n{\n\"appid\" \"440\"\n\"name\" \"Half-Life 2\"\n}\n",
        )
        .expect("manifest");

        let poster = fixture.executor.poster();
        assert_eq!(resolve_owner_name(&fixture.fs, &poster, "440"), "Half-Life 2");
        assert!(fixture.warnings().is_empty());
    }

    #[test]
    fn missing_app_manifest_falls_back_with_warning() {
        let fixture = Fixture::new();
        let poster = fixture.executor.poster();
        assert_eq!(
            resolve_owner_name(&fixture.fs, &poster, "99"),
            "Unknown item 99"
        );
        let warnings = fixture.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("appmanifest_99.acf"));
    }

    #[test]
    fn broken_app_manifest_falls_back() {
        let fixture = Fixture::new();
        fs::write(app_manifest(&fixture.steamapps, "7"), "\"AppState\" {").expect("manifest");
        let poster = fixture.executor.poster();
        assert_eq!(resolve_owner_name(&fixture.fs, &poster, "7"), "Unknown item 7");
        assert_eq!(fixture.warnings().len(), 1);
    }

    #[test]
    fn non_numeric_owner_is_its_own_name() {
        let fixture = Fixture::new();
        let poster = fixture.executor.poster();
        assert_eq!(
            resolve_owner_name(&fixture.fs, &poster, "steam_shortcut"),
            "steam_shortcut"
        );
        assert!(fixture.warnings().is_empty());
    }

    #[test]
    fn first_matching_owner_directory_wins() {
        let fixture = Fixture::new();
        fs::write(
            fixture.profile_dir("100", "555").join(PROFILE_FILE),
            "\"controller_mappings\" { \"title\" \"First\" }",
        )
        .expect("first");
        fs::write(
            fixture.profile_dir("200", "555").join(PROFILE_FILE),
            "\"controller_mappings\" { \"title\" \"Second\" }",
        )
        .expect("second");

        let patch = fixture.lookup("555");
        assert_eq!(patch.title, "First");
        assert!(patch.can_advance);
        assert!(patch.path.expect("path").starts_with(workshop_content(&fixture.steamapps).join("100")));
    }

    #[test]
    fn unreadable_profile_falls_through_to_next_owner() {
        let fixture = Fixture::new();
        fs::write(fixture.profile_dir("100", "555").join(PROFILE_FILE), "{").expect("broken");
        fs::write(
            fixture.profile_dir("200", "555").join(PROFILE_FILE),
            "\"controller_mappings\" { \"title\" \"Fallback\" }",
        )
        .expect("good");

        assert_eq!(fixture.lookup("555").title, "Fallback");
    }

    #[test]
    fn legacy_only_profile_is_not_found() {
        let fixture = Fixture::new();
        fs::write(
            fixture.profile_dir("100", "555").join("abc_legacy.bin"),
            "\"controller_mappings\" { \"title\" \"Legacy\" }",
        )
        .expect("legacy");

        let patch = fixture.lookup("555");
        assert_eq!(patch.title, NOT_FOUND_TITLE);
        assert!(patch.path.is_none());
        assert!(!patch.can_advance);
        assert!(fixture.warnings()[0].contains("555"));
    }
}
