use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, MutexGuard};

use crate::errors::AppError;
use crate::vdf::{self, VdfTable};

/// Steam accepts any of these spellings for its apps directory.
pub const STEAMAPPS_VARIANTS: [&str; 4] = ["SteamApps", "steamapps", "Steamapps", "steamApps"];
pub const PROFILE_LIST: &str = "config/localconfig.vdf";
pub const PROFILE_FILE: &str = "controller_configuration.vdf";
pub const LEGACY_SUFFIX: &str = "_legacy.bin";

#[derive(Debug, Clone)]
pub struct SteamLayout {
    pub steam_root: PathBuf,
}

impl SteamLayout {
    pub fn new(steam_root: impl Into<PathBuf>) -> Self {
        Self {
            steam_root: steam_root.into(),
        }
    }

    /// `~/.steam/steam`, if a home directory is known.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".steam").join("steam"))
    }

    pub fn userdata_dir(&self) -> PathBuf {
        self.steam_root.join("userdata")
    }

    pub fn profile_list(&self, user: &str) -> PathBuf {
        self.userdata_dir().join(user).join(PROFILE_LIST)
    }

    pub fn probe_steamapps(&self) -> Option<PathBuf> {
        STEAMAPPS_VARIANTS
            .iter()
            .map(|name| self.steam_root.join(name))
            .find(|path| path.exists())
    }
}

pub fn app_manifest(steamapps: &Path, app_id: &str) -> PathBuf {
    steamapps.join(format!("appmanifest_{app_id}.acf"))
}

pub fn workshop_content(steamapps: &Path) -> PathBuf {
    steamapps.join("workshop").join("content")
}

/// First file in `dir` named `*_legacy.bin`, if any.
pub fn find_legacy_profile(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(Result::ok)
        .find(|entry| entry.file_name().to_string_lossy().ends_with(LEGACY_SUFFIX))
        .map(|entry| entry.path())
}

/// Sorted names of the sub-directories of `dir`; empty when unreadable.
pub fn list_dir_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[derive(Debug, Default)]
struct RootCache {
    steamapps: Option<PathBuf>,
}

/// Disk access shared by the scanner and both resolvers.
///
/// Every manifest read goes through [`FsAccess`], which only exists while the
/// session mutex is held.
#[derive(Debug)]
pub struct SharedFs {
    layout: SteamLayout,
    cache: Mutex<RootCache>,
}

impl SharedFs {
    pub fn new(layout: SteamLayout) -> Self {
        Self {
            layout,
            cache: Mutex::new(RootCache::default()),
        }
    }

    pub fn layout(&self) -> &SteamLayout {
        &self.layout
    }

    pub fn lock(&self) -> FsAccess<'_> {
        FsAccess {
            layout: &self.layout,
            cache: self.cache.lock(),
        }
    }
}

pub struct FsAccess<'a> {
    layout: &'a SteamLayout,
    cache: MutexGuard<'a, RootCache>,
}

impl FsAccess<'_> {
    /// The apps directory, probed once and remembered after the first hit.
    pub fn steamapps(&mut self) -> Option<PathBuf> {
        if let Some(path) = &self.cache.steamapps {
            return Some(path.clone());
        }
        let found = self.layout.probe_steamapps()?;
        self.cache.steamapps = Some(found.clone());
        Some(found)
    }

    /// Reads an ISO-8859-1 encoded document, like the per-user profile list.
    pub fn read_latin1(&self, path: &Path) -> Result<VdfTable, AppError> {
        let bytes = read_bytes(path)?;
        parse_at(path, &vdf::decode_latin1(&bytes))
    }

    pub fn read_utf8(&self, path: &Path) -> Result<VdfTable, AppError> {
        let bytes = read_bytes(path)?;
        let text = vdf::decode_utf8(bytes).map_err(|source| AppError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        parse_at(path, &text)
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, AppError> {
    fs::read(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_at(path: &Path, text: &str) -> Result<VdfTable, AppError> {
    vdf::parse(text).map_err(|source| AppError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// String at `keys` inside `doc`, or a [`AppError::MissingKey`] naming the
/// first absent key.
pub fn require_str(doc: &VdfTable, keys: &[&str], path: &Path) -> Result<String, AppError> {
    let mut table = doc;
    for (depth, key) in keys.iter().enumerate() {
        let missing = || AppError::MissingKey {
            path: path.to_path_buf(),
            key: keys[..=depth].join("/"),
        };
        if depth + 1 == keys.len() {
            return table.get_str(key).map(str::to_string).ok_or_else(missing);
        }
        table = table.get_table(key).ok_or_else(missing)?;
    }
    Err(AppError::MissingKey {
        path: path.to_path_buf(),
        key: String::new(),
    })
}
