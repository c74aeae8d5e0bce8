use std::fmt;
use std::path::PathBuf;

/// Title shown when no profile file yields a name.
pub const NOT_FOUND_TITLE: &str = "(not found)";

pub fn unknown_owner_name(owner_id: &str) -> String {
    format!("Unknown item {owner_id}")
}

/// One importable profile discovered in a user's profile list.
///
/// `owner_id` is the app id the profile is bound to and `item_id` the
/// selected workshop profile id.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CandidateEntry {
    pub index: usize,
    pub owner_id: String,
    pub item_id: String,
    pub resolved_item_path: Option<PathBuf>,
}

impl CandidateEntry {
    pub fn owner_lookup(&self) -> OwnerLookup {
        OwnerLookup {
            index: self.index,
            owner_id: self.owner_id.clone(),
        }
    }

    pub fn item_lookup(&self) -> ItemLookup {
        ItemLookup {
            index: self.index,
            owner_id: self.owner_id.clone(),
            item_id: self.item_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OwnerLookup {
    pub index: usize,
    pub owner_id: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ItemLookup {
    pub index: usize,
    pub owner_id: String,
    pub item_id: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OwnerPatch {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ItemPatch {
    pub index: usize,
    pub title: String,
    pub path: Option<PathBuf>,
    /// Whether the row may proceed to the import step.
    pub can_advance: bool,
}

impl ItemPatch {
    pub fn found(index: usize, title: String, path: PathBuf) -> Self {
        Self {
            index,
            title,
            path: Some(path),
            can_advance: true,
        }
    }

    pub fn not_found(index: usize) -> Self {
        Self {
            index,
            title: NOT_FOUND_TITLE.to_string(),
            path: None,
            can_advance: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ScanSummary {
    pub accepted: usize,
    pub root_found: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResolverKind {
    Owner,
    Item,
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Owner => "owner-name",
            Self::Item => "item-name",
        };
        write!(f, "{label}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_carry_entry_identity() {
        let entry = CandidateEntry {
            index: 4,
            owner_id: "440".to_string(),
            item_id: "1234".to_string(),
            resolved_item_path: None,
        };
        assert_eq!(entry.owner_lookup().owner_id, "440");
        assert_eq!(entry.item_lookup().item_id, "1234");
        assert_eq!(entry.item_lookup().index, 4);
    }

    #[test]
    fn not_found_patch_disables_next() {
        let patch = ItemPatch::not_found(3);
        assert_eq!(patch.title, NOT_FOUND_TITLE);
        assert!(patch.path.is_none());
        assert!(!patch.can_advance);
        assert_eq!(unknown_owner_name("70"), "Unknown item 70");
    }
}
