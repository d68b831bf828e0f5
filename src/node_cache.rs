use crate::models::CheckState;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/*
 * Pure data store backing one selection provider: the primitive checkbox
 * value per path, plus the parallel set of directories whose selection is
 * incomplete beneath them. No traversal or propagation logic lives here;
 * providers own all behavior and this map only remembers the outcome.
 *
 * Entries are created lazily the first time a path is seen and removed when
 * the underlying file or tab goes away, so the map never grows beyond the
 * part of the tree that has actually been visited.
 */
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NodeCache {
    checked: HashMap<PathBuf, CheckState>,
    partial_dirs: HashSet<PathBuf>,
}

impl NodeCache {
    pub fn new() -> Self {
        NodeCache {
            checked: HashMap::new(),
            partial_dirs: HashSet::new(),
        }
    }

    /*
     * Returns the stored value for a path, or `Unchecked` when the path has
     * never been assigned one. Callers that need to distinguish "absent" from
     * "explicitly unchecked" use `get` instead.
     */
    pub fn state_of(&self, path: &Path) -> CheckState {
        self.checked.get(path).copied().unwrap_or_default()
    }

    pub fn get(&self, path: &Path) -> Option<CheckState> {
        self.checked.get(path).copied()
    }

    pub fn set(&mut self, path: impl Into<PathBuf>, state: CheckState) {
        self.checked.insert(path.into(), state);
    }

    pub fn remove(&mut self, path: &Path) -> Option<CheckState> {
        self.partial_dirs.remove(path);
        self.checked.remove(path)
    }

    pub fn is_checked(&self, path: &Path) -> bool {
        self.state_of(path).is_checked()
    }

    pub fn is_partial(&self, path: &Path) -> bool {
        self.partial_dirs.contains(path)
    }

    pub fn set_partial(&mut self, path: impl Into<PathBuf>) {
        self.partial_dirs.insert(path.into());
    }

    pub fn clear_partial(&mut self, path: &Path) {
        self.partial_dirs.remove(path);
    }

    pub fn clear(&mut self) {
        self.checked.clear();
        self.partial_dirs.clear();
    }

    pub fn len(&self) -> usize {
        self.checked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checked.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &CheckState)> {
        self.checked.iter()
    }

    /*
     * Paths currently holding a `Checked` entry, in map order. Providers
     * apply their own existence and exclusion filtering on top of this.
     */
    pub fn checked_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.checked
            .iter()
            .filter(|(_, state)| state.is_checked())
            .map(|(path, _)| path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.checked.keys()
    }
}
