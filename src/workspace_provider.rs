/*
 * The workspace-tree side of the selection engine. Owns a `NodeCache` scoped
 * to the whole project tree and implements the tri-state propagation rules:
 * checking a directory flows down to every eligible descendant, checking a
 * file flows up through the ancestor chain, and directories report a partial
 * marker while selection beneath them is incomplete.
 *
 * Excluded paths are pruned, not descended into: they never receive a cache
 * entry and never influence an ancestor's derived state. Filesystem errors
 * during traversal degrade to "subtree is empty" after a log line; nothing
 * in this module is fatal.
 */
use crate::coordinator::ChangeNotifier;
use crate::exclusion::ExclusionCheckerOperations;
use crate::file_system;
use crate::models::{CheckState, NodeDescriptor};
use crate::node_cache::NodeCache;
use crate::path_utils;
use crate::tokenizer_utils::{FileTokenCache, TokenCounterOperations};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct WorkspaceSelectionProvider {
    root: PathBuf,
    cache: NodeCache,
    exclusion: Arc<dyn ExclusionCheckerOperations>,
    token_counter: Arc<dyn TokenCounterOperations>,
    /* Per-file token counts, each guarded by the checksum of the content it
     * was computed from. */
    file_tokens: FileTokenCache,
    /* Recursive token sums per directory. Cleared wholesale on rule reloads,
     * invalidated along the ancestor chain on file changes. */
    directory_token_counts: HashMap<PathBuf, usize>,
    notifier: Option<ChangeNotifier>,
}

impl WorkspaceSelectionProvider {
    pub fn new(
        root: impl Into<PathBuf>,
        exclusion: Arc<dyn ExclusionCheckerOperations>,
        token_counter: Arc<dyn TokenCounterOperations>,
    ) -> Self {
        WorkspaceSelectionProvider {
            root: root.into(),
            cache: NodeCache::new(),
            exclusion,
            token_counter,
            file_tokens: FileTokenCache::new(),
            directory_token_counts: HashMap::new(),
            notifier: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn set_change_notifier(&mut self, notifier: ChangeNotifier) {
        self.notifier = Some(notifier);
    }

    fn notify_checked_files_changed(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.notify();
        }
    }

    /*
     * Whether a path is outside the selectable tree: not under the project
     * root, matched by ignore rules, or (for files) carrying an ignored
     * extension. Eligibility is the gate for every traversal in this module.
     */
    fn is_eligible(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if self.exclusion.is_excluded(relative, is_dir) {
            return false;
        }
        if !is_dir && self.exclusion.has_ignored_extension(path) {
            return false;
        }
        true
    }

    pub fn state_of(&self, path: &Path) -> CheckState {
        self.cache.state_of(path)
    }

    pub fn is_partial(&self, path: &Path) -> bool {
        self.cache.is_partial(path)
    }

    /*
     * True when the path itself or any ancestor directory up to the project
     * root holds a direct `Checked` entry. This is the coordinator's read of
     * "workspace truth" for an open file: a file inside a checked directory
     * counts as checked even if its own entry has not materialized yet.
     */
    pub fn is_checked_with_ancestors(&self, path: &Path) -> bool {
        if self.cache.is_checked(path) {
            return true;
        }
        path_utils::ancestors_up_to_root(path, &self.root).any(|dir| self.cache.is_checked(dir))
    }

    /*
     * Lists one level of the tree for presentation: the children of `parent`,
     * or of the project root when `parent` is `None`. Excluded entries are
     * absent entirely. A node first seen under a `Checked` parent inherits
     * `Checked` here, which is what makes a checked directory act as a
     * standing selection for content that appears later.
     */
    pub fn get_children(&mut self, parent: Option<&Path>) -> Vec<NodeDescriptor> {
        let dir = parent.unwrap_or(&self.root).to_path_buf();
        if dir != self.root && !self.is_eligible(&dir, true) {
            return Vec::new();
        }

        let entries = match file_system::list_entries(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("WorkspaceProvider: Could not list {dir:?}: {e}");
                return Vec::new();
            }
        };

        let mut descriptors = Vec::new();
        for entry in entries {
            if !self.is_eligible(&entry.path, entry.is_dir) {
                continue;
            }

            let state = match self.cache.get(&entry.path) {
                Some(state) => state,
                None => {
                    let parent_checked = entry
                        .path
                        .parent()
                        .map(|p| self.cache.is_checked(p))
                        .unwrap_or(false);
                    if parent_checked {
                        self.cache.set(entry.path.clone(), CheckState::Checked);
                        CheckState::Checked
                    } else {
                        CheckState::Unchecked
                    }
                }
            };

            let token_count = if entry.is_dir {
                self.directory_token_count(&entry.path)
            } else {
                self.file_token_count(&entry.path)
            };

            descriptors.push(NodeDescriptor {
                is_partial: entry.is_dir && self.cache.is_partial(&entry.path),
                path: entry.path,
                name: entry.name,
                is_dir: entry.is_dir,
                is_symlink: entry.is_symlink,
                is_open_file: false,
                state,
                token_count,
            });
        }
        descriptors
    }

    /*
     * Applies a user toggle. A directory currently marked partial always
     * completes to `Checked`, whatever the incoming value: clicking a
     * half-selected folder means "select everything under here", not "drop
     * the half I already picked".
     */
    pub fn set_checked(&mut self, path: &Path, state: CheckState) {
        if !path_utils::is_within_root(path, &self.root) {
            log::debug!("WorkspaceProvider: Ignoring toggle outside project root: {path:?}");
            return;
        }

        let is_dir = path.is_dir();
        if state.is_checked() && !self.is_eligible(path, is_dir) {
            log::debug!("WorkspaceProvider: Refusing to check excluded path {path:?}");
            return;
        }

        let mut state = state;
        if is_dir && self.cache.is_partial(path) {
            state = CheckState::Checked;
        }

        self.cache.clear_partial(path);
        self.cache.set(path.to_path_buf(), state);
        if is_dir {
            self.propagate_to_descendants(path, state);
            // A directory's own value is derived; checking one with no
            // eligible descendants resolves back to "leave unchecked".
            self.recompute_directory_state(path);
        }
        self.update_ancestor_states(path);

        log::debug!("WorkspaceProvider: Set {path:?} to {state:?}.");
        self.notify_checked_files_changed();
    }

    /*
     * Pre-order descendant write. Excluded subtrees are pruned: the walk does
     * not descend into them and their nodes keep no cache entries. Partial
     * markers are wiped on every visited directory; after a full-subtree
     * write no directory below the target can be half-selected.
     */
    fn propagate_to_descendants(&mut self, dir: &Path, state: CheckState) {
        let entries = match file_system::list_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("WorkspaceProvider: Could not descend into {dir:?}: {e}");
                return;
            }
        };

        for entry in entries {
            if !self.is_eligible(&entry.path, entry.is_dir) {
                continue;
            }
            self.cache.clear_partial(&entry.path);
            self.cache.set(entry.path.clone(), state);
            if entry.is_dir {
                self.propagate_to_descendants(&entry.path, state);
            }
        }
    }

    /*
     * Bottom-up ancestor pass: recomputes each ancestor directory from its
     * immediate children only, reading their already-cached states. Runs
     * from the target's parent up to and including the project root.
     */
    fn update_ancestor_states(&mut self, path: &Path) {
        let ancestors: Vec<PathBuf> = path_utils::ancestors_up_to_root(path, &self.root)
            .map(Path::to_path_buf)
            .collect();
        for dir in ancestors {
            self.recompute_directory_state(&dir);
        }
    }

    /*
     * One level of the derived-state rule: a directory is Checked iff every
     * eligible child is Checked, partial iff some child is checked (or
     * itself partial) but not all are, and plain Unchecked otherwise. A
     * directory with no eligible children never becomes Checked or partial.
     */
    fn recompute_directory_state(&mut self, dir: &Path) {
        if dir != self.root && !self.is_eligible(dir, true) {
            self.cache.set(dir.to_path_buf(), CheckState::Unchecked);
            self.cache.clear_partial(dir);
            return;
        }

        let entries = match file_system::list_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("WorkspaceProvider: Could not recompute state of {dir:?}: {e}");
                return;
            }
        };

        let mut all_checked = true;
        let mut any_checked = false;
        let mut has_eligible_child = false;

        for entry in entries {
            if !self.is_eligible(&entry.path, entry.is_dir) {
                continue;
            }
            has_eligible_child = true;

            let state = self.cache.state_of(&entry.path);
            let child_is_partial = entry.is_dir && self.cache.is_partial(&entry.path);
            if !state.is_checked() {
                all_checked = false;
            }
            if state.is_checked() || child_is_partial {
                any_checked = true;
            }
        }

        if has_eligible_child && all_checked {
            self.cache.set(dir.to_path_buf(), CheckState::Checked);
            self.cache.clear_partial(dir);
        } else if any_checked {
            self.cache.set(dir.to_path_buf(), CheckState::Unchecked);
            self.cache.set_partial(dir.to_path_buf());
        } else {
            self.cache.set(dir.to_path_buf(), CheckState::Unchecked);
            self.cache.clear_partial(dir);
        }
    }

    /*
     * The consumer-facing checked set: only entries that are Checked, still
     * exist on disk as regular files or resolved symlinks, and are still
     * eligible under the current rules. Directories and stale paths never
     * appear. Sorted for a stable order; deduplication is inherent in the
     * cache being a map.
     */
    pub fn get_checked_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .cache
            .checked_paths()
            .filter(|path| file_system::exists_as_file_or_resolved_link(path))
            .filter(|path| self.is_eligible(path, false))
            .cloned()
            .collect();
        files.sort();
        files
    }

    /*
     * Bulk restore of a previously saved selection. Paths that no longer
     * exist or are excluded under current rules are silently dropped.
     * Directory entries restore their whole eligible subtree. No change
     * event fires here; the caller runs its own consistency pass afterwards.
     */
    pub fn set_checked_files(&mut self, paths: &[PathBuf]) {
        self.cache.clear();

        let mut restored = Vec::new();
        for path in paths {
            if !path_utils::is_within_root(path, &self.root) || !path.exists() {
                continue;
            }
            let is_dir = path.is_dir();
            if !self.is_eligible(path, is_dir) {
                continue;
            }

            self.cache.set(path.clone(), CheckState::Checked);
            if is_dir {
                self.propagate_to_descendants(path, CheckState::Checked);
                self.recompute_directory_state(path);
            }
            restored.push(path.clone());
        }

        for path in &restored {
            self.update_ancestor_states(path);
        }
        log::debug!(
            "WorkspaceProvider: Restored {} of {} selection entries.",
            restored.len(),
            paths.len()
        );
    }

    pub fn check_all(&mut self) {
        let root = self.root.clone();
        self.cache.set(root.clone(), CheckState::Checked);
        self.cache.clear_partial(&root);
        self.propagate_to_descendants(&root, CheckState::Checked);
        self.recompute_directory_state(&root);
        self.notify_checked_files_changed();
    }

    pub fn clear_checks(&mut self) {
        self.cache.clear();
        self.notify_checked_files_changed();
    }

    /*
     * Watcher entry point for a newly created path. If the parent directory
     * is currently checked, the new node inherits `Checked` immediately (a
     * checked directory is a standing selection for future children);
     * otherwise its appearance may still flip a fully-checked ancestor to
     * partial, so the ancestor pass runs either way.
     */
    pub fn handle_file_created(&mut self, path: &Path) {
        if !path_utils::is_within_root(path, &self.root) {
            return;
        }
        self.invalidate_token_caches_for(path);

        let is_dir = path.is_dir();
        if !self.is_eligible(path, is_dir) {
            return;
        }

        let before = self.cache.clone();
        let parent_checked = path
            .parent()
            .map(|parent| self.cache.is_checked(parent))
            .unwrap_or(false);
        if parent_checked {
            self.cache.set(path.to_path_buf(), CheckState::Checked);
            if is_dir {
                self.propagate_to_descendants(path, CheckState::Checked);
            }
        }
        self.update_ancestor_states(path);

        if self.cache != before {
            log::debug!("WorkspaceProvider: Created path {path:?} updated selection state.");
            self.notify_checked_files_changed();
        }
    }

    /*
     * Watcher entry point for a content change: drops the cached token count
     * of the file and of every directory above it. Selection state is
     * untouched; content changes cannot toggle checkboxes.
     */
    pub fn handle_file_changed(&mut self, path: &Path) {
        if !path_utils::is_within_root(path, &self.root) {
            return;
        }
        self.invalidate_token_caches_for(path);
    }

    /*
     * Watcher entry point for a deleted path: garbage-collects every cache
     * entry at or below it and recomputes the ancestors. The checked-files
     * read already filters stale paths, so this is cleanup, not correctness.
     */
    pub fn handle_file_removed(&mut self, path: &Path) {
        if !path_utils::is_within_root(path, &self.root) {
            return;
        }
        self.invalidate_token_caches_for(path);

        let before = self.cache.clone();
        let stale: Vec<PathBuf> = self
            .cache
            .paths()
            .filter(|p| p.as_path() == path || p.starts_with(path))
            .cloned()
            .collect();
        for p in &stale {
            self.cache.remove(p);
        }
        self.update_ancestor_states(path);

        if self.cache != before {
            log::debug!(
                "WorkspaceProvider: Removed path {path:?}, dropped {} cache entries.",
                stale.len()
            );
            self.notify_checked_files_changed();
        }
    }

    /*
     * Swaps in a freshly built exclusion checker after an ignore-rule or
     * extension-config change. Token caches are cleared wholesale (exclusion
     * affects aggregate directory counts), and checked entries the new rules
     * exclude are unchecked with their ancestors recomputed.
     */
    pub fn set_exclusion(&mut self, exclusion: Arc<dyn ExclusionCheckerOperations>) {
        self.exclusion = exclusion;
        self.file_tokens.clear();
        self.directory_token_counts.clear();

        let before = self.cache.clone();
        let newly_excluded: Vec<PathBuf> = self
            .cache
            .checked_paths()
            .filter(|path| {
                let is_dir = path.is_dir();
                !self.is_eligible(path, is_dir)
            })
            .cloned()
            .collect();

        for path in &newly_excluded {
            self.cache.set(path.clone(), CheckState::Unchecked);
            self.cache.clear_partial(path);
        }
        for path in &newly_excluded {
            self.update_ancestor_states(path);
        }

        if self.cache != before {
            log::debug!(
                "WorkspaceProvider: Rule reload unchecked {} entries.",
                newly_excluded.len()
            );
            self.notify_checked_files_changed();
        }
    }

    /*
     * Token count for a single file, served from cache while the stored
     * checksum still matches the content on disk. Unreadable or non-text
     * files report no count.
     */
    pub fn file_token_count(&mut self, path: &Path) -> Option<usize> {
        self.file_tokens.count_for(path, self.token_counter.as_ref())
    }

    /*
     * Recursive token sum over the eligible content of a directory, cached
     * per directory. Traversal errors make the affected subtree count as
     * zero rather than failing the aggregate.
     */
    pub fn directory_token_count(&mut self, dir: &Path) -> Option<usize> {
        if let Some(count) = self.directory_token_counts.get(dir) {
            return Some(*count);
        }

        let entries = match file_system::list_entries(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("WorkspaceProvider: Could not total tokens under {dir:?}: {e}");
                return None;
            }
        };

        let mut total = 0;
        for entry in entries {
            if !self.is_eligible(&entry.path, entry.is_dir) {
                continue;
            }
            if entry.is_dir {
                total += self.directory_token_count(&entry.path).unwrap_or(0);
            } else {
                total += self.file_token_count(&entry.path).unwrap_or(0);
            }
        }

        self.directory_token_counts.insert(dir.to_path_buf(), total);
        Some(total)
    }

    /*
     * Total token count over the current checked set, for display next to
     * the outgoing context size.
     */
    pub fn checked_files_token_count(&mut self) -> usize {
        self.get_checked_files()
            .iter()
            .filter_map(|path| self.file_token_count(path))
            .sum()
    }

    fn invalidate_token_caches_for(&mut self, path: &Path) {
        self.file_tokens.invalidate(path);
        let ancestors: Vec<PathBuf> = path_utils::ancestors_up_to_root(path, &self.root)
            .map(Path::to_path_buf)
            .collect();
        for dir in ancestors {
            self.directory_token_counts.remove(&dir);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::CoreExclusionChecker;
    use crate::tokenizer_utils::SimpleWhitespaceTokenCounter;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::{TempDir, tempdir};

    /* Builds the Scenario A tree: src/a.ts, src/b.ts, node_modules/x.js. */
    fn setup_scenario_tree() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("src/a.ts"), "const a = 1").unwrap();
        fs::write(dir.path().join("src/b.ts"), "const b = 2").unwrap();
        fs::write(dir.path().join("node_modules/x.js"), "module.exports = 1").unwrap();
        dir
    }

    fn provider_for(dir: &TempDir) -> WorkspaceSelectionProvider {
        WorkspaceSelectionProvider::new(
            dir.path(),
            Arc::new(CoreExclusionChecker::load(dir.path(), &[])),
            Arc::new(SimpleWhitespaceTokenCounter::new()),
        )
    }

    #[test]
    fn test_checking_directory_selects_eligible_descendants_only() {
        // Scenario A.
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");

        provider.set_checked(&src, CheckState::Checked);

        assert_eq!(
            provider.get_checked_files(),
            vec![dir.path().join("src/a.ts"), dir.path().join("src/b.ts")]
        );
        assert_eq!(provider.state_of(&src), CheckState::Checked);
        assert!(!provider.is_partial(&src));
        // The excluded file got no cache entry at all.
        assert_eq!(provider.cache.get(&dir.path().join("node_modules/x.js")), None);
    }

    #[test]
    fn test_unchecking_file_flips_directory_to_partial() {
        // Scenario B.
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");
        provider.set_checked(&src, CheckState::Checked);

        provider.set_checked(&dir.path().join("src/a.ts"), CheckState::Unchecked);

        assert_eq!(provider.state_of(&src), CheckState::Unchecked);
        assert!(provider.is_partial(&src));
        assert_eq!(provider.get_checked_files(), vec![dir.path().join("src/b.ts")]);
        // The root also reflects the incomplete selection.
        assert!(provider.is_partial(dir.path()));
    }

    #[test]
    fn test_set_checked_is_idempotent() {
        // P1: applying the same toggle twice ends in the same cache state.
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");

        provider.set_checked(&src, CheckState::Checked);
        let after_first = provider.cache.clone();
        provider.set_checked(&src, CheckState::Checked);

        assert_eq!(provider.cache, after_first);
    }

    #[test]
    fn test_partial_directory_click_completes_selection() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");
        provider.set_checked(&dir.path().join("src/a.ts"), CheckState::Checked);
        assert!(provider.is_partial(&src));

        // Incoming value is Unchecked, but a partial directory completes.
        provider.set_checked(&src, CheckState::Unchecked);

        assert_eq!(provider.state_of(&src), CheckState::Checked);
        assert!(!provider.is_partial(&src));
        assert_eq!(provider.get_checked_files().len(), 2);
    }

    #[test]
    fn test_directory_with_only_excluded_children_never_checks() {
        // P3.
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vendor")).unwrap();
        fs::write(dir.path().join("vendor/blob.png"), "binary-ish").unwrap();
        let mut provider = provider_for(&dir);
        let vendor = dir.path().join("vendor");

        provider.set_checked(&vendor, CheckState::Checked);

        // Nothing beneath qualifies, so the check resolves to "leave
        // unchecked" rather than marking the directory.
        assert_eq!(provider.state_of(&vendor), CheckState::Unchecked);
        assert!(!provider.is_partial(&vendor));
        assert!(provider.get_checked_files().is_empty());
        assert!(!provider.is_partial(dir.path()));
        assert_eq!(provider.state_of(dir.path()), CheckState::Unchecked);
    }

    #[test]
    fn test_checked_files_roundtrip_is_fixed_point() {
        // P4.
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        provider.set_checked(&dir.path().join("src"), CheckState::Checked);
        provider.set_checked(&dir.path().join("src/a.ts"), CheckState::Unchecked);

        let first = provider.get_checked_files();
        provider.set_checked_files(&first);
        let second = provider.get_checked_files();

        assert_eq!(first, second);
        // Partial annotations are re-derived, not persisted.
        assert!(provider.is_partial(&dir.path().join("src")));
    }

    #[test]
    fn test_checked_files_never_report_missing_paths() {
        // P5 / Scenario D.
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);

        provider.set_checked_files(&[dir.path().join("deleted.ts")]);
        assert!(provider.get_checked_files().is_empty());

        // A file that vanishes after being checked disappears from the read.
        let a = dir.path().join("src/a.ts");
        provider.set_checked(&a, CheckState::Checked);
        assert_eq!(provider.get_checked_files(), vec![a.clone()]);
        fs::remove_file(&a).unwrap();
        assert!(provider.get_checked_files().is_empty());
    }

    #[test]
    fn test_restore_drops_excluded_paths() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);

        provider.set_checked_files(&[
            dir.path().join("src/a.ts"),
            dir.path().join("node_modules/x.js"),
        ]);

        assert_eq!(provider.get_checked_files(), vec![dir.path().join("src/a.ts")]);
    }

    #[test]
    fn test_restore_of_directory_selects_subtree() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);

        provider.set_checked_files(&[dir.path().join("src")]);

        assert_eq!(provider.get_checked_files().len(), 2);
        assert_eq!(provider.state_of(&dir.path().join("src")), CheckState::Checked);
    }

    #[test]
    fn test_ancestor_consistency_across_levels() {
        // P2 over a deeper tree.
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        fs::write(dir.path().join("src/top.rs"), "fn t() {}").unwrap();
        fs::write(dir.path().join("src/sub/deep.rs"), "fn d() {}").unwrap();
        let mut provider = provider_for(&dir);

        provider.set_checked(&dir.path().join("src/sub/deep.rs"), CheckState::Checked);

        // sub is fully checked, src only partially.
        assert_eq!(
            provider.state_of(&dir.path().join("src/sub")),
            CheckState::Checked
        );
        assert!(!provider.is_partial(&dir.path().join("src/sub")));
        assert_eq!(provider.state_of(&dir.path().join("src")), CheckState::Unchecked);
        assert!(provider.is_partial(&dir.path().join("src")));

        provider.set_checked(&dir.path().join("src/top.rs"), CheckState::Checked);
        assert_eq!(provider.state_of(&dir.path().join("src")), CheckState::Checked);
        assert!(!provider.is_partial(&dir.path().join("src")));
        assert_eq!(provider.state_of(dir.path()), CheckState::Checked);
    }

    #[test]
    fn test_new_file_inherits_from_checked_parent() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");
        provider.set_checked(&src, CheckState::Checked);

        let new_file = src.join("c.ts");
        fs::write(&new_file, "const c = 3").unwrap();
        provider.handle_file_created(&new_file);

        let checked = provider.get_checked_files();
        assert!(checked.contains(&new_file));
        assert_eq!(provider.state_of(&src), CheckState::Checked);
    }

    #[test]
    fn test_new_file_under_unchecked_parent_stays_unchecked() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        provider.set_checked(&dir.path().join("src/a.ts"), CheckState::Checked);

        let new_file = dir.path().join("src/c.ts");
        fs::write(&new_file, "const c = 3").unwrap();
        provider.handle_file_created(&new_file);

        assert!(!provider.get_checked_files().contains(&new_file));
        assert!(provider.is_partial(&dir.path().join("src")));
    }

    #[test]
    fn test_created_then_removed_file_keeps_directory_state_consistent() {
        // A fully checked directory stays checked because the new child
        // inherits; removing the file afterwards restores the full state.
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");
        provider.set_checked(&src, CheckState::Checked);

        let new_file = src.join("c.ts");
        fs::write(&new_file, "const c = 3").unwrap();
        provider.handle_file_created(&new_file);
        assert_eq!(provider.state_of(&src), CheckState::Checked);

        fs::remove_file(&new_file).unwrap();
        provider.handle_file_removed(&new_file);
        assert_eq!(provider.state_of(&src), CheckState::Checked);
        assert_eq!(provider.get_checked_files().len(), 2);
    }

    #[test]
    fn test_removed_subtree_is_garbage_collected() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");
        provider.set_checked(&src, CheckState::Checked);
        assert!(provider.cache.len() > 0);

        fs::remove_file(dir.path().join("src/a.ts")).unwrap();
        fs::remove_file(dir.path().join("src/b.ts")).unwrap();
        fs::remove_dir(&src).unwrap();
        provider.handle_file_removed(&src);

        assert_eq!(provider.cache.get(&src), None);
        assert_eq!(provider.cache.get(&dir.path().join("src/a.ts")), None);
        assert!(provider.get_checked_files().is_empty());
    }

    #[test]
    fn test_rule_reload_unchecks_newly_excluded_files() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        provider.set_checked(&dir.path().join("src"), CheckState::Checked);
        assert_eq!(provider.get_checked_files().len(), 2);

        // A new ignore rule appears for b.ts; rebuild and swap the checker.
        fs::write(dir.path().join(".gitignore"), "src/b.ts\n").unwrap();
        provider.set_exclusion(Arc::new(CoreExclusionChecker::load(dir.path(), &[])));

        assert_eq!(provider.get_checked_files(), vec![dir.path().join("src/a.ts")]);
        assert_eq!(
            provider.cache.state_of(&dir.path().join("src/b.ts")),
            CheckState::Unchecked
        );
        // With b.ts out of the eligible set, a.ts alone fully covers src.
        assert_eq!(provider.state_of(&dir.path().join("src")), CheckState::Checked);
        assert!(!provider.is_partial(&dir.path().join("src")));
    }

    #[test]
    fn test_check_all_and_clear_checks() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);

        provider.check_all();
        assert_eq!(provider.get_checked_files().len(), 2);
        assert_eq!(provider.state_of(dir.path()), CheckState::Checked);

        provider.clear_checks();
        assert!(provider.get_checked_files().is_empty());
        assert!(provider.cache.is_empty());
    }

    #[test]
    fn test_get_children_lists_eligible_entries_with_token_counts() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);

        let top = provider.get_children(None);
        let names: Vec<&str> = top.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["src"]);
        // "const a = 1" and "const b = 2" are four whitespace tokens each.
        assert_eq!(top[0].token_count, Some(8));

        let children = provider.get_children(Some(&dir.path().join("src")));
        let names: Vec<&str> = children.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a.ts", "b.ts"]);
        assert_eq!(children[0].token_count, Some(4));
    }

    #[test]
    fn test_get_children_inherits_check_from_checked_parent() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");
        provider.set_checked(&src, CheckState::Checked);

        // A file that appears without a watcher event is picked up on the
        // next expansion of its checked parent.
        fs::write(src.join("late.ts"), "const l = 9").unwrap();
        let children = provider.get_children(Some(&src));
        let late = children.iter().find(|d| d.name == "late.ts").unwrap();
        assert_eq!(late.state, CheckState::Checked);
        assert!(provider.get_checked_files().contains(&src.join("late.ts")));
    }

    #[test]
    fn test_file_token_count_uses_checksum_guarded_cache() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("notes.txt");
        let mut file = File::create(&file_path).unwrap();
        write!(file, "one two three").unwrap();
        drop(file);
        let mut provider = provider_for(&dir);

        assert_eq!(provider.file_token_count(&file_path), Some(3));

        // Content changes without any watcher notification: the checksum
        // mismatch alone forces a recount.
        fs::write(&file_path, "one two three four five").unwrap();
        assert_eq!(provider.file_token_count(&file_path), Some(5));
    }

    #[test]
    fn test_directory_token_count_invalidated_on_change_event() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");
        assert_eq!(provider.directory_token_count(&src), Some(8));

        fs::write(dir.path().join("src/a.ts"), "const a = 1 + 2").unwrap();
        provider.handle_file_changed(&dir.path().join("src/a.ts"));

        assert_eq!(provider.directory_token_count(&src), Some(10));
    }

    #[test]
    fn test_is_checked_with_ancestors() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        let src = dir.path().join("src");
        provider.set_checked(&src, CheckState::Checked);

        // A path that never got its own entry still counts via its parent.
        assert!(provider.is_checked_with_ancestors(&src.join("never_expanded.ts")));
        assert!(!provider.is_checked_with_ancestors(&dir.path().join("other/file.ts")));
    }

    #[test]
    fn test_checked_files_token_count_totals_selection() {
        let dir = setup_scenario_tree();
        let mut provider = provider_for(&dir);
        provider.set_checked(&dir.path().join("src"), CheckState::Checked);

        assert_eq!(provider.checked_files_token_count(), 8);
    }
}
