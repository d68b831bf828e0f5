/*
 * The open-files side of the selection engine. Owns a `NodeCache` scoped to
 * the files currently open in the host editor; there is no directory
 * recursion here, only a per-file state machine driven by tab lifecycle
 * events.
 *
 * The auto-selection policy on open: a file already covered by the workspace
 * selection inherits `Checked`; a preview tab or a file opened by clicking it
 * in the workspace tree defaults to `Unchecked`; anything else — a file the
 * user deliberately opened for editing — defaults to `Checked` while the
 * attach-open-files policy is on. Pinning a preview tab promotes it to
 * `Checked` under the same policy. Closing a tab erases every trace of the
 * file from this provider.
 */
use crate::coordinator::ChangeNotifier;
use crate::exclusion::ExclusionCheckerOperations;
use crate::file_system;
use crate::models::{CheckState, NodeDescriptor, TabEventBatch};
use crate::node_cache::NodeCache;
use crate::tokenizer_utils::{FileTokenCache, TokenCounterOperations};
use crate::workspace_provider::WorkspaceSelectionProvider;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct OpenFilesSelectionProvider {
    root: PathBuf,
    cache: NodeCache,
    exclusion: Arc<dyn ExclusionCheckerOperations>,
    token_counter: Arc<dyn TokenCounterOperations>,
    file_tokens: FileTokenCache,
    /* Last known preview flag per open tab. Doubles as the set of files this
     * provider considers open. */
    preview_tabs: HashMap<PathBuf, bool>,
    /* Files whose open event came from a workspace-tree click. Consumed by
     * the first transition that reads it and dropped on tab close. */
    opened_from_tree: HashSet<PathBuf>,
    /* Default applied to future normal opens; never rewrites existing
     * entries. */
    attach_open_files: bool,
    notifier: Option<ChangeNotifier>,
}

impl OpenFilesSelectionProvider {
    pub fn new(
        root: impl Into<PathBuf>,
        exclusion: Arc<dyn ExclusionCheckerOperations>,
        token_counter: Arc<dyn TokenCounterOperations>,
    ) -> Self {
        OpenFilesSelectionProvider {
            root: root.into(),
            cache: NodeCache::new(),
            exclusion,
            token_counter,
            file_tokens: FileTokenCache::new(),
            preview_tabs: HashMap::new(),
            opened_from_tree: HashSet::new(),
            attach_open_files: true,
            notifier: None,
        }
    }

    pub fn set_change_notifier(&mut self, notifier: ChangeNotifier) {
        self.notifier = Some(notifier);
    }

    fn notify_checked_files_changed(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.notify();
        }
    }

    pub fn attach_open_files(&self) -> bool {
        self.attach_open_files
    }

    /*
     * Flips the policy for future `Opened` transitions. Existing entries
     * keep whatever value they already have.
     */
    pub fn set_attach_open_files(&mut self, attach: bool) {
        self.attach_open_files = attach;
    }

    /*
     * Whether a file can ever hold an entry here: inside the project root,
     * not matched by ignore rules, and not carrying an ignored extension.
     */
    fn is_trackable(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        !self.exclusion.is_excluded(relative, false)
            && !self.exclusion.has_ignored_extension(path)
    }

    /*
     * The workspace view calls this right before asking the host to open a
     * file from the tree, so the resulting open event does not double-count
     * a file the tree already represents.
     */
    pub fn mark_opened_from_tree(&mut self, path: &Path) {
        self.opened_from_tree.insert(path.to_path_buf());
    }

    pub fn is_checked(&self, path: &Path) -> bool {
        self.cache.is_checked(path)
    }

    pub fn state_of(&self, path: &Path) -> CheckState {
        self.cache.state_of(path)
    }

    /*
     * The trackable files currently open, sorted for stable iteration. This
     * is the set the coordinator walks when reconciling.
     */
    pub fn tracked_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .preview_tabs
            .keys()
            .filter(|path| self.is_trackable(path))
            .cloned()
            .collect();
        files.sort();
        files
    }

    /*
     * Applies one batch of tab lifecycle events from the host editor,
     * consulting the workspace provider for the inherit-on-open rule. Fires
     * the change event once at the end if any checkbox value moved.
     */
    pub fn handle_tab_events(
        &mut self,
        batch: &TabEventBatch,
        workspace: &WorkspaceSelectionProvider,
    ) {
        let before = self.cache.clone();

        for path in &batch.closed {
            self.cache.remove(path);
            self.preview_tabs.remove(path);
            self.opened_from_tree.remove(path);
            self.file_tokens.invalidate(path);
        }

        for tab in &batch.opened {
            self.preview_tabs.insert(tab.path.clone(), tab.is_preview);
            if !self.is_trackable(&tab.path) {
                continue;
            }
            if self.cache.get(&tab.path).is_some() {
                // A re-open of a file we already track keeps its value.
                continue;
            }
            let state = self.initial_state_for(&tab.path, tab.is_preview, workspace);
            log::debug!(
                "OpenFilesProvider: Tab opened {:?} (preview: {}) -> {state:?}",
                tab.path,
                tab.is_preview
            );
            self.cache.set(tab.path.clone(), state);
        }

        for tab in &batch.changed {
            let was_preview = self.preview_tabs.get(&tab.path).copied();
            self.preview_tabs.insert(tab.path.clone(), tab.is_preview);
            if was_preview == Some(true) && !tab.is_preview {
                self.handle_preview_promoted(&tab.path);
            }
        }

        if self.cache != before {
            self.notify_checked_files_changed();
        }
    }

    /*
     * The `Opened` transition. Order matters: workspace coverage wins over
     * everything, preview keeps the opened-from-tree marker alive for the
     * later promotion decision, and only a plain normal open consults the
     * attach policy.
     */
    fn initial_state_for(
        &mut self,
        path: &Path,
        is_preview: bool,
        workspace: &WorkspaceSelectionProvider,
    ) -> CheckState {
        if workspace.is_checked_with_ancestors(path) {
            return CheckState::Checked;
        }
        if is_preview {
            return CheckState::Unchecked;
        }
        if self.opened_from_tree.remove(path) {
            return CheckState::Unchecked;
        }
        CheckState::from_bool(self.attach_open_files)
    }

    /*
     * The `PreviewPromoted` transition: the tab left preview mode, which
     * signals the user wants to keep working in the file. The
     * opened-from-tree marker is consumed here whether or not it blocks the
     * promotion.
     */
    fn handle_preview_promoted(&mut self, path: &Path) {
        if !self.is_trackable(path) {
            return;
        }
        let was_from_tree = self.opened_from_tree.remove(path);
        if !self.attach_open_files || was_from_tree || self.cache.is_checked(path) {
            return;
        }
        log::debug!("OpenFilesProvider: Preview tab pinned, checking {path:?}");
        self.cache.set(path.to_path_buf(), CheckState::Checked);
        self.file_tokens.invalidate(path);
    }

    /*
     * Applies a user toggle (or a coordinator corrective write) to one open
     * file.
     */
    pub fn set_checked(&mut self, path: &Path, state: CheckState) {
        self.cache.set(path.to_path_buf(), state);
        self.notify_checked_files_changed();
    }

    /*
     * The consumer-facing checked set: checked entries that still exist on
     * disk as regular files or resolved symlinks. Sorted, inherently
     * deduplicated.
     */
    pub fn get_checked_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .cache
            .checked_paths()
            .filter(|path| file_system::exists_as_file_or_resolved_link(path))
            .cloned()
            .collect();
        files.sort();
        files
    }

    /*
     * Bulk restore. Entries for files that no longer exist or are not
     * trackable are silently dropped.
     */
    pub fn set_checked_files(&mut self, paths: &[PathBuf]) {
        self.cache.clear();
        for path in paths {
            if !path.exists() || !self.is_trackable(path) {
                continue;
            }
            self.cache.set(path.clone(), CheckState::Checked);
        }
        self.notify_checked_files_changed();
    }

    pub fn check_all(&mut self) {
        for path in self.tracked_files() {
            self.cache.set(path, CheckState::Checked);
        }
        self.notify_checked_files_changed();
    }

    /*
     * Unchecks every open file. Entries stay in the cache (the tabs are
     * still open); only closing a tab removes its entry.
     */
    pub fn clear_checks(&mut self) {
        for path in self.tracked_files() {
            self.cache.set(path, CheckState::Unchecked);
        }
        self.notify_checked_files_changed();
    }

    /*
     * Swaps in a freshly built exclusion checker. Entries that are no longer
     * trackable are dropped; token counts are recomputed lazily.
     */
    pub fn set_exclusion(&mut self, exclusion: Arc<dyn ExclusionCheckerOperations>) {
        self.exclusion = exclusion;
        self.file_tokens.clear();

        let before = self.cache.clone();
        let untrackable: Vec<PathBuf> = self
            .cache
            .paths()
            .filter(|path| !self.is_trackable(path))
            .cloned()
            .collect();
        for path in &untrackable {
            self.cache.remove(path);
        }

        if self.cache != before {
            log::debug!(
                "OpenFilesProvider: Rule reload dropped {} entries.",
                untrackable.len()
            );
            self.notify_checked_files_changed();
        }
    }

    /*
     * Watcher entry point for a content change: only the token count is
     * affected.
     */
    pub fn handle_file_changed(&mut self, path: &Path) {
        self.file_tokens.invalidate(path);
    }

    /*
     * Descriptors for the open files, for the rendering layer. Flat list;
     * nothing here is a directory.
     */
    pub fn get_children(&mut self) -> Vec<NodeDescriptor> {
        let mut descriptors = Vec::new();
        for path in self.tracked_files() {
            let token_count = self.file_tokens.count_for(&path, self.token_counter.as_ref());
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            descriptors.push(NodeDescriptor {
                state: self.cache.state_of(&path),
                name,
                path,
                is_dir: false,
                is_symlink: false,
                is_open_file: true,
                is_partial: false,
                token_count,
            });
        }
        descriptors
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
