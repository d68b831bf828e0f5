/*
 * The mediator that keeps the two selection views consistent. It owns both
 * providers, hands each an origin-tagged notifier at registration, and runs
 * one reconciliation pass per received change event. All corrective writes
 * go through the providers' own public mutators, so every provider invariant
 * holds on every write path; the coordinator never touches a node cache
 * directly.
 *
 * Loop prevention: a pass runs behind a `synchronizing` flag, and events the
 * pass itself produces (its corrective writes echo into the same channel)
 * are drained and dropped when the pass ends. Dropping instead of queueing
 * is safe because a pass re-derives consistency from current state, so a
 * dropped duplicate can only defer convergence, never lose it.
 *
 * The reconciliation is deliberately asymmetric. Workspace-originated
 * changes overwrite the open-files view outright: the tree is the source of
 * truth for directory-level intent. Open-files-originated changes are pushed
 * conditionally: newly checked files get checked in the tree, and files
 * unchecked here get unchecked there only while the tree still carries a
 * direct check for them.
 */
use crate::exclusion::ExclusionCheckerOperations;
use crate::models::{ChangeOrigin, CheckState, TabEventBatch};
use crate::open_files_provider::OpenFilesSelectionProvider;
use crate::workspace_provider::WorkspaceSelectionProvider;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

/*
 * Handed to a provider at registration; every checked-files change the
 * provider announces arrives at the coordinator tagged with the provider's
 * origin. Cloneable so a provider can share it with helper structs if it
 * ever needs to.
 */
#[derive(Clone)]
pub struct ChangeNotifier {
    sender: Sender<ChangeOrigin>,
    origin: ChangeOrigin,
}

impl ChangeNotifier {
    pub fn new(sender: Sender<ChangeOrigin>, origin: ChangeOrigin) -> Self {
        ChangeNotifier { sender, origin }
    }

    pub fn notify(&self) {
        // A dropped receiver just means no coordinator is listening anymore.
        if let Err(e) = self.sender.send(self.origin) {
            log::trace!("ChangeNotifier: No listener for {:?} change: {e}", self.origin);
        }
    }
}

pub struct SelectionCoordinator {
    workspace: WorkspaceSelectionProvider,
    open_files: OpenFilesSelectionProvider,
    events: Receiver<ChangeOrigin>,
    synchronizing: bool,
    listeners: Vec<Box<dyn Fn()>>,
}

impl SelectionCoordinator {
    /*
     * Wires both providers to this coordinator and runs the bootstrap pass
     * (both reconciliation directions) so the session starts from a fixed
     * point. Exactly one coordinator exists per provider pair; constructing
     * it consumes the providers.
     */
    pub fn register(
        mut workspace: WorkspaceSelectionProvider,
        mut open_files: OpenFilesSelectionProvider,
    ) -> Self {
        let (sender, receiver) = channel();
        workspace.set_change_notifier(ChangeNotifier::new(sender.clone(), ChangeOrigin::Workspace));
        open_files.set_change_notifier(ChangeNotifier::new(sender, ChangeOrigin::OpenFiles));

        let mut coordinator = SelectionCoordinator {
            workspace,
            open_files,
            events: receiver,
            synchronizing: false,
            listeners: Vec::new(),
        };
        coordinator.synchronize(None);
        coordinator
    }

    pub fn workspace(&self) -> &WorkspaceSelectionProvider {
        &self.workspace
    }

    pub fn open_files(&self) -> &OpenFilesSelectionProvider {
        &self.open_files
    }

    /*
     * Registers a listener invoked after every reconciliation pass, once the
     * providers agree.
     */
    pub fn on_checked_files_changed(&mut self, listener: impl Fn() + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /*
     * Drains pending change events, reconciling once per user-originated
     * event. The host calls this after each of its event callbacks; the
     * mutating wrappers below do it automatically.
     */
    pub fn pump(&mut self) {
        while let Ok(origin) = self.events.try_recv() {
            self.synchronize(Some(origin));
        }
    }

    /*
     * One reconciliation pass. Re-entrant invocations are ignored outright;
     * the in-flight pass re-derives a consistent state on its own.
     */
    pub fn synchronize(&mut self, origin: Option<ChangeOrigin>) {
        if self.synchronizing {
            log::trace!("Coordinator: Ignoring re-entrant synchronize({origin:?}).");
            return;
        }
        self.synchronizing = true;
        log::debug!("Coordinator: Synchronizing (origin: {origin:?}).");

        match origin {
            Some(ChangeOrigin::Workspace) => self.push_workspace_truth_to_open_files(),
            Some(ChangeOrigin::OpenFiles) => {
                self.push_open_files_checks_to_workspace();
                self.push_open_files_unchecks_to_workspace();
            }
            None => {
                // Bootstrap order matters for the fixed point: checks from
                // the open-files view flow into the tree first, then the
                // tree's truth overwrites every open file. The uncheck
                // direction is skipped here — before the first pass an
                // unchecked open entry is a default, not a user decision.
                self.push_open_files_checks_to_workspace();
                self.push_workspace_truth_to_open_files();
            }
        }

        self.synchronizing = false;

        // The corrective writes above echoed into the event channel; they are
        // not user changes, so drop them instead of reconciling again.
        while self.events.try_recv().is_ok() {}

        for listener in &self.listeners {
            listener();
        }
    }

    /*
     * Workspace origin: for every open file, the workspace answer (including
     * coverage by a checked ancestor directory) overwrites a disagreeing
     * open-files entry.
     */
    fn push_workspace_truth_to_open_files(&mut self) {
        let Self {
            workspace,
            open_files,
            ..
        } = self;
        for file in open_files.tracked_files() {
            let checked_in_workspace = workspace.is_checked_with_ancestors(&file);
            if checked_in_workspace != open_files.is_checked(&file) {
                open_files.set_checked(&file, CheckState::from_bool(checked_in_workspace));
            }
        }
    }

    /*
     * Open-files origin, first half: entries newly checked here get checked
     * into the workspace. Corrective writes for paths that have meanwhile
     * vanished are no-ops inside the provider.
     */
    fn push_open_files_checks_to_workspace(&mut self) {
        let Self {
            workspace,
            open_files,
            ..
        } = self;
        for file in open_files.get_checked_files() {
            if !workspace.state_of(&file).is_checked() {
                workspace.set_checked(&file, CheckState::Checked);
            }
        }
    }

    /*
     * Open-files origin, second half: open files unchecked here are
     * unchecked in the workspace too, but only while the workspace still
     * carries a direct check for them.
     */
    fn push_open_files_unchecks_to_workspace(&mut self) {
        let Self {
            workspace,
            open_files,
            ..
        } = self;
        for file in open_files.tracked_files() {
            if !open_files.is_checked(&file) && workspace.state_of(&file).is_checked() {
                workspace.set_checked(&file, CheckState::Unchecked);
            }
        }
    }

    /*
     * The consumer-facing merged selection: the deduplicated union of both
     * providers' checked sets, sorted. Pull-based; computed fresh so the
     * stale-path filtering of both providers applies at call time.
     */
    pub fn get_checked_files(&self) -> Vec<PathBuf> {
        let mut merged: BTreeSet<PathBuf> = self.workspace.get_checked_files().into_iter().collect();
        merged.extend(self.open_files.get_checked_files());
        merged.into_iter().collect()
    }

    // --- Host-facing wrappers: one mutation, then reconcile. ---

    pub fn set_workspace_checked(&mut self, path: &Path, state: CheckState) {
        self.workspace.set_checked(path, state);
        self.pump();
    }

    pub fn set_open_file_checked(&mut self, path: &Path, state: CheckState) {
        self.open_files.set_checked(path, state);
        self.pump();
    }

    pub fn handle_tab_events(&mut self, batch: &TabEventBatch) {
        let Self {
            workspace,
            open_files,
            ..
        } = self;
        open_files.handle_tab_events(batch, workspace);
        self.pump();
    }

    pub fn mark_opened_from_tree(&mut self, path: &Path) {
        self.open_files.mark_opened_from_tree(path);
    }

    pub fn handle_file_created(&mut self, path: &Path) {
        self.workspace.handle_file_created(path);
        self.pump();
    }

    pub fn handle_file_changed(&mut self, path: &Path) {
        self.workspace.handle_file_changed(path);
        self.open_files.handle_file_changed(path);
    }

    pub fn handle_file_removed(&mut self, path: &Path) {
        self.workspace.handle_file_removed(path);
        self.pump();
    }

    /*
     * Bulk restore of a saved selection into both providers, then a full
     * bootstrap-style pass. Restore-time provider events are drained first;
     * the explicit pass supersedes them.
     */
    pub fn restore_checked_files(&mut self, paths: &[PathBuf]) {
        self.workspace.set_checked_files(paths);
        self.open_files.set_checked_files(paths);
        while self.events.try_recv().is_ok() {}
        self.synchronize(None);
    }

    pub fn check_all(&mut self) {
        self.workspace.check_all();
        self.open_files.check_all();
        while self.events.try_recv().is_ok() {}
        self.synchronize(None);
    }

    pub fn clear_checks(&mut self) {
        self.workspace.clear_checks();
        self.open_files.clear_checks();
        while self.events.try_recv().is_ok() {}
        self.synchronize(None);
    }

    /*
     * Swaps a freshly built exclusion checker into both providers (ignore
     * rules or extension config changed) and reconciles whatever that
     * unchecked.
     */
    pub fn reload_exclusion_rules(&mut self, exclusion: Arc<dyn ExclusionCheckerOperations>) {
        self.workspace.set_exclusion(exclusion.clone());
        self.open_files.set_exclusion(exclusion);
        self.pump();
    }

    /*
     * Read-model accessors for the rendering layer. Mutable because listing
     * materializes lazily inherited states and token counts.
     */
    pub fn workspace_children(
        &mut self,
        parent: Option<&Path>,
    ) -> Vec<crate::models::NodeDescriptor> {
        self.workspace.get_children(parent)
    }

    pub fn open_file_children(&mut self) -> Vec<crate::models::NodeDescriptor> {
        self.open_files.get_children()
    }

    pub fn checked_files_token_count(&mut self) -> usize {
        self.workspace.checked_files_token_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclusion::CoreExclusionChecker;
    use crate::models::TabState;
    use crate::tokenizer_utils::{SimpleWhitespaceTokenCounter, TokenCounterOperations};
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::{TempDir, tempdir};

    fn setup_tree() -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/a.ts"), "const a = 1").unwrap();
        fs::write(dir.path().join("src/b.ts"), "const b = 2").unwrap();
        fs::write(dir.path().join("src/c.ts"), "const c = 3").unwrap();
        dir
    }

    fn coordinator_for(dir: &TempDir) -> SelectionCoordinator {
        let exclusion: Arc<dyn ExclusionCheckerOperations> =
            Arc::new(CoreExclusionChecker::load(dir.path(), &[]));
        let counter: Arc<dyn TokenCounterOperations> = Arc::new(SimpleWhitespaceTokenCounter::new());
        SelectionCoordinator::register(
            WorkspaceSelectionProvider::new(dir.path(), exclusion.clone(), counter.clone()),
            OpenFilesSelectionProvider::new(dir.path(), exclusion, counter),
        )
    }

    fn open_tab(coordinator: &mut SelectionCoordinator, path: &Path, is_preview: bool) {
        coordinator.handle_tab_events(&TabEventBatch {
            opened: vec![TabState::new(path, is_preview)],
            ..Default::default()
        });
    }

    fn pin_tab(coordinator: &mut SelectionCoordinator, path: &Path) {
        coordinator.handle_tab_events(&TabEventBatch {
            changed: vec![TabState::new(path, false)],
            ..Default::default()
        });
    }

    #[test]
    fn test_workspace_check_propagates_to_open_file() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let a = dir.path().join("src/a.ts");
        open_tab(&mut coordinator, &a, true);
        assert!(!coordinator.open_files().is_checked(&a));

        coordinator.set_workspace_checked(&dir.path().join("src"), CheckState::Checked);

        // P6: one user toggle, one reconciliation, both views agree.
        assert!(coordinator.open_files().is_checked(&a));
        assert_eq!(
            coordinator.get_checked_files(),
            vec![
                dir.path().join("src/a.ts"),
                dir.path().join("src/b.ts"),
                dir.path().join("src/c.ts"),
            ]
        );
    }

    #[test]
    fn test_workspace_uncheck_overrides_open_file() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let a = dir.path().join("src/a.ts");
        open_tab(&mut coordinator, &a, false);
        assert!(coordinator.open_files().is_checked(&a));
        coordinator.set_workspace_checked(&dir.path().join("src"), CheckState::Checked);

        coordinator.set_workspace_checked(&dir.path().join("src"), CheckState::Unchecked);

        // The tree's word is final for files it covers.
        assert!(!coordinator.open_files().is_checked(&a));
        assert!(coordinator.get_checked_files().is_empty());
    }

    #[test]
    fn test_preview_promotion_flows_into_workspace() {
        // Scenario C end to end.
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let c = dir.path().join("src/c.ts");
        let src = dir.path().join("src");

        open_tab(&mut coordinator, &c, true);
        assert!(!coordinator.open_files().is_checked(&c));
        assert_eq!(coordinator.workspace().state_of(&src), CheckState::Unchecked);

        pin_tab(&mut coordinator, &c);

        assert!(coordinator.open_files().is_checked(&c));
        assert!(coordinator.workspace().state_of(&c).is_checked());
        assert_eq!(coordinator.workspace().state_of(&src), CheckState::Unchecked);
        assert!(coordinator.workspace().is_partial(&src));
        assert_eq!(coordinator.get_checked_files(), vec![c]);
    }

    #[test]
    fn test_open_file_uncheck_flows_into_workspace() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let a = dir.path().join("src/a.ts");
        open_tab(&mut coordinator, &a, false);
        // The normal open auto-checked it and the coordinator pushed it into
        // the workspace already.
        assert!(coordinator.workspace().state_of(&a).is_checked());

        coordinator.set_open_file_checked(&a, CheckState::Unchecked);

        assert!(!coordinator.workspace().state_of(&a).is_checked());
        assert!(coordinator.get_checked_files().is_empty());
    }

    #[test]
    fn test_bootstrap_reaches_fixed_point() {
        let dir = setup_tree();
        let exclusion: Arc<dyn ExclusionCheckerOperations> =
            Arc::new(CoreExclusionChecker::load(dir.path(), &[]));
        let counter: Arc<dyn TokenCounterOperations> = Arc::new(SimpleWhitespaceTokenCounter::new());
        let mut workspace =
            WorkspaceSelectionProvider::new(dir.path(), exclusion.clone(), counter.clone());
        let mut open_files = OpenFilesSelectionProvider::new(dir.path(), exclusion, counter);

        // Providers diverge before registration: no notifiers are wired yet.
        workspace.set_checked(&dir.path().join("src/a.ts"), CheckState::Checked);
        open_files.handle_tab_events(
            &TabEventBatch {
                opened: vec![
                    TabState::new(dir.path().join("src/a.ts"), true),
                    TabState::new(dir.path().join("src/b.ts"), false),
                ],
                ..Default::default()
            },
            &WorkspaceSelectionProvider::new(
                dir.path(),
                Arc::new(CoreExclusionChecker::load(dir.path(), &[])),
                Arc::new(SimpleWhitespaceTokenCounter::new()),
            ),
        );

        let coordinator = SelectionCoordinator::register(workspace, open_files);

        // a.ts was checked in the workspace only, b.ts in open files only;
        // after the bootstrap both views agree on both files.
        assert!(coordinator.open_files().is_checked(&dir.path().join("src/a.ts")));
        assert!(coordinator.workspace().state_of(&dir.path().join("src/b.ts")).is_checked());
        assert_eq!(
            coordinator.get_checked_files(),
            vec![dir.path().join("src/a.ts"), dir.path().join("src/b.ts")]
        );
    }

    #[test]
    fn test_corrective_writes_do_not_retrigger_reconciliation() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let a = dir.path().join("src/a.ts");
        open_tab(&mut coordinator, &a, true);

        let passes = Rc::new(Cell::new(0));
        let passes_in_listener = passes.clone();
        coordinator.on_checked_files_changed(move || {
            passes_in_listener.set(passes_in_listener.get() + 1);
        });

        coordinator.set_workspace_checked(&dir.path().join("src"), CheckState::Checked);

        // One user toggle produced exactly one pass; the corrective write
        // into the open-files provider did not spawn another.
        assert_eq!(passes.get(), 1);
        coordinator.pump();
        assert_eq!(passes.get(), 1);
    }

    #[test]
    fn test_union_is_deduplicated_and_sorted() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let a = dir.path().join("src/a.ts");
        open_tab(&mut coordinator, &a, false);
        coordinator.set_workspace_checked(&dir.path().join("src/b.ts"), CheckState::Checked);

        // a.ts is checked in both providers; the union reports it once.
        let merged = coordinator.get_checked_files();
        assert_eq!(merged, vec![a, dir.path().join("src/b.ts")]);
    }

    #[test]
    fn test_restore_drops_missing_paths() {
        // Scenario D through the coordinator surface.
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);

        coordinator.restore_checked_files(&[dir.path().join("deleted.ts")]);

        assert!(coordinator.get_checked_files().is_empty());
    }

    #[test]
    fn test_restore_then_read_is_fixed_point() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        coordinator.set_workspace_checked(&dir.path().join("src/a.ts"), CheckState::Checked);
        coordinator.set_workspace_checked(&dir.path().join("src/b.ts"), CheckState::Checked);

        let saved = coordinator.get_checked_files();
        coordinator.restore_checked_files(&saved);

        assert_eq!(coordinator.get_checked_files(), saved);
    }

    #[test]
    fn test_check_all_and_clear_checks_cover_both_views() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let a = dir.path().join("src/a.ts");
        open_tab(&mut coordinator, &a, true);

        coordinator.check_all();
        assert_eq!(coordinator.get_checked_files().len(), 3);
        assert!(coordinator.open_files().is_checked(&a));

        coordinator.clear_checks();
        assert!(coordinator.get_checked_files().is_empty());
        assert!(!coordinator.open_files().is_checked(&a));
    }

    #[test]
    fn test_rule_reload_reconciles_both_views() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let b = dir.path().join("src/b.ts");
        open_tab(&mut coordinator, &b, false);
        assert!(coordinator.get_checked_files().contains(&b));

        fs::write(dir.path().join(".gitignore"), "src/b.ts\n").unwrap();
        coordinator
            .reload_exclusion_rules(Arc::new(CoreExclusionChecker::load(dir.path(), &[])));

        assert!(!coordinator.get_checked_files().contains(&b));
    }

    #[test]
    fn test_file_created_under_checked_directory_reaches_union() {
        let dir = setup_tree();
        let mut coordinator = coordinator_for(&dir);
        let src = dir.path().join("src");
        coordinator.set_workspace_checked(&src, CheckState::Checked);

        let new_file = src.join("d.ts");
        fs::write(&new_file, "const d = 4").unwrap();
        coordinator.handle_file_created(&new_file);

        assert!(coordinator.get_checked_files().contains(&new_file));
    }
}
