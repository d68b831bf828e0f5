use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/*
 * Represents the checkbox value of a file or folder in either selection view.
 * Derives Serialize and Deserialize so that persisted selections can carry the
 * value directly. Default is Unchecked: a node nobody has touched contributes
 * nothing to the context.
 *
 * Note that "partially selected" is deliberately NOT a third variant. Partial
 * is a derived, directory-only annotation kept in a parallel set (see
 * `NodeCache`), so that the persisted value space stays binary and a saved
 * selection round-trips without ever serializing a partial marker.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckState {
    Checked,
    Unchecked,
}

impl Default for CheckState {
    fn default() -> Self {
        CheckState::Unchecked
    }
}

impl CheckState {
    pub fn is_checked(&self) -> bool {
        *self == CheckState::Checked
    }

    /*
     * Maps a boolean "should this be checked" into the enum. Used by the
     * coordinator when pushing corrective values between providers.
     */
    pub fn from_bool(checked: bool) -> Self {
        if checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        }
    }
}

/*
 * Identifies which provider originated a checked-files change. The coordinator
 * receives these tags over its notification channel and picks the matching
 * reconciliation direction.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Workspace,
    OpenFiles,
}

/*
 * The read model a rendering layer consumes: one entry per visible node,
 * with everything needed to draw a checkbox row. Token counts are optional
 * because a read may legitimately fail (vanished file, permission error),
 * in which case the node renders without an annotation.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub path: PathBuf,
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub is_open_file: bool,
    pub state: CheckState,
    pub is_partial: bool,
    pub token_count: Option<usize>,
}

/*
 * Snapshot of a single editor tab as reported by the host: the file it shows
 * and whether the tab is in preview (transient, replace-on-next-open) mode.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TabState {
    pub path: PathBuf,
    pub is_preview: bool,
}

impl TabState {
    pub fn new(path: impl Into<PathBuf>, is_preview: bool) -> Self {
        TabState {
            path: path.into(),
            is_preview,
        }
    }
}

/*
 * One batch of tab lifecycle notifications from the host editor. `changed`
 * entries carry the current preview flag; the open-files provider detects
 * preview-to-pinned promotions by comparing it against its recorded state.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabEventBatch {
    pub opened: Vec<TabState>,
    pub changed: Vec<TabState>,
    pub closed: Vec<PathBuf>,
}

impl TabEventBatch {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty() && self.changed.is_empty() && self.closed.is_empty()
    }
}

/*
 * Stores the checksum and token count for a single file. A cached count is
 * only served while the file's current checksum still matches, so stale
 * counts cannot survive a content change that arrived without a notification.
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileTokenDetails {
    pub checksum: String,
    pub token_count: usize,
}
