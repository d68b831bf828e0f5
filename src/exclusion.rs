/*
 * This module decides which paths never participate in selection: entries
 * matched by gitignore rules, the version-control directory itself, and
 * files whose extension marks them as binary or otherwise useless as text
 * context. It defines a trait (`ExclusionCheckerOperations`) so providers
 * and tests can substitute rule sets, and a concrete `CoreExclusionChecker`
 * built on the `ignore` crate.
 *
 * A checker instance is immutable once built. Rule reloads (a .gitignore
 * edit, a configuration change) construct a fresh checker and swap it into
 * the providers, which then drop any checked entries the new rules exclude.
 */
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/* The version-control directory is excluded unconditionally; no ignore rule
 * can re-include it. */
pub const RESERVED_VCS_DIR_NAME: &str = ".git";

/*
 * Extensions of files that are skipped as selection candidates: binary
 * media, archives, compiled artifacts, and bulky generated data. Matched
 * against every compound-suffix variation of a file name, so "sprite.png"
 * and "bundle.min.js.map" style names behave predictably.
 */
pub const DEFAULT_IGNORED_EXTENSIONS: &[&str] = &[
    // Images
    "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "tiff", "psd",
    // Videos
    "mp4", "webm", "avi", "mov", "wmv", "flv", "mkv",
    // Audio
    "mp3", "wav", "ogg", "m4a", "aac", "flac",
    // Archives
    "zip", "rar", "7z", "tar", "gz", "bz2",
    // Fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // Other binary
    "pdf", "exe", "dll", "so", "dylib",
    // Cache and compiled files
    "cache", "class", "pyc", "pyo",
    // Lock files (often very large)
    "lock", "lockb",
    // Large data files
    "csv", "xls", "xlsx", "db", "sqlite",
];

/*
 * Defines the operations for deciding whether a path participates in
 * selection. Both selection providers consult the same checker instance.
 */
pub trait ExclusionCheckerOperations: Send + Sync {
    /*
     * Answers whether the path (relative to the project root) is excluded by
     * ignore rules or because it sits inside the reserved version-control
     * directory. `is_dir` disambiguates directory-only rules like "target/".
     */
    fn is_excluded(&self, relative_path: &Path, is_dir: bool) -> bool;

    /*
     * Answers whether the file's name carries an extension on the ignored
     * list. Compound suffixes are matched from the right, so for
     * "style.scss.d.ts" the variations "ts", "d.ts" and "scss.d.ts" are all
     * tried. Directories are never matched by this.
     */
    fn has_ignored_extension(&self, path: &Path) -> bool;
}

/*
 * The core implementation of `ExclusionCheckerOperations`: a combined
 * gitignore matcher over every .gitignore found in the project, plus the
 * extension denylist.
 */
pub struct CoreExclusionChecker {
    root: PathBuf,
    gitignore: Gitignore,
    ignored_extensions: HashSet<String>,
}

impl CoreExclusionChecker {
    /*
     * Builds a checker for `root` by discovering all .gitignore files under
     * it (the reserved VCS directory is not descended into) and combining
     * their rules, each scoped to its containing directory the way git
     * scopes them. A `node_modules/` rule is always appended. Unreadable or
     * malformed rule files are skipped with a warning; the remaining rules
     * still apply.
     */
    pub fn load(root: &Path, additional_extensions: &[String]) -> Self {
        let mut builder = GitignoreBuilder::new(root);

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| e.file_name() != OsStr::new(RESERVED_VCS_DIR_NAME))
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() && entry.file_name() == OsStr::new(".gitignore") {
                if let Some(err) = builder.add(entry.path()) {
                    log::warn!(
                        "ExclusionChecker: Skipping unusable ignore rules from {:?}: {}",
                        entry.path(),
                        err
                    );
                }
            }
        }

        // node_modules is excluded even in projects that never listed it.
        if let Err(err) = builder.add_line(None, "node_modules/") {
            log::warn!("ExclusionChecker: Failed to add node_modules rule: {err}");
        }

        let gitignore = match builder.build() {
            Ok(gitignore) => gitignore,
            Err(err) => {
                log::warn!(
                    "ExclusionChecker: Failed to build combined ignore rules for {root:?}: {err}. \
                     Continuing with no ignore rules."
                );
                Gitignore::empty()
            }
        };
        log::debug!(
            "ExclusionChecker: Built matcher for {:?} with {} rules.",
            root,
            gitignore.len()
        );

        CoreExclusionChecker {
            root: root.to_path_buf(),
            gitignore,
            ignored_extensions: build_extension_set(additional_extensions),
        }
    }

    /*
     * A checker with no gitignore rules, only the reserved directory and the
     * extension denylist. Used when the project has no ignore files and by
     * tests that want exclusion-free trees.
     */
    pub fn empty(root: &Path) -> Self {
        CoreExclusionChecker {
            root: root.to_path_buf(),
            gitignore: Gitignore::empty(),
            ignored_extensions: build_extension_set(&[]),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /*
     * Convenience for callers holding absolute paths: strips the project
     * root and delegates to `is_excluded`. Paths outside the root are not
     * this checker's concern and report as not excluded.
     */
    pub fn is_excluded_abs(&self, absolute_path: &Path, is_dir: bool) -> bool {
        match absolute_path.strip_prefix(&self.root) {
            Ok(relative) => self.is_excluded(relative, is_dir),
            Err(_) => false,
        }
    }
}

impl ExclusionCheckerOperations for CoreExclusionChecker {
    fn is_excluded(&self, relative_path: &Path, is_dir: bool) -> bool {
        if relative_path.as_os_str().is_empty() {
            return false;
        }

        // The VCS directory is never gitignored; exclude it manually.
        if relative_path
            .components()
            .any(|c| c.as_os_str() == OsStr::new(RESERVED_VCS_DIR_NAME))
        {
            return true;
        }

        self.gitignore
            .matched_path_or_any_parents(relative_path, is_dir)
            .is_ignore()
    }

    fn has_ignored_extension(&self, path: &Path) -> bool {
        let Some(file_name) = path.file_name().and_then(OsStr::to_str) else {
            return false;
        };
        extension_variations(file_name)
            .iter()
            .any(|ext| self.ignored_extensions.contains(ext))
    }
}

fn build_extension_set(additional_extensions: &[String]) -> HashSet<String> {
    DEFAULT_IGNORED_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .chain(
            additional_extensions
                .iter()
                .map(|ext| ext.to_lowercase().trim_start_matches('.').to_string()),
        )
        .collect()
}

/*
 * Produces every suffix variation of a file name, shortest first:
 * "file.scss.d.ts" yields ["ts", "d.ts", "scss.d.ts"]. A name without a dot
 * yields nothing.
 */
fn extension_variations(file_name: &str) -> Vec<String> {
    let mut parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() <= 1 {
        return Vec::new();
    }
    // Drop the base name; everything after the first dot is extension material.
    parts.remove(0);

    let mut variations = Vec::with_capacity(parts.len());
    let mut current = String::new();
    for part in parts.iter().rev() {
        if current.is_empty() {
            current = part.to_lowercase();
        } else {
            current = format!("{}.{}", part.to_lowercase(), current);
        }
        variations.push(current.clone());
    }
    variations
}
