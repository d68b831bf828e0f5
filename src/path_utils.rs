/*
 * This module provides utility functions for path manipulation: retrieving
 * and ensuring the existence of the application's configuration directory,
 * and walking ancestor chains within a project root. It centralizes common
 * directory logic used by different parts of the engine.
 */
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};

/*
 * Retrieves the application's primary local configuration directory.
 * This function determines the platform-specific path for local (non-roaming)
 * application configuration data. It ensures the directory exists, creating it
 * if necessary. The path is derived without using an organization qualifier,
 * placing it directly under the user's local application data directory
 * structure (e.g., AppData/Local on Windows).
 *
 * Args:
 *   app_name: The name of the application, used to derive the directory path.
 *
 * Returns:
 *   An `Option<PathBuf>` containing the path to the directory if successful,
 *   or `None` if the directory could not be determined or created.
 */
pub fn get_base_app_config_local_dir(app_name: &str) -> Option<PathBuf> {
    log::trace!(
        "PathUtils: Attempting to get base app config local dir for '{}'",
        app_name
    );
    ProjectDirs::from("", "", app_name).and_then(|proj_dirs| {
        let config_path = proj_dirs.config_local_dir();
        if !config_path.exists() {
            if let Err(e) = fs::create_dir_all(config_path) {
                log::error!(
                    "PathUtils: Failed to create base app config directory {:?}: {}",
                    config_path,
                    e
                );
                return None;
            }
            log::debug!(
                "PathUtils: Created base app config directory: {:?}",
                config_path
            );
        }
        Some(config_path.to_path_buf())
    })
}

/*
 * Yields the ancestor directories of `path`, from its immediate parent up to
 * and including `root`. Yields nothing when `path` is not inside `root`.
 * Both selection providers use this for bottom-up parent recomputation and
 * token-cache invalidation chains.
 */
pub fn ancestors_up_to_root<'a>(
    path: &'a Path,
    root: &'a Path,
) -> impl Iterator<Item = &'a Path> + 'a {
    path.ancestors()
        .skip(1)
        .take_while(move |ancestor| ancestor.starts_with(root))
}

/*
 * True when `path` is `root` itself or located anywhere beneath it.
 */
pub fn is_within_root(path: &Path, root: &Path) -> bool {
    path.starts_with(root)
}
