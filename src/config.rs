/*
 * Manages the engine's persisted settings: the attach-open-files policy
 * switch, extra ignored extensions layered on top of the built-in list, and
 * the path of the last opened project. Settings are stored as a JSON
 * document in a standard user directory, abstracted behind a trait
 * (`ConfigManagerOperations`) so hosts and tests can substitute storage
 * backends. The concrete implementation (`CoreConfigManager`) uses a shared
 * path utility for determining the base configuration directory.
 */
use crate::path_utils;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const SETTINGS_FILENAME: &str = "settings.json";
const LAST_PROJECT_PATH_FILENAME: &str = "last_project_path.txt";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serde(serde_json::Error),
    NoConfigDirectory,
    Utf8Error(std::string::FromUtf8Error),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Serde(err)
    }
}

impl From<std::string::FromUtf8Error> for ConfigError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        ConfigError::Utf8Error(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::Serde(e) => write!(f, "Configuration serialization error: {e}"),
            ConfigError::NoConfigDirectory => {
                write!(f, "Could not determine configuration directory")
            }
            ConfigError::Utf8Error(e) => write!(f, "Configuration file UTF-8 error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Serde(e) => Some(e),
            ConfigError::Utf8Error(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/*
 * The user-tunable knobs of the selection engine. `attach_open_files`
 * controls the default applied when a tab opens normally (see the open-files
 * provider); changing it never retroactively rewrites existing entries.
 * `additional_ignored_extensions` extends the built-in extension denylist
 * and takes effect when the exclusion rules are next rebuilt.
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineSettings {
    #[serde(default = "default_attach_open_files")]
    pub attach_open_files: bool,
    #[serde(default)]
    pub additional_ignored_extensions: Vec<String>,
}

fn default_attach_open_files() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            attach_open_files: true,
            additional_ignored_extensions: Vec::new(),
        }
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_settings(&self, app_name: &str) -> Result<EngineSettings>;
    fn save_settings(&self, app_name: &str, settings: &EngineSettings) -> Result<()>;
    fn load_last_project_path(&self, app_name: &str) -> Result<Option<PathBuf>>;
    fn save_last_project_path(&self, app_name: &str, project_path: Option<&Path>) -> Result<()>;
}

pub struct CoreConfigManager {}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {}
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    /*
     * Loads the engine settings for a given application. A missing settings
     * file is not an error; defaults are returned so a fresh install works
     * without any setup step.
     */
    fn load_settings(&self, app_name: &str) -> Result<EngineSettings> {
        log::trace!("CoreConfigManager: Loading settings for app '{app_name}'");
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        let file_path = config_dir.join(SETTINGS_FILENAME);

        if !file_path.exists() {
            log::debug!(
                "CoreConfigManager: Settings file {file_path:?} does not exist, using defaults."
            );
            return Ok(EngineSettings::default());
        }

        let file = File::open(&file_path)?;
        let reader = BufReader::new(file);
        let settings: EngineSettings = serde_json::from_reader(reader)?;
        log::debug!("CoreConfigManager: Loaded settings from {file_path:?}.");
        Ok(settings)
    }

    fn save_settings(&self, app_name: &str, settings: &EngineSettings) -> Result<()> {
        log::trace!("CoreConfigManager: Saving settings for app '{app_name}'");
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        let file_path = config_dir.join(SETTINGS_FILENAME);

        let file = File::create(&file_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, settings)?;
        log::debug!("CoreConfigManager: Saved settings to {file_path:?}.");
        Ok(())
    }

    /*
     * Loads the path of the last used project for a given application, read
     * from a plain-text file in the application's configuration directory.
     */
    fn load_last_project_path(&self, app_name: &str) -> Result<Option<PathBuf>> {
        log::trace!("CoreConfigManager: Loading last project path for app '{app_name}'");
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        let file_path = config_dir.join(LAST_PROJECT_PATH_FILENAME);

        if !file_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&file_path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        if contents.trim().is_empty() {
            Ok(None)
        } else {
            Ok(Some(PathBuf::from(contents.trim())))
        }
    }

    /*
     * Saves the path of the last used project. Passing `None` clears the
     * stored value.
     */
    fn save_last_project_path(&self, app_name: &str, project_path: Option<&Path>) -> Result<()> {
        log::trace!(
            "CoreConfigManager: Saving last project path '{:?}' for app '{app_name}'",
            project_path
        );
        let config_dir = path_utils::get_base_app_config_local_dir(app_name)
            .ok_or(ConfigError::NoConfigDirectory)?;
        let file_path = config_dir.join(LAST_PROJECT_PATH_FILENAME);

        let mut file = File::create(&file_path)?;
        if let Some(path) = project_path {
            file.write_all(path.to_string_lossy().as_bytes())?;
        } else {
            file.write_all(b"")?;
        }
        Ok(())
    }
}
