/*
 * context_packer: a selection engine for assembling LLM context out of a
 * project's files. It maintains a tri-state checkbox selection over the
 * workspace tree and over the set of currently open editor files, keeps the
 * two views consistent through a mediating coordinator, honors
 * gitignore-style exclusions, and annotates nodes with estimated token
 * counts. The host editor integration drives it with tab lifecycle and
 * filesystem watcher events and reads the merged checked-file set back when
 * building an outgoing context payload.
 */
pub mod checksum_utils;
pub mod config;
pub mod coordinator;
pub mod exclusion;
pub mod file_system;
pub mod logging;
pub mod models;
pub mod node_cache;
pub mod open_files_provider;
pub mod path_utils;
pub mod tokenizer_utils;
pub mod workspace_provider;

// Re-export key structures and enums
pub use models::{ChangeOrigin, CheckState, FileTokenDetails, NodeDescriptor, TabEventBatch, TabState};

// Re-export the selection surface
pub use coordinator::{ChangeNotifier, SelectionCoordinator};
pub use node_cache::NodeCache;
pub use open_files_provider::OpenFilesSelectionProvider;
pub use workspace_provider::WorkspaceSelectionProvider;

// Re-export exclusion related items
pub use exclusion::{
    CoreExclusionChecker, DEFAULT_IGNORED_EXTENSIONS, ExclusionCheckerOperations,
};

// Re-export file system related items
pub use file_system::{FileSystemError, list_entries};

// Re-export config related items
pub use config::{ConfigError, ConfigManagerOperations, CoreConfigManager, EngineSettings};

// Re-export token counting related items
pub use tokenizer_utils::{
    CoreTikTokenCounter, FileTokenCache, SimpleWhitespaceTokenCounter, TokenCounterOperations,
};
