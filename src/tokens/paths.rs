// Token storage path utilities.
// Resolves the per-user data directory and the files stored inside it.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use super::provider::Provider;

/// Per-user data directory for token records (~/.local/share/satchel on Linux).
pub fn data_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "satchel").map(|dirs| dirs.data_local_dir().to_path_buf())
}

/// Path of a provider's token record within `dir`.
pub fn token_path(dir: &Path, provider: Provider) -> PathBuf {
    dir.join(format!("social_tokens_{}.json", provider.as_str()))
}

/// Path of the persisted master key within `dir`.
pub fn key_path(dir: &Path) -> PathBuf {
    dir.join("storage.key")
}
