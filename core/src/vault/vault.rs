use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::vault::types::{Document, Folder};
use crate::vault::{
    COMPOSITIONS_FILENAME, DOCUMENTS_INDEX_FILENAME, Error, FOLDERS_INDEX_FILENAME,
    INTERNAL_DIR_NAME, Result, VAULT_CONFIG_FILENAME, index,
};

/// Represents the root vault directory containing documents and folders,
/// along with internal index and configuration storage.
#[derive(Debug, Clone)]
pub struct Vault {
    // Absolute path to the vault root
    pub(crate) absolute_path: PathBuf,
    pub(crate) internal_dir: PathBuf,
}

impl Vault {
    /// Returns the root path of the vault.
    pub fn path(&self) -> &Path {
        &self.absolute_path
    }

    /// Returns the path to the internal `.obsidian` directory used for
    /// configuration and the index files.
    pub(crate) fn internal_dir_path(&self) -> &Path {
        &self.internal_dir
    }

    pub(crate) fn documents_index_path(&self) -> PathBuf {
        self.internal_dir.join(DOCUMENTS_INDEX_FILENAME)
    }

    pub(crate) fn folders_index_path(&self) -> PathBuf {
        self.internal_dir.join(FOLDERS_INDEX_FILENAME)
    }

    pub(crate) fn compositions_path(&self) -> PathBuf {
        self.internal_dir.join(COMPOSITIONS_FILENAME)
    }

    /// Opens an existing vault directory.
    ///
    /// Checks that the directory exists, contains the `.obsidian`
    /// subdirectory, and has a readable configuration file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Vault> {
        let path = path.as_ref();
        debug!("Attempting to open vault");

        // Check if the path exists (necessary prior to canonicalization)
        let meta = fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::DirectoryNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        if !meta.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }

        let absolute_path = fs::canonicalize(path).await.map_err(Error::Io)?;
        debug!("Canonicalized vault path: {}", absolute_path.display());

        let internal_dir = absolute_path.join(INTERNAL_DIR_NAME);
        let internal_meta = fs::metadata(&internal_dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                // .obsidian dir missing means not a vault
                Error::NotAVault(absolute_path.clone())
            } else {
                Error::Io(e)
            }
        })?;

        if !internal_meta.is_dir() {
            return Err(Error::NotAVault(absolute_path)); // .obsidian exists but isn't a directory
        }

        // Read and validate the vault configuration file
        let config_path = internal_dir.join(VAULT_CONFIG_FILENAME);
        debug!("Attempting to read vault config from {}", config_path.display());
        let _config = read_vault_config(&config_path).await?; // Read but don't store yet
        debug!("Vault opened successfully");

        Ok(Vault {
            absolute_path,
            internal_dir,
        })
    }

    /// Creates a new vault at the specified path.
    ///
    /// - If the path does not exist, creates the directory and the `.obsidian` subdirectory.
    /// - If the path exists and is an empty directory, creates the `.obsidian` subdirectory.
    /// - Fails if the path exists and is a file, is a non-empty directory,
    ///   or already contains a `.obsidian` file/directory.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn create(path: impl AsRef<Path>) -> Result<Vault> {
        let path = path.as_ref();
        debug!("Attempting to create vault");

        let internal_dir = path.join(INTERNAL_DIR_NAME);

        match fs::metadata(path).await {
            Ok(meta) => {
                // Path exists
                if !meta.is_dir() {
                    debug!("Vault creation failed: path exists and is a file");
                    return Err(Error::PathIsFile(path.to_path_buf()));
                }

                // Path exists and is a directory, check if empty and if .obsidian exists
                if fs::metadata(&internal_dir).await.is_ok() {
                    debug!("Vault creation failed: '.obsidian' directory already exists");
                    return Err(Error::VaultCreationConflict(path.to_path_buf()));
                }

                let mut read_dir = fs::read_dir(path).await.map_err(Error::Io)?;
                if read_dir.next_entry().await.map_err(Error::Io)?.is_some() {
                    debug!("Vault creation failed: directory is not empty");
                    return Err(Error::VaultCreationConflict(path.to_path_buf()));
                }

                debug!("Path exists and is an empty directory. Creating internal directory.");
                fs::create_dir(&internal_dir).await.map_err(Error::Io)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Path does not exist. Creating vault directory and internal directory.");
                fs::create_dir_all(path).await.map_err(Error::Io)?;
                fs::create_dir(&internal_dir).await.map_err(Error::Io)?;
            }
            Err(e) => {
                return Err(Error::Io(e));
            }
        }

        let absolute_path = fs::canonicalize(path).await.map_err(Error::Io)?;
        debug!("Canonicalized vault path: {}", absolute_path.display());

        let vault = Vault {
            internal_dir: absolute_path.join(INTERNAL_DIR_NAME),
            absolute_path,
        };
        vault.ensure_layout().await?;
        debug!("Vault created successfully");
        Ok(vault)
    }

    /// Bootstraps any missing pieces of the vault layout: the root and
    /// internal directories, the configuration file, and empty index files.
    ///
    /// Idempotent; existing files are left untouched.
    pub(crate) async fn ensure_layout(&self) -> Result<()> {
        fs::create_dir_all(&self.internal_dir).await.map_err(Error::Io)?;

        let config_path = self.internal_dir.join(VAULT_CONFIG_FILENAME);
        if fs::metadata(&config_path).await.is_err() {
            write_vault_config(&config_path, &VaultConfig::new()).await?;
        }

        let documents_index = self.documents_index_path();
        if fs::metadata(&documents_index).await.is_err() {
            index::write_index::<Document>(&documents_index, &[]).await?;
        }
        let folders_index = self.folders_index_path();
        if fs::metadata(&folders_index).await.is_err() {
            index::write_index::<Folder>(&folders_index, &[]).await?;
        }
        Ok(())
    }
}

/// Represents configuration associated with a vault.
/// Stored in `.obsidian/config.json` within the vault directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct VaultConfig {
    /// A unique identifier for the vault instance.
    id: Uuid,
    /// A version number for the configuration format, useful for future migrations.
    version: u32,
    created_at: DateTime<Utc>,
}

impl VaultConfig {
    /// Creates a new configuration instance with default values.
    pub(crate) fn new() -> Self {
        VaultConfig {
            id: Uuid::new_v4(),
            version: 1, // Start at version 1
            created_at: Utc::now(),
        }
    }
}

/// Helper to read and deserialize the vault configuration.
pub(crate) async fn read_vault_config(path: &Path) -> Result<VaultConfig> {
    let content = fs::read(path).await.map_err(|e| {
        warn!("Failed to read vault config file '{}': {}", path.display(), e);
        Error::InvalidVaultConfig(path.to_path_buf()) // Config missing or unreadable
    })?;

    serde_json::from_slice(&content).map_err(|e| {
        warn!("Failed to parse vault config file '{}': {}", path.display(), e);
        Error::InvalidVaultConfig(path.to_path_buf()) // Config malformed
    })
}

/// Helper to serialize and write the vault configuration.
pub(crate) async fn write_vault_config(path: &Path, config: &VaultConfig) -> Result<()> {
    let content = serde_json::to_string_pretty(config).map_err(Error::Metadata)?;
    fs::write(path, content).await.map_err(Error::Io)?;
    debug!("Vault config written successfully to {}", path.display());
    Ok(())
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    // Helper to create a dummy file/dir
    async fn create_dummy(path: &Path, is_dir: bool) {
        if is_dir {
            fs::create_dir_all(path).await.expect("Failed to create dummy dir");
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.expect("Failed to create parent dir");
            }
            fs::write(path, "").await.expect("Failed to create dummy file");
        }
    }

    #[tokio::test]
    async fn test_vault_create_new() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("new_vault");

        let vault = Vault::create(&vault_path).await.unwrap();
        assert!(vault_path.exists());
        assert!(vault_path.is_dir());
        assert!(vault.internal_dir_path().exists());
        assert!(vault.internal_dir_path().is_dir());
        assert_eq!(vault.internal_dir_path().file_name().unwrap(), INTERNAL_DIR_NAME);

        // check for config.json
        let config_path = vault.internal_dir_path().join(VAULT_CONFIG_FILENAME);
        assert!(config_path.exists(), "Vault config file should exist");
        let content = fs::read_to_string(&config_path).await.unwrap();
        let config: serde_json::Value =
            serde_json::from_str(&content).expect("Config file should be valid JSON");
        assert!(config.get("id").is_some()); // Check for UUID field

        // both index files are bootstrapped empty
        let documents: Vec<Document> = index::read_index(&vault.documents_index_path()).await;
        assert!(documents.is_empty());
        assert!(vault.folders_index_path().exists());
    }

    #[tokio::test]
    async fn test_vault_create_in_empty_dir() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("empty_dir_vault");
        create_dummy(&vault_path, true).await; // Create empty dir first

        let vault = Vault::create(&vault_path).await.unwrap();
        assert!(vault_path.exists());
        assert!(vault.internal_dir_path().exists());
    }

    #[tokio::test]
    async fn test_vault_create_fails_if_file() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("file_path_vault");
        create_dummy(&vault_path, false).await; // Create a file

        let result = Vault::create(&vault_path).await;
        assert!(matches!(result, Err(Error::PathIsFile(_))));
    }

    #[tokio::test]
    async fn test_vault_create_fails_if_non_empty() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("non_empty_vault");
        create_dummy(&vault_path.join("some_file.txt"), false).await; // Create a file inside

        let result = Vault::create(&vault_path).await;
        assert!(matches!(result, Err(Error::VaultCreationConflict(_))));
    }

    #[tokio::test]
    async fn test_vault_create_fails_if_internal_dir_exists() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("already_vault");
        create_dummy(&vault_path.join(INTERNAL_DIR_NAME), true).await; // Create internal dir

        let result = Vault::create(&vault_path).await;
        assert!(matches!(result, Err(Error::VaultCreationConflict(_))));
    }

    #[tokio::test]
    async fn test_vault_open_ok() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("existing_vault");

        // Create a valid vault structure first
        Vault::create(&vault_path).await.unwrap();

        // Now open it
        let vault = Vault::open(&vault_path).await.unwrap();
        assert_eq!(vault.path(), fs::canonicalize(vault_path.as_path()).await.unwrap());
        assert!(vault.internal_dir_path().exists());
    }

    #[tokio::test]
    async fn test_vault_open_fails_if_missing() {
        let dir = tempdir().unwrap();
        let result = Vault::open(dir.path().join("nothing_here")).await;
        assert!(matches!(result, Err(Error::DirectoryNotFound(_))));
    }

    #[tokio::test]
    async fn test_vault_open_fails_if_not_dir() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("not_a_dir_vault");
        create_dummy(&vault_path, false).await; // Create a file

        let result = Vault::open(&vault_path).await;
        assert!(matches!(result, Err(Error::NotADirectory(_))));
    }

    #[tokio::test]
    async fn test_vault_open_fails_if_no_internal_dir() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("no_internal_dir_vault");
        create_dummy(&vault_path, true).await; // Create dir, but not internal one

        let result = Vault::open(&vault_path).await;
        assert!(matches!(result, Err(Error::NotAVault(_))));
    }

    #[tokio::test]
    async fn test_vault_open_fails_if_internal_is_file() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("internal_is_file_vault");
        create_dummy(&vault_path, true).await;
        create_dummy(&vault_path.join(INTERNAL_DIR_NAME), false).await; // Create internal as file

        let result = Vault::open(&vault_path).await;
        assert!(matches!(result, Err(Error::NotAVault(_))));
    }

    #[tokio::test]
    async fn test_vault_open_fails_if_config_missing() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("config_missing_vault");

        // Create vault structure manually *without* config.json
        create_dummy(&vault_path, true).await;
        create_dummy(&vault_path.join(INTERNAL_DIR_NAME), true).await;

        let open_err = Vault::open(&vault_path).await;
        assert!(
            matches!(open_err, Err(Error::InvalidVaultConfig(_))),
            "Opening vault without config should fail"
        );
    }

    #[tokio::test]
    async fn test_vault_open_fails_if_config_malformed() {
        let dir = tempdir().unwrap();
        let vault_path = dir.path().join("config_malformed_vault");
        let internal_dir_path = vault_path.join(INTERNAL_DIR_NAME);
        let config_path = internal_dir_path.join(VAULT_CONFIG_FILENAME);

        // Create vault structure with invalid config.json
        create_dummy(&vault_path, true).await;
        create_dummy(&internal_dir_path, true).await;
        fs::write(&config_path, "{ not json }").await.unwrap(); // Write malformed JSON

        let open_err = Vault::open(&vault_path).await;
        assert!(
            matches!(open_err, Err(Error::InvalidVaultConfig(_))),
            "Opening vault with malformed config should fail"
        );
    }

    #[tokio::test]
    async fn test_ensure_layout_is_idempotent() {
        let dir = tempdir().unwrap();
        let vault = Vault::create(dir.path().join("vault")).await.unwrap();

        let config_path = vault.internal_dir_path().join(VAULT_CONFIG_FILENAME);
        let before = fs::read_to_string(&config_path).await.unwrap();
        vault.ensure_layout().await.unwrap();
        let after = fs::read_to_string(&config_path).await.unwrap();
        assert_eq!(before, after, "Existing config must not be rewritten");
    }
}
