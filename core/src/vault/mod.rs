//! Filesystem-backed vault storage for Markdown documents and folders.
//!
//! This module defines the core structures and logic for persisting the
//! application's data model on disk. A vault keeps the same data in two
//! representations and keeps them reconciled:
//!
//! *   A tree of Markdown files with YAML frontmatter — the human-readable
//!     representation, freely editable with external tools.
//! *   A pair of JSON index files — a cache of entity metadata for fast
//!     listing without re-parsing the whole tree.
//!
//! # Core Concepts
//!
//! *   **[`Vault`]:** The root container for all managed data. A vault
//!     corresponds to a directory on the filesystem. It contains documents,
//!     folders, and a special `.obsidian` subdirectory for internal storage:
//!     the configuration file (`config.json`), the two index files, and the
//!     compositions file. Users typically start by [`Vault::create`]ing or
//!     [`Vault::open`]ing a vault.
//! *   **[`Document`]:** A Markdown note. On disk it lives at
//!     `<vault>/<folder-path>/<sanitized-name>.md`; its frontmatter carries
//!     the id, name, timestamps, version metadata, and annotations.
//! *   **[`Folder`]:** A directory within the vault used for organizing
//!     documents. Folders form a tree via `parent_id` references.
//! *   **[`Composition`]:** AI-assisted writing output. Compositions are not
//!     individual files; they are entries of a single JSON array file, each
//!     carrying its own embedded frontmatter inside its content.
//!
//! # Reconciliation
//!
//! The filesystem is the source of truth. Every full load re-walks the
//! directory tree ([`scanner`]): files and directories found on disk are
//! materialized as entities (reusing index identities where the paths still
//! match, minting ids where they don't), index entries without a backing
//! file are pruned, and id collisions introduced by hand-copied files are
//! resolved. The reconciled view is written back to the index files at the
//! end of every scan.
//!
//! On top of that, [`Vault::check_and_fix`] runs an idempotent repair pass
//! for the corruption classes a scan alone does not address: duplicate ids,
//! invalid or missing dates, missing metadata collections, dangling folder
//! references, parent cycles, and malformed composition frontmatter. It
//! reports a structured tally instead of failing.
//!
//! # Asynchronous API
//!
//! All filesystem I/O operations within this module are `async` and rely on
//! the `tokio` runtime. Methods that perform I/O return `Result<T, Error>`.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use vellum_core::vault::Vault;
//! use tempfile::tempdir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = tempdir()?;
//!     let vault = Vault::create(temp_dir.path().join("my_vault")).await?;
//!
//!     let folder = vault.create_folder("Journal", None).await?;
//!     let mut doc = vault.create_document("Day One", Some(folder.id.clone())).await?;
//!     doc.content = "# Day One\n\nIt begins.\n".to_string();
//!     vault.save_document(doc).await?;
//!
//!     let docs = vault.load_documents().await?;
//!     assert_eq!(docs.len(), 1);
//!
//!     let report = vault.check_and_fix().await;
//!     assert!(report.is_clean());
//!     Ok(())
//! }
//! ```

pub use self::codec::{Decoded, decode, encode};
pub use self::folders::FolderDeletion;
pub use self::integrity::IntegrityReport;
pub use self::scanner::{VaultSnapshot, scan};
pub use self::types::{
    Annotation, Composition, ContextDocumentRef, Document, Folder, Version, mint_id,
};
pub use self::vault::Vault;

mod codec;
mod compositions;
mod documents;
mod folders;
mod index;
mod integrity;
mod links;
pub mod paths;
mod scanner;
mod types;
mod vault;

use std::path::PathBuf;
use thiserror::Error;

/// Name of the internal directory holding configuration and indices.
pub const INTERNAL_DIR_NAME: &str = ".obsidian";
/// Extension of document files.
pub const MARKDOWN_EXTENSION: &str = "md";

pub(crate) const VAULT_CONFIG_FILENAME: &str = "config.json";
pub(crate) const DOCUMENTS_INDEX_FILENAME: &str = "documents-index.json";
pub(crate) const FOLDERS_INDEX_FILENAME: &str = "folders-index.json";
pub(crate) const COMPOSITIONS_FILENAME: &str = "compositions.json";

#[derive(Debug, Error)]
pub enum Error {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Moving folder '{0}' into its own descendants would create a cycle")]
    FolderCycle(String),

    #[error("Metadata serialization/deserialization error")]
    Metadata(#[from] serde_json::Error),

    #[error("Frontmatter serialization/deserialization error")]
    Frontmatter(#[from] serde_yaml::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Path is not a valid vault (missing '.obsidian' subdirectory): {0}")]
    NotAVault(PathBuf),

    #[error("Cannot create vault: path exists and is not an empty directory: {0}")]
    VaultCreationConflict(PathBuf), // Covers non-empty or existing .obsidian dir

    #[error("Cannot create vault: path exists and is a file: {0}")]
    PathIsFile(PathBuf),

    #[error("Vault configuration file is missing or invalid: {0}")]
    InvalidVaultConfig(PathBuf), // Covers missing or malformed config.json
}

// Define a standard Result type for the library
pub type Result<T> = std::result::Result<T, Error>;
