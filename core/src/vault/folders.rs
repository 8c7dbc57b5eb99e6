use std::collections::HashSet;

use tokio::fs;
use tracing::{debug, instrument};

use crate::vault::types::{Document, Folder};
use crate::vault::vault::Vault;
use crate::vault::{Error, Result, index, paths, scanner};

/// The outcome of a folder deletion request.
///
/// A non-recursive request on a non-empty folder is refused rather than
/// failed; the caller is expected to branch on the refusal and re-invoke
/// with `recursive: true` if that is what the user wants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderDeletion {
    Deleted {
        documents_removed: usize,
        folders_removed: usize,
    },
    Refused {
        can_recurse: bool,
        document_count: usize,
        subfolder_count: usize,
    },
}

impl Vault {
    /// Upserts a folder into the index and ensures its directory exists.
    #[instrument(skip(self, folder), fields(id = %folder.id))]
    pub async fn save_folder(&self, folder: Folder) -> Result<Folder> {
        let mut folders: Vec<Folder> = index::read_index(&self.folders_index_path()).await;
        match folders.iter_mut().find(|f| f.id == folder.id) {
            Some(slot) => *slot = folder.clone(),
            None => folders.push(folder.clone()),
        }
        index::write_index(&self.folders_index_path(), &folders).await?;

        let path = paths::folder_abs_path(self.path(), &folder.id, &folders);
        fs::create_dir_all(&path).await.map_err(Error::Io)?;
        debug!("Folder saved at {}", path.display());
        Ok(folder)
    }

    /// Creates a new folder with the given name, optionally inside a parent.
    pub async fn create_folder(&self, name: &str, parent_id: Option<String>) -> Result<Folder> {
        if let Some(parent_id) = &parent_id {
            let folders: Vec<Folder> = index::read_index(&self.folders_index_path()).await;
            if !folders.iter().any(|f| &f.id == parent_id) {
                return Err(Error::FolderNotFound(parent_id.clone()));
            }
        }
        self.save_folder(Folder::new(name, parent_id)).await
    }

    /// Loads all folders through a full directory scan.
    pub async fn load_folders(&self) -> Result<Vec<Folder>> {
        Ok(scanner::scan(self).await?.folders)
    }

    /// Loads a single folder by id.
    pub async fn get_folder(&self, id: &str) -> Result<Folder> {
        self.load_folders()
            .await?
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::FolderNotFound(id.to_string()))
    }

    /// Renames a folder, moving its directory (and everything inside it) to
    /// the new path.
    #[instrument(skip(self))]
    pub async fn rename_folder(&self, id: &str, new_name: &str) -> Result<Folder> {
        let snapshot = scanner::scan(self).await?;
        let mut folders = snapshot.folders;
        let slot = folders
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| Error::FolderNotFound(id.to_string()))?;

        let old_path = paths::folder_abs_path(self.path(), id, &folders);
        folders[slot].name = new_name.to_string();
        let new_path = paths::folder_abs_path(self.path(), id, &folders);

        if old_path != new_path && fs::try_exists(&old_path).await.map_err(Error::Io)? {
            debug!("Moving {} -> {}", old_path.display(), new_path.display());
            fs::rename(&old_path, &new_path).await.map_err(Error::Io)?;
        }
        index::write_index(&self.folders_index_path(), &folders).await?;
        Ok(folders[slot].clone())
    }

    /// Moves a folder under another parent (or to the root with `None`),
    /// moving its directory to the new path.
    ///
    /// A move into the folder's own descendant chain is rejected: it would
    /// create a parent cycle.
    #[instrument(skip(self))]
    pub async fn move_folder(&self, id: &str, parent_id: Option<String>) -> Result<Folder> {
        let snapshot = scanner::scan(self).await?;
        let mut folders = snapshot.folders;
        let slot = folders
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| Error::FolderNotFound(id.to_string()))?;

        if let Some(target) = &parent_id {
            if !folders.iter().any(|f| &f.id == target) {
                return Err(Error::FolderNotFound(target.clone()));
            }
            // Walk the target's ancestor chain; finding the folder being
            // moved (or the target being the folder itself) means a cycle.
            let mut current = Some(target.as_str());
            let mut visited: HashSet<&str> = HashSet::new();
            while let Some(ancestor) = current {
                if ancestor == id {
                    return Err(Error::FolderCycle(id.to_string()));
                }
                if !visited.insert(ancestor) {
                    break;
                }
                current = folders
                    .iter()
                    .find(|f| f.id == ancestor)
                    .and_then(|f| f.parent_id.as_deref());
            }
        }

        let old_path = paths::folder_abs_path(self.path(), id, &folders);
        folders[slot].parent_id = parent_id;
        let new_path = paths::folder_abs_path(self.path(), id, &folders);

        if old_path != new_path && fs::try_exists(&old_path).await.map_err(Error::Io)? {
            if let Some(parent) = new_path.parent() {
                fs::create_dir_all(parent).await.map_err(Error::Io)?;
            }
            debug!("Moving {} -> {}", old_path.display(), new_path.display());
            fs::rename(&old_path, &new_path).await.map_err(Error::Io)?;
        }
        index::write_index(&self.folders_index_path(), &folders).await?;
        Ok(folders[slot].clone())
    }

    /// Deletes a folder.
    ///
    /// In non-recursive mode the request is refused (not failed) when the
    /// folder still contains documents or subfolders. In recursive mode the
    /// full transitive closure of descendants is removed: both indices are
    /// pruned first, then the directory tree is deleted, so a crash
    /// mid-operation leaves at worst an orphaned directory for the next scan
    /// to re-adopt, never index entries pointing at deleted files.
    #[instrument(skip(self))]
    pub async fn delete_folder(&self, id: &str, recursive: bool) -> Result<FolderDeletion> {
        let snapshot = scanner::scan(self).await?;
        if !snapshot.folders.iter().any(|f| f.id == id) {
            return Err(Error::FolderNotFound(id.to_string()));
        }

        let subfolder_count = snapshot
            .folders
            .iter()
            .filter(|f| f.parent_id.as_deref() == Some(id))
            .count();
        let document_count = snapshot
            .documents
            .iter()
            .filter(|d| d.folder_id.as_deref() == Some(id))
            .count();

        if !recursive && (subfolder_count > 0 || document_count > 0) {
            debug!(
                "Refusing non-recursive delete: {} documents, {} subfolders",
                document_count, subfolder_count
            );
            return Ok(FolderDeletion::Refused {
                can_recurse: true,
                document_count,
                subfolder_count,
            });
        }

        // Transitive closure of descendant folder ids, the folder included.
        let mut doomed: HashSet<String> = HashSet::new();
        doomed.insert(id.to_string());
        loop {
            let before = doomed.len();
            for folder in &snapshot.folders {
                if let Some(parent) = &folder.parent_id {
                    if doomed.contains(parent) {
                        doomed.insert(folder.id.clone());
                    }
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        let remaining_documents: Vec<Document> = snapshot
            .documents
            .iter()
            .filter(|d| d.folder_id.as_deref().is_none_or(|f| !doomed.contains(f)))
            .cloned()
            .collect();
        let documents_removed = snapshot.documents.len() - remaining_documents.len();
        let remaining_folders: Vec<Folder> = snapshot
            .folders
            .iter()
            .filter(|f| !doomed.contains(&f.id))
            .cloned()
            .collect();
        let folders_removed = doomed.len();

        index::write_index(&self.documents_index_path(), &remaining_documents).await?;
        index::write_index(&self.folders_index_path(), &remaining_folders).await?;

        let path = paths::folder_abs_path(self.path(), id, &snapshot.folders);
        match fs::remove_dir_all(&path).await {
            Ok(()) => debug!("Deleted folder tree at {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Folder directory already absent: {}", path.display());
            }
            Err(e) => return Err(Error::Io(e)),
        }

        Ok(FolderDeletion::Deleted {
            documents_removed,
            folders_removed,
        })
    }
}
