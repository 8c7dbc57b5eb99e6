use tokio::fs;
use tracing::{debug, instrument};

use crate::vault::types::{
    Document, Folder, VERSION_ID_PREFIX, Version, mint_id, now_millis,
};
use crate::vault::vault::Vault;
use crate::vault::{Error, Result, codec, index, paths, scanner};

impl Vault {
    /// Upserts a document into the index and writes its Markdown file.
    ///
    /// Filesystem write errors propagate to the caller; they are fatal for
    /// this one operation, not for the vault.
    #[instrument(skip(self, document), fields(id = %document.id))]
    pub async fn save_document(&self, document: Document) -> Result<Document> {
        let folders: Vec<Folder> = index::read_index(&self.folders_index_path()).await;
        let mut documents: Vec<Document> = index::read_index(&self.documents_index_path()).await;
        match documents.iter_mut().find(|d| d.id == document.id) {
            Some(slot) => *slot = document.clone(),
            None => documents.push(document.clone()),
        }
        index::write_index(&self.documents_index_path(), &documents).await?;

        let path = paths::document_abs_path(self.path(), &document, &folders);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(Error::Io)?;
        }
        let encoded = codec::encode(&document)?;
        fs::write(&path, encoded).await.map_err(Error::Io)?;
        debug!("Document saved to {}", path.display());
        Ok(document)
    }

    /// Creates a new document with the given name, optionally inside a folder.
    pub async fn create_document(&self, name: &str, folder_id: Option<String>) -> Result<Document> {
        if let Some(folder_id) = &folder_id {
            let folders: Vec<Folder> = index::read_index(&self.folders_index_path()).await;
            if !folders.iter().any(|f| &f.id == folder_id) {
                return Err(Error::FolderNotFound(folder_id.clone()));
            }
        }
        self.save_document(Document::new(name, folder_id)).await
    }

    /// Loads all documents through a full directory scan.
    ///
    /// The filesystem is the source of truth; the index is only a cache, so
    /// external edits made between loads are always picked up.
    pub async fn load_documents(&self) -> Result<Vec<Document>> {
        Ok(scanner::scan(self).await?.documents)
    }

    /// Loads a single document by id.
    pub async fn get_document(&self, id: &str) -> Result<Document> {
        self.load_documents()
            .await?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))
    }

    /// Removes a document from the index and deletes its backing file.
    ///
    /// Deleting an unknown id is a no-op.
    #[instrument(skip(self))]
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        let snapshot = scanner::scan(self).await?;
        let Some(document) = snapshot.documents.iter().find(|d| d.id == id) else {
            debug!("Delete requested for unknown document, ignoring");
            return Ok(());
        };

        let remaining: Vec<Document> = snapshot
            .documents
            .iter()
            .filter(|d| d.id != id)
            .cloned()
            .collect();
        index::write_index(&self.documents_index_path(), &remaining).await?;

        let path = paths::document_abs_path(self.path(), document, &snapshot.folders);
        match fs::remove_file(&path).await {
            Ok(()) => debug!("Deleted document file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Document file already absent: {}", path.display());
            }
            Err(e) => return Err(Error::Io(e)),
        }
        Ok(())
    }

    /// Renames a document, moving its backing file to the new path.
    ///
    /// The physical file is moved, not rewritten from scratch, so content is
    /// preserved even if it diverges from the index; the frontmatter and
    /// index entry are refreshed afterwards through the normal save path.
    #[instrument(skip(self))]
    pub async fn rename_document(&self, id: &str, new_name: &str) -> Result<Document> {
        let snapshot = scanner::scan(self).await?;
        let mut document = snapshot
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;

        let old_path = paths::document_abs_path(self.path(), &document, &snapshot.folders);
        document.name = new_name.to_string();
        document.updated_at = Some(now_millis());
        let new_path = paths::document_abs_path(self.path(), &document, &snapshot.folders);

        if old_path != new_path && fs::try_exists(&old_path).await.map_err(Error::Io)? {
            debug!("Moving {} -> {}", old_path.display(), new_path.display());
            fs::rename(&old_path, &new_path).await.map_err(Error::Io)?;
        }
        self.save_document(document).await
    }

    /// Moves a document into another folder (or to the root with `None`),
    /// moving its backing file to the new path.
    #[instrument(skip(self))]
    pub async fn move_document(&self, id: &str, folder_id: Option<String>) -> Result<Document> {
        let snapshot = scanner::scan(self).await?;
        if let Some(target) = &folder_id {
            if !snapshot.folders.iter().any(|f| &f.id == target) {
                return Err(Error::FolderNotFound(target.clone()));
            }
        }
        let mut document = snapshot
            .documents
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;

        let old_path = paths::document_abs_path(self.path(), &document, &snapshot.folders);
        document.folder_id = folder_id;
        document.updated_at = Some(now_millis());
        let new_path = paths::document_abs_path(self.path(), &document, &snapshot.folders);

        if old_path != new_path && fs::try_exists(&old_path).await.map_err(Error::Io)? {
            if let Some(parent) = new_path.parent() {
                fs::create_dir_all(parent).await.map_err(Error::Io)?;
            }
            debug!("Moving {} -> {}", old_path.display(), new_path.display());
            fs::rename(&old_path, &new_path).await.map_err(Error::Io)?;
        }
        self.save_document(document).await
    }

    /// Records a snapshot of a document's current content, newest first.
    ///
    /// Only the snapshot metadata is durably stored; see [`Version`].
    #[instrument(skip(self))]
    pub async fn create_version(&self, id: &str, message: Option<String>) -> Result<Document> {
        let mut document = self.get_document(id).await?;
        let version = Version {
            id: mint_id(VERSION_ID_PREFIX),
            content: document.content.clone(),
            created_at: Some(now_millis()),
            message,
        };
        document.versions.get_or_insert_with(Vec::new).insert(0, version);
        document.updated_at = Some(now_millis());
        self.save_document(document).await
    }
}
