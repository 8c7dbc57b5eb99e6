use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::vault::types::{
    DOCUMENT_ID_PREFIX, Document, FOLDER_ID_PREFIX, Folder, mint_id, now_millis,
};
use crate::vault::vault::Vault;
use crate::vault::{Error, INTERNAL_DIR_NAME, MARKDOWN_EXTENSION, Result, codec, index, paths};

/// The reconciled view of a vault produced by a full scan.
#[derive(Debug, Clone)]
pub struct VaultSnapshot {
    pub documents: Vec<Document>,
    pub folders: Vec<Folder>,
}

/// Recursively walks the vault directory tree and reconciles it against the
/// index files. The filesystem is the source of truth: files and directories
/// found on disk are materialized as entities, and index entries without a
/// backing file are dropped. Both indices are rewritten at the end of every
/// scan.
///
/// The walk is two-phase: the complete folder tree is built first, then every
/// Markdown file is decoded against it, so a document's `folder_id` never
/// depends on discovery order.
#[instrument(skip(vault), fields(root = %vault.path().display()))]
pub async fn scan(vault: &Vault) -> Result<VaultSnapshot> {
    let root = vault.path().to_path_buf();
    let indexed_folders: Vec<Folder> = index::read_index(&vault.folders_index_path()).await;

    // Index entries keyed by the relative path their parent chain produces.
    // A directory matching one of these keys keeps its identity (id, creation
    // date, parent reference) across scans.
    let mut known_folders: HashMap<PathBuf, Folder> = indexed_folders
        .iter()
        .map(|f| (paths::folder_rel_path(Some(&f.id), &indexed_folders), f.clone()))
        .collect();

    // Phase 1: walk the tree, building the folder set and collecting
    // Markdown files for the second phase.
    let mut folders: Vec<Folder> = Vec::new();
    let mut folder_ids_by_rel: HashMap<PathBuf, String> = HashMap::new();
    let mut markdown_files: Vec<(PathBuf, PathBuf)> = Vec::new(); // (absolute file, relative dir)

    let mut queue: VecDeque<(PathBuf, PathBuf, Option<String>)> = VecDeque::new();
    queue.push_back((root.clone(), PathBuf::new(), None));

    while let Some((dir, rel, parent_id)) = queue.pop_front() {
        let mut read_dir = fs::read_dir(&dir).await.map_err(Error::Io)?;
        while let Some(entry) = read_dir.next_entry().await.map_err(Error::Io)? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(Error::Io)?;
            if file_type.is_dir() {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    warn!("Skipping directory with non-unicode name: {}", path.display());
                    continue;
                };
                if name == INTERNAL_DIR_NAME {
                    continue;
                }
                let child_rel = rel.join(&name);
                let folder = match known_folders.remove(&child_rel) {
                    // Known folder: keep its identity, including its stored
                    // parent reference (the path match proves the stored
                    // chain is consistent with the directory layout).
                    Some(existing) => existing,
                    None => {
                        debug!("Discovered new folder: {}", child_rel.display());
                        Folder {
                            id: mint_id(FOLDER_ID_PREFIX),
                            name,
                            created_at: Some(now_millis()),
                            parent_id: parent_id.clone(),
                        }
                    }
                };
                folder_ids_by_rel.insert(child_rel.clone(), folder.id.clone());
                queue.push_back((path, child_rel, Some(folder.id.clone())));
                folders.push(folder);
            } else if file_type.is_file()
                && path.extension().and_then(OsStr::to_str) == Some(MARKDOWN_EXTENSION)
            {
                markdown_files.push((path, rel.clone()));
            }
        }
    }

    // Phase 2: decode every Markdown file against the complete folder map.
    let mut scanned: Vec<(PathBuf, Document)> = Vec::new();
    let mut slot_by_id: HashMap<String, usize> = HashMap::new();

    for (mut file_path, rel_dir) in markdown_files {
        let raw = match fs::read_to_string(&file_path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping unreadable document file '{}': {}", file_path.display(), e);
                continue;
            }
        };
        let stem = file_path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("Untitled")
            .to_string();
        let folder_id = folder_ids_by_rel.get(&rel_dir).cloned();

        let decoded = codec::decode(&raw, &stem, folder_id);
        let mut document = decoded.document;
        let mut needs_rewrite = decoded.minted_id;

        // Reconcile the file location with the canonical path derived from
        // the document name. Without this, a later save through the normal
        // path would fork the document into a second file.
        let canonical_stem = paths::sanitize_name(&document.name);
        if stem != canonical_stem {
            let canonical_path =
                file_path.with_file_name(format!("{}.{}", canonical_stem, MARKDOWN_EXTENSION));
            if fs::try_exists(&canonical_path).await.unwrap_or(true) {
                // Canonical spot is taken; the filename wins over the
                // frontmatter name.
                document.name = stem.clone();
                needs_rewrite = true;
            } else {
                match fs::rename(&file_path, &canonical_path).await {
                    Ok(()) => {
                        debug!(
                            "Normalized document file {} -> {}",
                            file_path.display(),
                            canonical_path.display()
                        );
                        file_path = canonical_path;
                    }
                    Err(e) => {
                        warn!(
                            "Failed to normalize document file '{}': {}",
                            file_path.display(),
                            e
                        );
                        document.name = stem.clone();
                        needs_rewrite = true;
                    }
                }
            }
        }

        if let Some(&slot) = slot_by_id.get(&document.id) {
            let existing = &scanned[slot].1;
            if existing.name != document.name || existing.folder_id != document.folder_id {
                // Two distinct logical documents sharing one id, e.g. a
                // hand-copied file. The later occurrence forfeits the id.
                let fresh = mint_id(DOCUMENT_ID_PREFIX);
                warn!(
                    "Duplicate document id '{}' at '{}'; reassigning to '{}'",
                    document.id,
                    file_path.display(),
                    fresh
                );
                document.id = fresh;
                needs_rewrite = true;
            } else {
                // Same logical document encountered twice; the later
                // occurrence wins.
                scanned[slot].1 = document;
                continue;
            }
        }

        if needs_rewrite {
            persist_assigned_id(&file_path, &document).await;
        }
        slot_by_id.insert(document.id.clone(), scanned.len());
        scanned.push((file_path, document));
    }

    // Final sweep: the incremental check can miss orderings where a collision
    // is introduced later in the walk. Guarantee id uniqueness before the
    // result is handed to callers.
    let mut seen: HashSet<String> = HashSet::new();
    for (file_path, document) in scanned.iter_mut() {
        if !seen.insert(document.id.clone()) {
            let fresh = mint_id(DOCUMENT_ID_PREFIX);
            warn!(
                "Residual duplicate document id '{}' at '{}'; reassigning to '{}'",
                document.id,
                file_path.display(),
                fresh
            );
            document.id = fresh.clone();
            seen.insert(fresh);
            persist_assigned_id(file_path, document).await;
        }
    }

    let documents: Vec<Document> = scanned.into_iter().map(|(_, doc)| doc).collect();

    // Self-healing side effect: the reconciled view is written back
    // unconditionally.
    index::write_index(&vault.documents_index_path(), &documents).await?;
    index::write_index(&vault.folders_index_path(), &folders).await?;

    debug!("Scan found {} documents, {} folders", documents.len(), folders.len());
    Ok(VaultSnapshot { documents, folders })
}

/// Rewrites a document file so a freshly assigned id stays stable across
/// scans. Failure to persist is logged and tolerated; the scan result itself
/// is unaffected.
async fn persist_assigned_id(path: &Path, document: &Document) {
    match codec::encode(document) {
        Ok(encoded) => {
            if let Err(e) = fs::write(path, encoded).await {
                warn!("Failed to persist assigned id to '{}': {}", path.display(), e);
            }
        }
        Err(e) => warn!("Failed to encode document for '{}': {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn scratch_vault() -> (tempfile::TempDir, Vault) {
        let dir = tempdir().unwrap();
        let vault = Vault::create(dir.path().join("vault")).await.unwrap();
        (dir, vault)
    }

    #[tokio::test]
    async fn scan_of_empty_vault_is_empty() {
        let (_dir, vault) = scratch_vault().await;
        let snapshot = scan(&vault).await.unwrap();
        assert!(snapshot.documents.is_empty());
        assert!(snapshot.folders.is_empty());
    }

    #[tokio::test]
    async fn scan_adopts_hand_written_files_and_directories() {
        let (_dir, vault) = scratch_vault().await;
        fs::create_dir_all(vault.path().join("Projects/Active")).await.unwrap();
        fs::write(
            vault.path().join("Projects/Active/plan.md"),
            "# Plan\n\nJust a hand-written note.\n",
        )
        .await
        .unwrap();

        let snapshot = scan(&vault).await.unwrap();
        assert_eq!(snapshot.folders.len(), 2);
        assert_eq!(snapshot.documents.len(), 1);

        let doc = &snapshot.documents[0];
        assert_eq!(doc.name, "plan");
        assert!(doc.id.starts_with("doc-"));
        let active = snapshot.folders.iter().find(|f| f.name == "Active").unwrap();
        assert_eq!(doc.folder_id.as_deref(), Some(active.id.as_str()));

        // The minted id was written back into the file.
        let raw = fs::read_to_string(vault.path().join("Projects/Active/plan.md"))
            .await
            .unwrap();
        assert!(raw.contains(&format!("id: {}", doc.id)));
    }

    #[tokio::test]
    async fn scan_keeps_ids_stable_across_runs() {
        let (_dir, vault) = scratch_vault().await;
        fs::write(vault.path().join("note.md"), "body\n").await.unwrap();
        fs::create_dir(vault.path().join("Stuff")).await.unwrap();

        let first = scan(&vault).await.unwrap();
        let second = scan(&vault).await.unwrap();
        assert_eq!(first.documents[0].id, second.documents[0].id);
        assert_eq!(first.folders[0].id, second.folders[0].id);
        assert_eq!(first.folders[0].created_at, second.folders[0].created_at);
    }

    #[tokio::test]
    async fn scan_resolves_duplicate_ids() {
        let (_dir, vault) = scratch_vault().await;
        let frontmatter = "---\nid: doc-1\nname: {}\n---\n\nbody\n";
        fs::write(
            vault.path().join("first.md"),
            frontmatter.replace("{}", "First"),
        )
        .await
        .unwrap();
        fs::write(
            vault.path().join("second.md"),
            frontmatter.replace("{}", "Second"),
        )
        .await
        .unwrap();

        let snapshot = scan(&vault).await.unwrap();
        assert_eq!(snapshot.documents.len(), 2);

        let ids: HashSet<&str> = snapshot.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids.len(), 2, "ids must be unique after a scan");
        assert!(
            snapshot.documents.iter().filter(|d| d.id == "doc-1").count() == 1,
            "exactly one document keeps the original id"
        );

        // Stable on the next scan: the reassigned id was persisted.
        let again = scan(&vault).await.unwrap();
        let ids_again: HashSet<String> = again.documents.iter().map(|d| d.id.clone()).collect();
        assert_eq!(ids_again, ids.iter().map(|s| s.to_string()).collect());
    }

    #[tokio::test]
    async fn scan_normalizes_file_location_to_document_name() {
        let (_dir, vault) = scratch_vault().await;
        fs::write(
            vault.path().join("scratch-file.md"),
            "---\nid: doc-neat\nname: Proper Name\n---\n\nbody\n",
        )
        .await
        .unwrap();

        let snapshot = scan(&vault).await.unwrap();
        assert_eq!(snapshot.documents[0].name, "Proper Name");
        assert!(vault.path().join("Proper Name.md").exists());
        assert!(!vault.path().join("scratch-file.md").exists());

        let again = scan(&vault).await.unwrap();
        assert_eq!(again.documents[0].id, "doc-neat");
        assert_eq!(again.documents[0].name, "Proper Name");
    }

    #[tokio::test]
    async fn scan_keeps_filename_when_canonical_spot_is_taken() {
        let (_dir, vault) = scratch_vault().await;
        fs::write(
            vault.path().join("Proper Name.md"),
            "---\nid: doc-original\nname: Proper Name\n---\n\nfirst\n",
        )
        .await
        .unwrap();
        fs::write(
            vault.path().join("copy.md"),
            "---\nid: doc-copy\nname: Proper Name\n---\n\nsecond\n",
        )
        .await
        .unwrap();

        let snapshot = scan(&vault).await.unwrap();
        let copy = snapshot.documents.iter().find(|d| d.id == "doc-copy").unwrap();
        assert_eq!(copy.name, "copy");
        assert!(vault.path().join("copy.md").exists());
    }

    #[tokio::test]
    async fn scan_prunes_index_entries_without_backing_files() {
        let (_dir, vault) = scratch_vault().await;
        let ghost = Document::new("Ghost", None);
        index::write_index(&vault.documents_index_path(), &[ghost]).await.unwrap();

        let snapshot = scan(&vault).await.unwrap();
        assert!(snapshot.documents.is_empty());
        let reread: Vec<Document> = index::read_index(&vault.documents_index_path()).await;
        assert!(reread.is_empty());
    }

    #[tokio::test]
    async fn scan_skips_corrupt_files_without_aborting() {
        let (_dir, vault) = scratch_vault().await;
        fs::write(vault.path().join("good.md"), "---\nid: doc-good\nname: Good\n---\n\nok\n")
            .await
            .unwrap();
        // Invalid UTF-8 cannot be read to a string; the scan must continue.
        fs::write(vault.path().join("bad.md"), [0xff, 0xfe, 0x00, 0x01]).await.unwrap();

        let snapshot = scan(&vault).await.unwrap();
        assert_eq!(snapshot.documents.len(), 1);
        assert_eq!(snapshot.documents[0].id, "doc-good");
    }
}
