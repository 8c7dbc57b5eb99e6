use std::collections::HashSet;

use serde::Serialize;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::vault::compositions::ensure_composition_frontmatter;
use crate::vault::scanner::{self, VaultSnapshot};
use crate::vault::types::{
    Composition, DOCUMENT_ID_PREFIX, Document, FOLDER_ID_PREFIX, Folder, mint_id, now_millis,
};
use crate::vault::vault::Vault;
use crate::vault::index;

/// Structured tally of an integrity pass.
///
/// Serialized to camelCase JSON because the report is returned verbatim
/// through the integrity endpoint and the CLI's `--json` output.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub documents_checked: usize,
    pub folders_checked: usize,
    pub compositions_checked: usize,
    pub duplicate_ids_fixed: usize,
    pub missing_metadata_fixed: usize,
    pub invalid_dates_fixed: usize,
    pub orphaned_documents_fixed: usize,
    pub orphaned_folders_fixed: usize,
    pub composition_frontmatter_fixed: usize,
    pub details: Vec<String>,
}

impl IntegrityReport {
    /// True when the pass found nothing to repair.
    pub fn is_clean(&self) -> bool {
        self.duplicate_ids_fixed == 0
            && self.missing_metadata_fixed == 0
            && self.invalid_dates_fixed == 0
            && self.orphaned_documents_fixed == 0
            && self.orphaned_folders_fixed == 0
            && self.composition_frontmatter_fixed == 0
    }
}

impl Vault {
    /// Scans the vault for corruption, repairs everything repairable in
    /// place, and reports a structured tally.
    ///
    /// Idempotent: a second pass over an already-repaired vault reports
    /// all-zero fix counts. This function never fails; problems that prevent
    /// checking at all are reported through `details` instead.
    #[instrument(skip(self), fields(root = %self.path().display()))]
    pub async fn check_and_fix(&self) -> IntegrityReport {
        let mut report = IntegrityReport::default();

        // Bootstrap the vault layout, then load a freshly reconciled view
        // through the scanner. Failures here leave nothing to check.
        if let Err(e) = self.ensure_layout().await {
            report.details.push(format!("⚠️ Failed to prepare vault layout: {}", e));
            return report;
        }
        let VaultSnapshot {
            mut documents,
            mut folders,
        } = match scanner::scan(self).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                report.details.push(format!("⚠️ Failed to load vault: {}", e));
                return report;
            }
        };

        report.documents_checked = documents.len();
        report.folders_checked = folders.len();

        // Duplicate-id repair over the already-reconciled view. The scanner
        // de-duplicates on its own; this is defense in depth.
        let mut changed_documents: HashSet<usize> = HashSet::new();
        fix_document_ids(&mut documents, &mut changed_documents, &mut report);
        fix_folder_ids(&mut folders, &mut report);

        // Persist the id-fixed collections in bulk before the field walk.
        if let Err(e) = index::write_index(&self.documents_index_path(), &documents).await {
            report.details.push(format!("⚠️ Failed to write documents index: {}", e));
        }
        if let Err(e) = index::write_index(&self.folders_index_path(), &folders).await {
            report.details.push(format!("⚠️ Failed to write folders index: {}", e));
        }

        // Field-by-field repair of dates, collections, and references.
        let folder_ids: HashSet<String> = folders.iter().map(|f| f.id.clone()).collect();
        for (i, document) in documents.iter_mut().enumerate() {
            if fix_document_fields(document, &folder_ids, &mut report) {
                changed_documents.insert(i);
            }
        }
        let folders_changed = fix_folder_fields(&mut folders, &folder_ids, &mut report);
        if folders_changed {
            if let Err(e) = index::write_index(&self.folders_index_path(), &folders).await {
                report.details.push(format!("⚠️ Failed to write folders index: {}", e));
            }
        }

        // Repaired documents go back through the normal save path so the
        // on-disk Markdown reflects the fix, not just the index. Saves run
        // sequentially; each one rewrites the shared index file.
        let mut to_save: Vec<usize> = changed_documents.into_iter().collect();
        to_save.sort_unstable();
        for i in to_save {
            let document = documents[i].clone();
            let name = document.name.clone();
            if let Err(e) = self.save_document(document).await {
                report
                    .details
                    .push(format!("Failed to save repaired document '{}': {}", name, e));
            }
        }

        self.check_compositions(&mut report).await;

        debug!(
            "Integrity pass complete: {} documents, {} folders, {} compositions checked",
            report.documents_checked, report.folders_checked, report.compositions_checked
        );
        report
    }

    /// Compositions are stored as a single JSON array whose entries embed
    /// their own frontmatter inside `content`; they need separate handling
    /// from the Markdown tree.
    async fn check_compositions(&self, report: &mut IntegrityReport) {
        let path = self.compositions_path();
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                report.details.push(format!("⚠️ Failed to read compositions file: {}", e));
                return;
            }
        };
        let mut compositions: Vec<Composition> = match serde_json::from_slice(&raw) {
            Ok(compositions) => compositions,
            Err(e) => {
                report.details.push(format!("⚠️ Failed to parse compositions file: {}", e));
                return;
            }
        };

        report.compositions_checked = compositions.len();
        let mut fixed_any = false;
        for composition in compositions.iter_mut() {
            if ensure_composition_frontmatter(composition) {
                report.composition_frontmatter_fixed += 1;
                report.details.push(format!(
                    "Repaired frontmatter of composition '{}'",
                    composition.name
                ));
                fixed_any = true;
            }
        }

        // Fix success and fix persistence are reported separately: a failed
        // write-back keeps the counts and adds a detail line.
        if fixed_any {
            if let Err(e) = self.save_compositions(&compositions).await {
                warn!("Failed to save compositions file: {}", e);
                report
                    .details
                    .push(format!("Failed to save compositions file: {}", e));
            }
        }
    }
}

fn fix_document_ids(
    documents: &mut [Document],
    changed: &mut HashSet<usize>,
    report: &mut IntegrityReport,
) {
    let mut seen: HashSet<String> = HashSet::new();
    for (i, document) in documents.iter_mut().enumerate() {
        if document.id.is_empty() {
            document.id = mint_id(DOCUMENT_ID_PREFIX);
            report.missing_metadata_fixed += 1;
            report
                .details
                .push(format!("Assigned missing id to document '{}'", document.name));
            changed.insert(i);
        }
        if !seen.insert(document.id.clone()) {
            let fresh = mint_id(DOCUMENT_ID_PREFIX);
            report.details.push(format!(
                "Fixed duplicate document id '{}' -> '{}'",
                document.id, fresh
            ));
            document.id = fresh.clone();
            seen.insert(fresh);
            report.duplicate_ids_fixed += 1;
            changed.insert(i);
        }
    }
}

fn fix_folder_ids(folders: &mut [Folder], report: &mut IntegrityReport) {
    let mut seen: HashSet<String> = HashSet::new();
    for folder in folders.iter_mut() {
        if folder.id.is_empty() {
            folder.id = mint_id(FOLDER_ID_PREFIX);
            report.missing_metadata_fixed += 1;
            report
                .details
                .push(format!("Assigned missing id to folder '{}'", folder.name));
        }
        if !seen.insert(folder.id.clone()) {
            let fresh = mint_id(FOLDER_ID_PREFIX);
            report.details.push(format!(
                "Fixed duplicate folder id '{}' -> '{}'",
                folder.id, fresh
            ));
            folder.id = fresh.clone();
            seen.insert(fresh);
            report.duplicate_ids_fixed += 1;
        }
    }
}

/// Repairs a single document's fields. Returns true when anything changed.
fn fix_document_fields(
    document: &mut Document,
    folder_ids: &HashSet<String>,
    report: &mut IntegrityReport,
) -> bool {
    let mut changed = false;
    let now = now_millis();

    if document.created_at.is_none() {
        document.created_at = Some(now);
        report.invalid_dates_fixed += 1;
        report.details.push(format!(
            "Fixed invalid createdAt on document '{}'",
            document.name
        ));
        changed = true;
    }
    if document.updated_at.is_none() {
        document.updated_at = Some(now);
        report.invalid_dates_fixed += 1;
        report.details.push(format!(
            "Fixed invalid updatedAt on document '{}'",
            document.name
        ));
        changed = true;
    }
    if document.versions.is_none() {
        document.versions = Some(Vec::new());
        report.missing_metadata_fixed += 1;
        report.details.push(format!(
            "Defaulted missing versions list on document '{}'",
            document.name
        ));
        changed = true;
    }
    if document.annotations.is_none() {
        document.annotations = Some(Vec::new());
        report.missing_metadata_fixed += 1;
        report.details.push(format!(
            "Defaulted missing annotations list on document '{}'",
            document.name
        ));
        changed = true;
    }

    if let Some(annotations) = document.annotations.as_mut() {
        for annotation in annotations.iter_mut() {
            if annotation.document_id != document.id {
                annotation.document_id = document.id.clone();
                report.missing_metadata_fixed += 1;
                report.details.push(format!(
                    "Re-pointed annotation '{}' at its owning document '{}'",
                    annotation.id, document.name
                ));
                changed = true;
            }
            if annotation.created_at.is_none() {
                annotation.created_at = Some(now);
                report.invalid_dates_fixed += 1;
                report.details.push(format!(
                    "Fixed invalid createdAt on annotation '{}'",
                    annotation.id
                ));
                changed = true;
            }
            if annotation.updated_at.is_none() {
                annotation.updated_at = Some(now);
                report.invalid_dates_fixed += 1;
                report.details.push(format!(
                    "Fixed invalid updatedAt on annotation '{}'",
                    annotation.id
                ));
                changed = true;
            }
        }
    }

    if let Some(folder_id) = &document.folder_id {
        if !folder_ids.contains(folder_id) {
            report.details.push(format!(
                "Cleared orphaned folder reference '{}' on document '{}'",
                folder_id, document.name
            ));
            document.folder_id = None;
            report.orphaned_documents_fixed += 1;
            changed = true;
        }
    }

    changed
}

/// Repairs folder dates and parent references, including breaking parent
/// cycles. Returns true when anything changed.
fn fix_folder_fields(
    folders: &mut Vec<Folder>,
    folder_ids: &HashSet<String>,
    report: &mut IntegrityReport,
) -> bool {
    let mut changed = false;
    let now = now_millis();

    for folder in folders.iter_mut() {
        if folder.created_at.is_none() {
            folder.created_at = Some(now);
            report.invalid_dates_fixed += 1;
            report
                .details
                .push(format!("Fixed invalid createdAt on folder '{}'", folder.name));
            changed = true;
        }
        if let Some(parent_id) = &folder.parent_id {
            if !folder_ids.contains(parent_id) {
                report.details.push(format!(
                    "Cleared orphaned parent reference '{}' on folder '{}'",
                    parent_id, folder.name
                ));
                folder.parent_id = None;
                report.orphaned_folders_fixed += 1;
                changed = true;
            }
        }
    }

    // Break parent cycles: walk each folder's ancestor chain; revisiting any
    // folder means the chain never reaches the root.
    for i in 0..folders.len() {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(folders[i].id.clone());
        let mut current = folders[i].parent_id.clone();
        let mut cyclic = false;
        while let Some(ancestor) = current {
            if !visited.insert(ancestor.clone()) {
                cyclic = true;
                break;
            }
            current = folders
                .iter()
                .find(|f| f.id == ancestor)
                .and_then(|f| f.parent_id.clone());
        }
        if cyclic {
            report.details.push(format!(
                "Broke folder parent cycle at '{}'",
                folders[i].name
            ));
            folders[i].parent_id = None;
            report.orphaned_folders_fixed += 1;
            changed = true;
        }
    }

    changed
}
