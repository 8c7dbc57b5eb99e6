use regex::Regex;
use tracing::{debug, instrument};

use crate::vault::types::{Document, now_millis};
use crate::vault::vault::Vault;
use crate::vault::{Error, Result};

/// Builds the matcher for id-based link tokens: `[[id:<id>]]` or
/// `[[id:<id>|Displayed Alias]]`.
fn id_link_pattern(id: &str) -> Regex {
    Regex::new(&format!(r"\[\[id:{}(\|[^\]]*)?\]\]", regex::escape(id)))
        .expect("id link pattern is always valid")
}

impl Vault {
    /// Rewrites `[[old_name]]` link tokens to `[[new_name]]` across all
    /// documents, persisting every modified document.
    ///
    /// Returns the number of documents updated. Only the unaliased,
    /// name-based form is rewritten; id-based links (`[[id:...]]`) are
    /// stable across renames and need no rewriting.
    #[instrument(skip(self))]
    pub async fn update_links(&self, old_name: &str, new_name: &str) -> Result<usize> {
        let documents = self.load_documents().await?;
        let needle = format!("[[{}]]", old_name);
        let replacement = format!("[[{}]]", new_name);

        let mut updated = 0;
        for mut document in documents {
            if document.content.contains(&needle) {
                document.content = document.content.replace(&needle, &replacement);
                document.updated_at = Some(now_millis());
                self.save_document(document).await?;
                updated += 1;
            }
        }
        debug!("Rewrote links in {} documents", updated);
        Ok(updated)
    }

    /// Finds all documents that link to the given document.
    ///
    /// Id-based tokens are matched first; the legacy name-based form
    /// (`[[Name]]`, literal match against the target's current name) is kept
    /// for vaults written before id links existed.
    pub async fn backlinks(&self, id: &str) -> Result<Vec<Document>> {
        let documents = self.load_documents().await?;
        let target = documents
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| Error::DocumentNotFound(id.to_string()))?;

        let name_token = format!("[[{}]]", target.name);
        let id_pattern = id_link_pattern(id);

        Ok(documents
            .iter()
            .filter(|d| {
                d.id != id
                    && (id_pattern.is_match(&d.content) || d.content.contains(&name_token))
            })
            .cloned()
            .collect())
    }
}
