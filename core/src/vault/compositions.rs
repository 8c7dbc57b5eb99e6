use serde::Serialize;
use tracing::{debug, instrument};

use crate::vault::types::Composition;
use crate::vault::vault::Vault;
use crate::vault::{Result, codec, index};

impl Vault {
    /// Loads the compositions array. A missing or unparsable file yields an
    /// empty list, mirroring the index store semantics.
    pub async fn load_compositions(&self) -> Vec<Composition> {
        index::read_index(&self.compositions_path()).await
    }

    /// Writes the full compositions array.
    #[instrument(skip(self, compositions))]
    pub async fn save_compositions(&self, compositions: &[Composition]) -> Result<()> {
        index::write_index(&self.compositions_path(), compositions).await?;
        debug!("Saved {} compositions", compositions.len());
        Ok(())
    }
}

/// Frontmatter block embedded inside a composition's `content` field.
#[derive(Serialize)]
struct CompositionFrontmatter<'a> {
    id: &'a str,
    title: &'a str,
}

/// Ensures a composition's `content` carries a valid embedded frontmatter
/// block (`id`, `title`). Returns true when the content was repaired.
///
/// - Content without a frontmatter block gets one synthesized and prepended;
///   an empty body additionally gains a default `# <title>` header.
/// - A block that fails to parse as a YAML mapping is replaced with a
///   freshly synthesized one; the body is preserved.
pub(crate) fn ensure_composition_frontmatter(composition: &mut Composition) -> bool {
    match codec::split_frontmatter(&composition.content) {
        Some((yaml, body)) => {
            let parsed = serde_yaml::from_str::<serde_yaml::Value>(yaml);
            if matches!(parsed, Ok(serde_yaml::Value::Mapping(_))) {
                return false;
            }
            composition.content = synthesize_content(composition, body);
            true
        }
        None => {
            let body = composition.content.clone();
            composition.content = synthesize_content(composition, &body);
            true
        }
    }
}

fn synthesize_content(composition: &Composition, body: &str) -> String {
    let frontmatter = CompositionFrontmatter {
        id: &composition.id,
        title: &composition.name,
    };
    // Serialization of two string fields cannot fail.
    let yaml = serde_yaml::to_string(&frontmatter).unwrap_or_default();
    if body.trim().is_empty() {
        format!("---\n{}---\n\n# {}", yaml, composition.name)
    } else {
        format!("---\n{}---\n\n{}", yaml, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::types::{COMPOSITION_ID_PREFIX, mint_id, now_millis};
    use tempfile::tempdir;

    fn composition(name: &str, content: &str) -> Composition {
        Composition {
            id: mint_id(COMPOSITION_ID_PREFIX),
            name: name.to_string(),
            content: content.to_string(),
            context_documents: None,
            created_at: Some(now_millis()),
            updated_at: Some(now_millis()),
        }
    }

    #[test]
    fn plain_text_gets_frontmatter_without_extra_header() {
        let mut comp = composition("Field Notes", "plain text, no frontmatter");
        assert!(ensure_composition_frontmatter(&mut comp));
        assert!(comp
            .content
            .starts_with(&format!("---\nid: {}\ntitle: Field Notes\n---", comp.id)));
        assert!(comp.content.ends_with("plain text, no frontmatter"));
        assert!(!comp.content.contains("# Field Notes"));
    }

    #[test]
    fn empty_content_gets_default_header() {
        let mut comp = composition("Title", "");
        assert!(ensure_composition_frontmatter(&mut comp));
        assert!(comp.content.contains("# Title"));
    }

    #[test]
    fn broken_frontmatter_is_replaced_but_body_survives() {
        let mut comp = composition("Patched", "---\nid: [broken\n---\n\nthe body stays");
        assert!(ensure_composition_frontmatter(&mut comp));
        assert!(comp.content.contains("title: Patched"));
        assert!(comp.content.ends_with("the body stays"));
    }

    #[test]
    fn valid_frontmatter_is_untouched() {
        let original = "---\nid: comp-1\ntitle: Fine\n---\n\nAll good.";
        let mut comp = composition("Fine", original);
        assert!(!ensure_composition_frontmatter(&mut comp));
        assert_eq!(comp.content, original);
    }

    #[test]
    fn repair_is_idempotent() {
        let mut comp = composition("Twice", "no frontmatter here");
        assert!(ensure_composition_frontmatter(&mut comp));
        let once = comp.content.clone();
        assert!(!ensure_composition_frontmatter(&mut comp));
        assert_eq!(comp.content, once);
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let vault = Vault::create(dir.path().join("vault")).await.unwrap();
        assert!(vault.load_compositions().await.is_empty());

        let comps = vec![composition("One", "---\nid: a\ntitle: One\n---\n\nx")];
        vault.save_compositions(&comps).await.unwrap();
        assert_eq!(vault.load_compositions().await, comps);
    }
}
