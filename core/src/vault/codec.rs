use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::vault::Result;
use crate::vault::types::{
    Annotation, ContextDocumentRef, DOCUMENT_ID_PREFIX, Document, Version, mint_id,
    permissive_date,
};
use chrono::{DateTime, Utc};

/// The YAML frontmatter schema of a document file.
///
/// Every field is optional so that hand-edited files decode as far as they
/// can; coercion to the in-memory [`Document`] happens in one place,
/// immediately after parsing.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Frontmatter {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(with = "permissive_date")]
    created_at: Option<DateTime<Utc>>,
    #[serde(with = "permissive_date")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    versions: Option<Vec<Version>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    annotations: Option<Vec<Annotation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_documents: Option<Vec<ContextDocumentRef>>,
}

/// The result of decoding a document file.
#[derive(Debug)]
pub struct Decoded {
    pub document: Document,
    /// True when the file carried no usable id and a fresh one was minted.
    /// The caller is expected to persist the minted id so it stays stable
    /// across scans.
    pub minted_id: bool,
}

/// Serializes a document to its on-disk form: a YAML frontmatter block
/// followed by a blank line and the raw Markdown body.
///
/// Version bodies are not part of the frontmatter; only version metadata
/// survives encoding.
pub fn encode(document: &Document) -> Result<String> {
    let frontmatter = Frontmatter {
        id: Some(document.id.clone()),
        name: Some(document.name.clone()),
        created_at: document.created_at,
        updated_at: document.updated_at,
        versions: document.versions.clone(),
        annotations: document.annotations.clone(),
        context_documents: document.context_documents.clone(),
    };
    let yaml = serde_yaml::to_string(&frontmatter)?;
    Ok(format!("---\n{}---\n\n{}", yaml, document.content))
}

/// Parses a document file's raw content.
///
/// `fallback_name` (normally the file stem) is used when the frontmatter
/// carries no name. Malformed YAML does not abort the decode: the metadata
/// falls back to empty and the text after the frontmatter block is kept as
/// the body.
pub fn decode(raw: &str, fallback_name: &str, folder_id: Option<String>) -> Decoded {
    let (frontmatter, body) = match split_frontmatter(raw) {
        Some((yaml, body)) => match serde_yaml::from_str::<Frontmatter>(yaml) {
            Ok(parsed) => (parsed, body),
            Err(e) => {
                warn!("Malformed frontmatter, falling back to empty metadata: {}", e);
                (Frontmatter::default(), body)
            }
        },
        None => (Frontmatter::default(), raw),
    };

    let id = frontmatter.id.filter(|id| !id.is_empty());
    let minted_id = id.is_none();
    let document = Document {
        id: id.unwrap_or_else(|| mint_id(DOCUMENT_ID_PREFIX)),
        name: frontmatter
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| fallback_name.to_string()),
        content: body.to_string(),
        created_at: frontmatter.created_at,
        updated_at: frontmatter.updated_at,
        versions: frontmatter.versions,
        folder_id,
        annotations: frontmatter.annotations,
        context_documents: frontmatter.context_documents,
    };
    Decoded { document, minted_id }
}

/// Splits raw file content into its YAML frontmatter and body.
///
/// Returns `None` when the content does not open with a `---` line. The
/// closing delimiter may be `---` or `...`. At most one blank separator line
/// after the closing delimiter is consumed (the encoder writes exactly one).
pub(crate) fn split_frontmatter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let after_open = rest.strip_prefix("---")?;
    let after_open = after_open
        .strip_prefix("\r\n")
        .or_else(|| after_open.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            let body = body.strip_prefix('\n').unwrap_or(body);
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}
