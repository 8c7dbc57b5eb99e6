use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

pub const DOCUMENT_ID_PREFIX: &str = "doc";
pub const FOLDER_ID_PREFIX: &str = "folder";
pub const VERSION_ID_PREFIX: &str = "ver";
pub const ANNOTATION_ID_PREFIX: &str = "ann";
pub const COMPOSITION_ID_PREFIX: &str = "comp";

/// Mints a new entity id of the form `<prefix>-<epoch-ms>-<random>`.
pub fn mint_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    format!("{}-{}-{}", prefix, millis, suffix.to_lowercase())
}

/// The current time truncated to millisecond precision.
///
/// Persisted timestamps are formatted with millisecond precision, so anything
/// finer would not survive a round trip through the vault.
pub(crate) fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap_or_else(Utc::now)
}

/// Parses a timestamp string, accepting RFC 3339 plus a few common
/// hand-written forms. Returns `None` for anything unparsable.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|ts| ts.and_utc());
    }
    None
}

/// Serde adapter for timestamps that may be missing or unparsable on disk.
///
/// Serializes as an ISO-8601 string with millisecond precision (or null).
/// Deserializes any value, yielding `None` for anything that is not a
/// parsable timestamp string, so a corrupt date in one field never aborts
/// decoding the rest of the entity.
pub(crate) mod permissive_date {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(raw.and_then(|value| value.as_str().and_then(super::parse_timestamp)))
    }
}

/// A Markdown document stored in the vault.
///
/// The authoritative on-disk form is a Markdown file with YAML frontmatter;
/// the same struct is also cached verbatim in the documents index.
///
/// `created_at`/`updated_at` are `None` when the on-disk value was missing or
/// unparsable. The create path and the integrity checker guarantee `Some`;
/// anything decoded straight from a hand-edited file may still carry `None`
/// until the next integrity pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, with = "permissive_date")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "permissive_date")]
    pub updated_at: Option<DateTime<Utc>>,
    /// `None` means the frontmatter carried no `versions` list at all;
    /// the integrity checker defaults it to an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<Version>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    /// Same absent-versus-empty distinction as `versions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_documents: Option<Vec<ContextDocumentRef>>,
}

impl Document {
    /// Creates a new document with a freshly minted id and current timestamps.
    pub fn new(name: &str, folder_id: Option<String>) -> Self {
        let now = now_millis();
        Document {
            id: mint_id(DOCUMENT_ID_PREFIX),
            name: name.to_string(),
            content: String::new(),
            created_at: Some(now),
            updated_at: Some(now),
            versions: Some(Vec::new()),
            folder_id,
            annotations: Some(Vec::new()),
            context_documents: None,
        }
    }
}

/// A point-in-time snapshot of a document.
///
/// Only the snapshot metadata is persisted; the snapshot body is not durably
/// stored, so `content` is always empty after a round trip through the vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    #[serde(skip)]
    pub content: String,
    #[serde(default, with = "permissive_date")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A highlighted range of a document's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub id: String,
    /// Back-reference to the owning document. Must equal the owner's id;
    /// the integrity checker enforces this.
    #[serde(default)]
    pub document_id: String,
    #[serde(default)]
    pub start_offset: usize,
    #[serde(default)]
    pub end_offset: usize,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, with = "permissive_date")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "permissive_date")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A lightweight reference to another document, used by composition features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextDocumentRef {
    pub id: String,
    pub name: String,
}

/// A directory within the vault used to organize documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default, with = "permissive_date")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl Folder {
    /// Creates a new folder with a freshly minted id and current timestamp.
    pub fn new(name: &str, parent_id: Option<String>) -> Self {
        Folder {
            id: mint_id(FOLDER_ID_PREFIX),
            name: name.to_string(),
            created_at: Some(now_millis()),
            parent_id,
        }
    }
}

/// An AI-assisted composition.
///
/// Unlike documents, compositions are persisted as entries of a single JSON
/// array file, and each entry's `content` is expected to carry its own
/// embedded YAML frontmatter (`id`, `title`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_documents: Option<Vec<ContextDocumentRef>>,
    #[serde(default, with = "permissive_date")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "permissive_date")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_id_shape() {
        let id = mint_id(DOCUMENT_ID_PREFIX);
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "doc");
        assert!(parts[1].parse::<i64>().is_ok(), "epoch millis expected: {}", id);
        assert_eq!(parts[2].len(), 7);
    }

    #[test]
    fn mint_id_is_unique_enough() {
        let a = mint_id(FOLDER_ID_PREFIX);
        let b = mint_id(FOLDER_ID_PREFIX);
        assert_ne!(a, b);
    }

    #[test]
    fn parse_timestamp_accepts_common_forms() {
        assert!(parse_timestamp("2025-06-01T12:30:00.000Z").is_some());
        assert!(parse_timestamp("2025-06-01T12:30:00+02:00").is_some());
        assert!(parse_timestamp("2025-06-01 12:30:00").is_some());
        assert!(parse_timestamp("2025-06-01").is_some());
        assert!(parse_timestamp("not-a-date").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn permissive_date_survives_garbage() {
        #[derive(Debug, Deserialize)]
        struct Probe {
            #[serde(default, with = "permissive_date")]
            ts: Option<DateTime<Utc>>,
        }

        let ok: Probe = serde_yaml::from_str("ts: 2025-06-01T12:30:00.000Z").unwrap();
        assert!(ok.ts.is_some());

        let garbage: Probe = serde_yaml::from_str("ts: not-a-date").unwrap();
        assert!(garbage.ts.is_none());

        let number: Probe = serde_yaml::from_str("ts: 42").unwrap();
        assert!(number.ts.is_none());

        let null: Probe = serde_yaml::from_str("ts: null").unwrap();
        assert!(null.ts.is_none());
    }

    #[test]
    fn document_index_round_trip() {
        let mut doc = Document::new("Reading Notes", None);
        doc.content = "# Notes\n".to_string();
        let json = serde_json::to_string_pretty(&doc).unwrap();
        let back: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn version_content_is_not_persisted() {
        let version = Version {
            id: mint_id(VERSION_ID_PREFIX),
            content: "snapshot body".to_string(),
            created_at: Some(now_millis()),
            message: Some("before rewrite".to_string()),
        };
        let json = serde_json::to_string(&version).unwrap();
        assert!(!json.contains("snapshot body"));
        let back: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, "");
        assert_eq!(back.id, version.id);
    }
}
