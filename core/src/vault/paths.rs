use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::vault::MARKDOWN_EXTENSION;
use crate::vault::types::{Document, Folder};

/// Characters that are unsafe in at least one supported filesystem.
const UNSAFE_CHARS: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Replaces filesystem-unsafe characters in an entity name with `-`.
///
/// The sanitized form is only used for path segments; the original name is
/// preserved in the entity itself.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if UNSAFE_CHARS.contains(&c) { '-' } else { c })
        .collect()
}

/// Computes a folder's path relative to the vault root by walking its
/// `parent_id` chain.
///
/// A `parent_id` that does not resolve to a known folder, or a chain that
/// loops back on itself, terminates the walk and the remainder is treated as
/// root. Degrading to a shorter path keeps externally corrupted hierarchies
/// loadable; the integrity checker repairs the underlying references.
pub fn folder_rel_path(folder_id: Option<&str>, folders: &[Folder]) -> PathBuf {
    let mut segments = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut current = folder_id;
    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        match folders.iter().find(|f| f.id == id) {
            Some(folder) => {
                segments.push(sanitize_name(&folder.name));
                current = folder.parent_id.as_deref();
            }
            None => break,
        }
    }
    segments.iter().rev().collect()
}

/// The path of a document's Markdown file relative to the vault root.
pub fn document_rel_path(document: &Document, folders: &[Folder]) -> PathBuf {
    folder_rel_path(document.folder_id.as_deref(), folders).join(format!(
        "{}.{}",
        sanitize_name(&document.name),
        MARKDOWN_EXTENSION
    ))
}

/// The absolute path of a document's Markdown file.
pub fn document_abs_path(root: &Path, document: &Document, folders: &[Folder]) -> PathBuf {
    root.join(document_rel_path(document, folders))
}

/// The absolute path of a folder's directory.
pub fn folder_abs_path(root: &Path, folder_id: &str, folders: &[Folder]) -> PathBuf {
    root.join(folder_rel_path(Some(folder_id), folders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn folder(id: &str, name: &str, parent_id: Option<&str>) -> Folder {
        Folder {
            id: id.to_string(),
            name: name.to_string(),
            created_at: None,
            parent_id: parent_id.map(str::to_string),
        }
    }

    #[test]
    fn sanitize_replaces_every_unsafe_char() {
        assert_eq!(sanitize_name(r#"a/b\c?d%e*f:g|h"i<j>k"#), "a-b-c-d-e-f-g-h-i-j-k");
        assert_eq!(sanitize_name("plain name"), "plain name");
        assert_eq!(sanitize_name("ünïcode ☂"), "ünïcode ☂");
    }

    #[test]
    fn nested_folder_path() {
        let folders = vec![
            folder("f1", "Projects", None),
            folder("f2", "2025", Some("f1")),
            folder("f3", "Q3: Notes", Some("f2")),
        ];
        assert_eq!(
            folder_rel_path(Some("f3"), &folders),
            Path::new("Projects/2025/Q3- Notes")
        );
    }

    #[test]
    fn unresolved_parent_degrades_to_root() {
        let folders = vec![folder("f1", "Orphaned", Some("gone"))];
        assert_eq!(folder_rel_path(Some("f1"), &folders), Path::new("Orphaned"));
        // Entirely unknown folder id resolves to the root itself.
        assert_eq!(folder_rel_path(Some("nope"), &folders), Path::new(""));
    }

    #[test]
    fn parent_cycle_terminates() {
        let folders = vec![
            folder("a", "A", Some("b")),
            folder("b", "B", Some("a")),
            folder("c", "C", Some("c")),
        ];
        assert_eq!(folder_rel_path(Some("c"), &folders), Path::new("C"));
        assert_eq!(folder_rel_path(Some("a"), &folders), Path::new("B/A"));
    }

    #[test]
    fn document_path_includes_extension() {
        let folders = vec![folder("f1", "Inbox", None)];
        let doc = Document::new("What's next?", Some("f1".to_string()));
        assert_eq!(
            document_rel_path(&doc, &folders),
            Path::new("Inbox/What's next-.md")
        );
        let root_doc = Document::new("Loose note", None);
        assert_eq!(document_rel_path(&root_doc, &folders), Path::new("Loose note.md"));
    }
}
