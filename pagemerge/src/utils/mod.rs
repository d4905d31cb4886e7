//! Small helpers shared across modules.

use lopdf::{Document, Object};

/// Copy every object reachable from `obj` out of `source` into `target`.
///
/// Objects keep their ids, so `source` must already be renumbered into a
/// range that does not collide with `target`. References to page tree nodes
/// (`/Type /Page` or `/Type /Pages`) are not followed: a copied page must not
/// drag its siblings or the source's page tree along through `/Parent`,
/// annotation `/P` entries or similar back-links.
pub fn copy_references(target: &mut Document, source: &Document, obj: &Object) {
    match obj {
        Object::Reference(ref_id) => {
            if target.objects.contains_key(ref_id) {
                return;
            }
            let Ok(referenced) = source.get_object(*ref_id) else {
                return;
            };
            if is_page_tree_node(referenced) {
                return;
            }
            target.objects.insert(*ref_id, referenced.clone());
            copy_references(target, source, referenced);
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                copy_references(target, source, value);
            }
        }
        Object::Array(arr) => {
            for item in arr {
                copy_references(target, source, item);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                copy_references(target, source, value);
            }
        }
        _ => {}
    }
}

/// Whether `obj` is a `/Page` or `/Pages` dictionary.
pub fn is_page_tree_node(obj: &Object) -> bool {
    obj.as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|ty| ty.as_name().ok())
        .is_some_and(|name| name == b"Page" || name == b"Pages")
}

/// Turn a user supplied output name into a safe file stem.
///
/// Keeps ASCII letters, digits, `-`, `_`, `.` and spaces, replaces anything
/// else with `_`, strips a trailing `.pdf` and surrounding dots or spaces.
/// Falls back to `merged` when nothing usable is left.
pub fn sanitize_file_stem(name: &str) -> String {
    let trimmed = name.trim();
    let without_ext = match trimmed.len().checked_sub(4) {
        Some(split) if trimmed.is_char_boundary(split) && trimmed[split..].eq_ignore_ascii_case(".pdf") => {
            &trimmed[..split]
        }
        _ => trimmed,
    };

    let cleaned: String = without_ext
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');
    if cleaned.is_empty() {
        "merged".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Format file size as human-readable string.
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{size} bytes")
    }
}
