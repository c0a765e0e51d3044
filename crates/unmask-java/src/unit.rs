//! Source units: discovery, merged-blob splitting, and output assembly.
//!
//! Input comes in two shapes, both produced by the upstream decompiler:
//! individual `.java` files under a directory tree, or merged `.txt` blobs
//! holding many units demarcated by boundary markers:
//!
//! ```text
//! ==================
//! // FILE_PATH: com/a/b.java
//! ==================
//! <unit text>
//! ```
//!
//! Output mirrors the input shape exactly; only identifier spans and blob
//! marker paths change. All text I/O is UTF-8; anything else is an
//! encoding error for that unit alone.

use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use walkdir::WalkDir;

use unmask_core::patch::FileId;
use unmask_core::report::{Diagnostic, DiagnosticKind};

// ============================================================================
// Errors
// ============================================================================

/// Whole-input errors from unit discovery or output writing.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The input root is missing or unreadable.
    #[error("input root not readable: {path}")]
    InputRoot { path: String },

    /// Failed to write an output file.
    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Units
// ============================================================================

/// Where a unit came from, for output assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOrigin {
    /// A standalone `.java` file at this workspace-relative path.
    JavaFile { rel_path: String },
    /// The `index`-th segment of a merged blob. `delimiter` is the verbatim
    /// marker text preceding the segment.
    MergedSegment {
        blob: String,
        index: usize,
        delimiter: String,
    },
}

/// One compilation unit.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub id: FileId,
    /// Workspace-relative `.java` path of the unit (from the tree or the
    /// blob marker). This is the unit's identity in diagnostics and keys.
    pub path: String,
    pub content: String,
    pub origin: UnitOrigin,
}

/// A merged blob's frame, kept for reassembly.
#[derive(Debug, Clone)]
pub struct BlobFrame {
    pub rel_path: String,
    /// Text before the first marker (usually empty).
    pub prefix: String,
    pub segment_count: usize,
}

/// The discovered input set.
#[derive(Debug, Default)]
pub struct UnitSet {
    pub units: Vec<SourceUnit>,
    pub blobs: Vec<BlobFrame>,
    pub diagnostics: Vec<Diagnostic>,
}

static BLOB_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=+\n// FILE_PATH: (.+?)\n=+\n?").expect("blob marker regex"));

/// Discover all units under `root`.
///
/// `.java` files become single units; `.txt` files are split on blob
/// markers. Files that are not valid UTF-8 are skipped with an encoding
/// diagnostic. Discovery order is sorted by path so unit ids are stable
/// across runs.
pub fn discover_units(root: &Path) -> Result<UnitSet, UnitError> {
    if !root.is_dir() {
        return Err(UnitError::InputRoot {
            path: root.display().to_string(),
        });
    }

    let mut set = UnitSet::default();
    let mut next_id = 0u32;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let is_java = name.ends_with(".java");
        let is_blob = name.ends_with(".txt");
        if !is_java && !is_blob {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");

        let bytes = match fs::read(entry.path()) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(path = %rel_path, error = %e, "skipping unreadable file");
                continue;
            }
        };
        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => {
                set.diagnostics.push(Diagnostic::unit(
                    DiagnosticKind::EncodingError,
                    rel_path.clone(),
                    "payload is not valid UTF-8",
                ));
                continue;
            }
        };

        if is_java {
            set.units.push(SourceUnit {
                id: FileId::new(next_id),
                path: rel_path.clone(),
                content,
                origin: UnitOrigin::JavaFile { rel_path },
            });
            next_id += 1;
        } else {
            let (prefix, segments) = split_merged(&content);
            let blob_index = set.blobs.len();
            set.blobs.push(BlobFrame {
                rel_path: rel_path.clone(),
                prefix,
                segment_count: segments.len(),
            });
            for (index, segment) in segments.into_iter().enumerate() {
                set.units.push(SourceUnit {
                    id: FileId::new(next_id),
                    path: segment.unit_path,
                    content: segment.code,
                    origin: UnitOrigin::MergedSegment {
                        blob: set.blobs[blob_index].rel_path.clone(),
                        index,
                        delimiter: segment.delimiter,
                    },
                });
                next_id += 1;
            }
        }
    }

    Ok(set)
}

/// One segment of a merged blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSegment {
    pub delimiter: String,
    pub unit_path: String,
    pub code: String,
}

/// Split a merged blob on its boundary markers.
///
/// Returns the text before the first marker and the segments in order.
pub fn split_merged(content: &str) -> (String, Vec<MergedSegment>) {
    let mut segments = Vec::new();
    let mut matches: Vec<(usize, usize, String)> = Vec::new();

    for caps in BLOB_MARKER.captures_iter(content) {
        let whole = caps.get(0).expect("match");
        let path = caps[1].trim().to_string();
        matches.push((whole.start(), whole.end(), path));
    }

    if matches.is_empty() {
        return (content.to_string(), segments);
    }

    let prefix = content[..matches[0].0].to_string();
    for (i, (start, end, path)) in matches.iter().enumerate() {
        let code_end = matches.get(i + 1).map(|m| m.0).unwrap_or(content.len());
        let mut unit_path = path.clone();
        if let Some(stripped) = unit_path.strip_prefix("./") {
            unit_path = stripped.to_string();
        }
        segments.push(MergedSegment {
            delimiter: content[*start..*end].to_string(),
            unit_path,
            code: content[*end..code_end].to_string(),
        });
    }

    (prefix, segments)
}

// ============================================================================
// Output Assembly
// ============================================================================

/// The rewritten text for one unit, plus its optional new marker path
/// (when the unit's class was renamed into a different package).
#[derive(Debug, Clone)]
pub struct RewrittenUnit {
    pub id: FileId,
    pub text: String,
    pub new_path: Option<String>,
}

/// Write all outputs under `out_root`, mirroring the input shape.
///
/// Plain units keep their relative paths (directory reorganization is not
/// this tool's job); merged blobs are reassembled with updated marker
/// paths. Units missing from `results` are emitted verbatim.
pub fn write_outputs(
    out_root: &Path,
    set: &UnitSet,
    results: &[RewrittenUnit],
) -> Result<(), UnitError> {
    let by_id: BTreeMap<FileId, &RewrittenUnit> = results.iter().map(|r| (r.id, r)).collect();

    // Plain java files.
    for unit in &set.units {
        if let UnitOrigin::JavaFile { rel_path } = &unit.origin {
            let text = by_id
                .get(&unit.id)
                .map(|r| r.text.as_str())
                .unwrap_or(unit.content.as_str());
            write_file(&out_root.join(rel_path), text)?;
        }
    }

    // Merged blobs, in frame order.
    for frame in &set.blobs {
        let mut parts: Vec<(usize, String)> = Vec::new();
        for unit in &set.units {
            let UnitOrigin::MergedSegment {
                blob,
                index,
                delimiter,
            } = &unit.origin
            else {
                continue;
            };
            if blob != &frame.rel_path {
                continue;
            }
            let (text, new_path) = match by_id.get(&unit.id) {
                Some(r) => (r.text.as_str(), r.new_path.as_deref()),
                None => (unit.content.as_str(), None),
            };
            let marker = match new_path {
                Some(p) => delimiter.replace(unit.path.as_str(), p),
                None => delimiter.clone(),
            };
            parts.push((*index, format!("{marker}{text}")));
        }
        parts.sort_by_key(|(i, _)| *i);

        let mut blob_text = frame.prefix.clone();
        for (_, part) in parts {
            blob_text.push_str(&part);
        }
        write_file(&out_root.join(&frame.rel_path), &blob_text)?;
    }

    Ok(())
}

fn write_file(path: &PathBuf, text: &str) -> Result<(), UnitError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| UnitError::Write {
            path: path.display().to_string(),
            source: e,
        })?;
    }
    fs::write(path, text).map_err(|e| UnitError::Write {
        path: path.display().to_string(),
        source: e,
    })
}

/// Derive the obfuscated FQCN a unit path implies
/// (`com/a/b.java` -> `com.a.b`).
pub fn fqcn_from_path(path: &str) -> String {
    path.trim_start_matches("./")
        .trim_end_matches(".java")
        .replace('/', ".")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const BLOB: &str = "\
==================
// FILE_PATH: com/a/b.java
==================
package com.a;
class b { }
==================
// FILE_PATH: com/a/c.java
==================
package com.a;
class c { }
";

    #[test]
    fn split_merged_extracts_paths_and_code() {
        let (prefix, segments) = split_merged(BLOB);
        assert!(prefix.is_empty());
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].unit_path, "com/a/b.java");
        assert!(segments[0].code.contains("class b"));
        assert_eq!(segments[1].unit_path, "com/a/c.java");
        assert!(segments[1].code.contains("class c"));
    }

    #[test]
    fn split_without_markers_is_all_prefix() {
        let (prefix, segments) = split_merged("class x { }\n");
        assert_eq!(prefix, "class x { }\n");
        assert!(segments.is_empty());
    }

    #[test]
    fn split_round_trips_byte_identical() {
        let (prefix, segments) = split_merged(BLOB);
        let mut rebuilt = prefix;
        for seg in &segments {
            rebuilt.push_str(&seg.delimiter);
            rebuilt.push_str(&seg.code);
        }
        assert_eq!(rebuilt, BLOB);
    }

    #[test]
    fn fqcn_from_path_strips_extension() {
        assert_eq!(fqcn_from_path("com/a/b.java"), "com.a.b");
        assert_eq!(fqcn_from_path("./game/e.java"), "game.e");
    }

    #[test]
    fn discover_reads_java_and_blob_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("com/a")).unwrap();
        fs::write(dir.path().join("com/a/x.java"), "class x { }").unwrap();
        fs::write(dir.path().join("merged.txt"), BLOB).unwrap();

        let set = discover_units(dir.path()).unwrap();
        assert_eq!(set.units.len(), 3);
        assert_eq!(set.blobs.len(), 1);
        assert!(set.diagnostics.is_empty());

        // Stable ids follow sorted discovery order.
        let paths: Vec<&str> = set.units.iter().map(|u| u.path.as_str()).collect();
        assert!(paths.contains(&"com/a/x.java"));
        assert!(paths.contains(&"com/a/b.java"));
    }

    #[test]
    fn discover_flags_non_utf8_as_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.java"), [0xff, 0xfe, b'x']).unwrap();

        let set = discover_units(dir.path()).unwrap();
        assert!(set.units.is_empty());
        assert_eq!(set.diagnostics.len(), 1);
        assert_eq!(set.diagnostics[0].kind, DiagnosticKind::EncodingError);
    }

    #[test]
    fn write_outputs_reassembles_blob_with_renamed_marker() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("merged.txt"), BLOB).unwrap();

        let set = discover_units(dir.path()).unwrap();
        let results: Vec<RewrittenUnit> = set
            .units
            .iter()
            .map(|u| RewrittenUnit {
                id: u.id,
                text: u.content.replace("class b", "class GameUnit"),
                new_path: if u.path == "com/a/b.java" {
                    Some("com/example/GameUnit.java".to_string())
                } else {
                    None
                },
            })
            .collect();

        write_outputs(out.path(), &set, &results).unwrap();
        let written = fs::read_to_string(out.path().join("merged.txt")).unwrap();
        assert!(written.contains("// FILE_PATH: com/example/GameUnit.java"));
        assert!(written.contains("class GameUnit"));
        assert!(written.contains("// FILE_PATH: com/a/c.java"));
    }
}
