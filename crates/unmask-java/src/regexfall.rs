//! The regex fallback rewriter: a degraded implementation of the
//! [`Rewriter`] contract for units the parser cannot make enough sense of.
//!
//! Selected when a unit's parse error ratio exceeds the demotion
//! threshold (or forced by flag). String literals are shielded with
//! placeholders and member replacements run under guarded word-boundary
//! patterns, but the scope-correctness and literal-safety guarantees of
//! the syntax-aware engine explicitly do NOT hold here: this is a
//! best-effort salvage pass, and every unit that takes it is flagged
//! `degraded` in the run report.

use regex::{Captures, Regex};
use std::collections::HashMap;

use unmask_core::mapping::SymbolKey;

use crate::rewrite::{RewriteOutcome, RewriteRequest, Rewriter};

/// Parse error ratio above which a unit is demoted to this rewriter.
pub const DEMOTION_ERROR_RATIO: f64 = 0.10;

/// Words after which a bare short name is a declaration or type use, not
/// a member occurrence.
const PROTECTED_PREFIX_WORDS: &[&str] = &[
    "class",
    "interface",
    "enum",
    "extends",
    "implements",
    "new",
    "instanceof",
    "public",
    "private",
    "protected",
    "static",
    "final",
    "abstract",
    "void",
    "int",
    "long",
    "float",
    "double",
    "boolean",
    "byte",
    "char",
    "short",
];

/// The degraded rewriter.
pub struct RegexRewriter;

impl Rewriter for RegexRewriter {
    fn rewrite(&self, req: &RewriteRequest<'_>) -> RewriteOutcome {
        let mut text = req.unit.content.clone();
        let mut edits = 0usize;

        // Shield string literals so replacements cannot touch them.
        let (shielded, strings) = protect_strings(&text);
        text = shielded;

        // Fully-qualified type names, longest first so substrings of
        // longer names are never clobbered.
        let mut type_entries: Vec<(&str, &str)> = req
            .store
            .iter()
            .filter_map(|e| match &e.key {
                SymbolKey::Type { fqcn } if *fqcn != e.name => {
                    Some((fqcn.as_str(), e.name.as_str()))
                }
                _ => None,
            })
            .collect();
        type_entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));

        for (obf, orig) in &type_entries {
            if let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(obf))) {
                text = count_replace(&re, &text, orig, &mut edits);
            }
        }

        // Short class names in unambiguous declaration/use contexts.
        for (obf, orig) in &type_entries {
            let obf_short = obf.rsplit(['.', '$']).next().unwrap_or(obf);
            let orig_short = orig.rsplit(['.', '$']).next().unwrap_or(orig);
            if obf_short == orig_short || obf_short.len() > 3 {
                continue;
            }
            let pattern = format!(
                r"\b(class|interface|enum|extends|implements|new|instanceof)\s+{}\b",
                regex::escape(obf_short)
            );
            if let Ok(re) = Regex::new(&pattern) {
                let replacement = format!("${{1}} {orig_short}");
                text = count_replace(&re, &text, &replacement, &mut edits);
            }
        }

        // Members of this unit's own types, longest obfuscated name first.
        let unit_prefix = req
            .table
            .primary_type()
            .map(|t| t.fqcn.clone())
            .unwrap_or_default();
        let mut members: Vec<(&SymbolKey, &str)> = req
            .store
            .iter()
            .filter(|e| match &e.key {
                SymbolKey::Method { owner, .. } | SymbolKey::Field { owner, .. } => {
                    !unit_prefix.is_empty()
                        && (owner == &unit_prefix
                            || owner.starts_with(&format!("{unit_prefix}$")))
                }
                _ => false,
            })
            .map(|e| (&e.key, e.name.as_str()))
            .collect();
        members.sort_by(|a, b| {
            b.0.name()
                .len()
                .cmp(&a.0.name().len())
                .then(a.0.cmp(b.0))
        });

        for (key, orig) in members {
            let obf = key.name();
            if obf == orig {
                continue;
            }
            match key {
                SymbolKey::Method { .. } => {
                    // Identifier immediately followed by an open paren,
                    // not preceded by a dot-qualified path we can't type.
                    let pattern =
                        format!(r"(?m)(^|[^.\w]){}(\s*\()", regex::escape(obf));
                    if let Ok(re) = Regex::new(&pattern) {
                        let replacement = format!("${{1}}{orig}${{2}}");
                        text = count_replace(&re, &text, &replacement, &mut edits);
                    }
                }
                SymbolKey::Field { .. } => {
                    text = replace_field(&text, obf, orig, &mut edits);
                }
                _ => {}
            }
        }

        text = restore_strings(text, &strings);

        let new_unit_path = req.table.primary_type().and_then(|decl| {
            let entry = req.store.resolve_type(&decl.fqcn)?;
            if entry.name == decl.fqcn {
                return None;
            }
            Some(format!("{}.java", entry.name.replace('.', "/")))
        });

        RewriteOutcome {
            text,
            edits_applied: edits,
            new_unit_path,
            diagnostics: Vec::new(),
            degraded: true,
        }
    }
}

/// Replace `"..."` literals with placeholders, returning the shielded
/// text and the placeholder table.
fn protect_strings(text: &str) -> (String, HashMap<String, String>) {
    let re = Regex::new(r#""(?:[^"\\]|\\.)*""#).expect("string literal regex");
    let mut table = HashMap::new();
    let mut counter = 0usize;
    let shielded = re
        .replace_all(text, |caps: &Captures<'_>| {
            let placeholder = format!("\u{1}S{counter}\u{1}");
            table.insert(placeholder.clone(), caps[0].to_string());
            counter += 1;
            placeholder
        })
        .into_owned();
    (shielded, table)
}

fn restore_strings(mut text: String, table: &HashMap<String, String>) -> String {
    for (placeholder, original) in table {
        text = text.replace(placeholder, original);
    }
    text
}

fn count_replace(re: &Regex, text: &str, replacement: &str, edits: &mut usize) -> String {
    *edits += re.find_iter(text).count();
    re.replace_all(text, replacement).into_owned()
}

/// Field occurrences: after a dot, or standalone before an assignment or
/// separator. The not-a-call and not-a-declaration guards are emulated by
/// inspecting the surrounding text, since the patterns themselves cannot
/// look around.
fn replace_field(text: &str, obf: &str, orig: &str, edits: &mut usize) -> String {
    let dotted = Regex::new(&format!(r"\.{}\b", regex::escape(obf))).expect("field regex");
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for m in dotted.find_iter(text) {
        // Skip method calls: next non-space char is an open paren.
        let rest = &text[m.end()..];
        if rest.trim_start().starts_with('(') {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push('.');
        out.push_str(orig);
        last = m.end();
        *edits += 1;
    }
    out.push_str(&text[last..]);
    let text = out;

    let standalone = Regex::new(&format!(r"(?m)(^|[^.\w])({})(\s*[=;,\)\]])", regex::escape(obf)))
        .expect("field regex");
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;
    for caps in standalone.captures_iter(&text) {
        let whole = caps.get(0).expect("match");
        let name = caps.get(2).expect("name group");
        // Skip declarations: the previous word is a type or modifier.
        if previous_word(&text, name.start())
            .map(|w| PROTECTED_PREFIX_WORDS.contains(&w))
            .unwrap_or(false)
        {
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        out.push_str(caps.get(1).map(|m| m.as_str()).unwrap_or(""));
        out.push_str(orig);
        out.push_str(caps.get(3).map(|m| m.as_str()).unwrap_or(""));
        last = whole.end();
        *edits += 1;
    }
    out.push_str(&text[last..]);
    out
}

/// The word immediately before `offset`, skipping whitespace.
fn previous_word(text: &str, offset: usize) -> Option<&str> {
    let head = text[..offset].trim_end();
    let start = head
        .rfind(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .map(|i| i + 1)
        .unwrap_or(0);
    let word = &head[start..];
    (!word.is_empty()).then_some(word)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::RewriteOptions;
    use crate::sigdb::SignatureDb;
    use crate::symbols::SymbolTable;
    use crate::syntax::JavaParser;
    use crate::typegraph::TypeGraph;
    use crate::unit::{SourceUnit, UnitOrigin};
    use unmask_core::mapping::{parse_mapping, MappingStore};
    use unmask_core::patch::FileId;

    fn run(source: &str, mapping: &str) -> RewriteOutcome {
        let mut parser = JavaParser::new().unwrap();
        let tree = parser.parse(source).unwrap();
        let table = SymbolTable::build("com/a/b.java", &tree, source);
        let tables = vec![SymbolTable::build("com/a/b.java", &tree, source)];
        let mut diags = Vec::new();
        let graph = TypeGraph::build(&tables, &SignatureDb::builtin(), &mut diags);

        let mut store = MappingStore::new();
        store.insert_all(parse_mapping(mapping).entries).unwrap();
        store.freeze();

        let unit = SourceUnit {
            id: FileId::new(0),
            path: "com/a/b.java".to_string(),
            content: source.to_string(),
            origin: UnitOrigin::JavaFile {
                rel_path: "com/a/b.java".to_string(),
            },
        };
        let options = RewriteOptions::default();
        RegexRewriter.rewrite(&RewriteRequest {
            unit: &unit,
            tree: &tree,
            table: &table,
            graph: &graph,
            store: &store,
            options: &options,
        })
    }

    const MAPPING: &str = "\
com.a.b -> com.example.GameEngine:
    int c -> score
    void d() -> tick
";

    #[test]
    fn outcome_is_flagged_degraded() {
        let out = run("package com.a;\nclass b { }\n", MAPPING);
        assert!(out.degraded);
    }

    #[test]
    fn fqcn_and_guarded_members_are_replaced() {
        // Deliberately broken syntax the parser would choke on.
        let source = "\
package com.a;
class b {
    int c;
    void d() { this.c = c; d(); } garbage((
}
";
        let out = run(source, MAPPING);
        assert!(out.text.contains("this.score = score;"));
        assert!(out.text.contains("void tick() {"));
        assert!(out.text.contains("tick();"));
        // The declaration `int c;` keeps its name: the previous word is a
        // primitive type, so the standalone pattern treats it as a
        // declaration, not a member occurrence.
        assert!(out.text.contains("int c;"));
        assert!(out.edits_applied > 0);
    }

    #[test]
    fn string_literals_are_shielded() {
        let source = "package com.a;\nclass b { String s = \"c = d() com.a.b\"; }\n";
        let out = run(source, MAPPING);
        assert!(out.text.contains("\"c = d() com.a.b\""));
    }

    #[test]
    fn method_call_is_not_a_field_occurrence() {
        let source = "package com.a;\nclass b { void m() { this.d(); } }\n";
        let out = run(source, MAPPING);
        // `.d()` is a call: the field patterns skip it, the method
        // pattern does not apply after a dot, so it survives untouched —
        // exactly the precision loss this mode accepts.
        assert!(out.text.contains("this.d();"));
    }
}
