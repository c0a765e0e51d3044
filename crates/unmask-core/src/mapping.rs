//! Layered mapping store: symbol keys, provenance, and the mapping-file format.
//!
//! The store holds one proposed name per symbol, merged from several layers:
//! an explicit mapping file (authoritative), interface-override detection,
//! call-graph inference, and naming-convention heuristics. Layer precedence
//! is total; equal-precedence disagreements keep the first recorded entry
//! and surface a conflict, never a silent merge.
//!
//! # Mapping-file format
//!
//! The line format follows the Android obfuscation-tool convention, with the
//! obfuscated name on the left:
//!
//! ```text
//! com.a.b -> com.example.GameEngine:
//!     boolean c -> paused
//!     void a(int,com.a.d) -> drawFrame
//!     a() -> tick  # xref-inferred 80%
//! ```
//!
//! Class records are unindented; member records are indented under their
//! class. Method records carry a parenthesized parameter list; an enhanced
//! form without the return type is also accepted. `#` starts a comment, so
//! a store dump (which annotates inferred entries with their provenance)
//! parses back as explicit input.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

use crate::patch::Span;

// ============================================================================
// Symbol Keys
// ============================================================================

/// Project-wide identity of a renameable symbol.
///
/// Methods and fields live in separate namespaces (as in the source object
/// model), so a field `a` and a method `a` on the same owner never collide.
/// Locals are keyed by their declaring unit and declaration span, which is
/// the only stable identity an unnamed-scope variable has.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKey {
    /// A class, interface, or enum, keyed by obfuscated fully-qualified name.
    Type { fqcn: String },
    /// A method, keyed by owner FQCN, name, and normalized descriptor.
    Method {
        owner: String,
        name: String,
        descriptor: Option<String>,
    },
    /// A field, keyed by owner FQCN and name.
    Field { owner: String, name: String },
    /// A local, parameter, or catch variable, keyed by declaration site.
    Local {
        unit: String,
        name: String,
        span: Span,
    },
}

impl SymbolKey {
    /// The obfuscated name this key refers to.
    pub fn name(&self) -> &str {
        match self {
            SymbolKey::Type { fqcn } => fqcn.rsplit('.').next().unwrap_or(fqcn),
            SymbolKey::Method { name, .. } => name,
            SymbolKey::Field { name, .. } => name,
            SymbolKey::Local { name, .. } => name,
        }
    }

    /// Grouping key for duplicate-name collision checks: symbols in the
    /// same group must not end up with the same proposed name.
    fn collision_scope(&self) -> String {
        match self {
            SymbolKey::Type { fqcn } => match fqcn.rsplit_once('.') {
                Some((pkg, _)) => format!("type:{pkg}"),
                None => "type:".to_string(),
            },
            SymbolKey::Method { owner, .. } => format!("method:{owner}"),
            SymbolKey::Field { owner, .. } => format!("field:{owner}"),
            SymbolKey::Local { unit, .. } => format!("local:{unit}"),
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKey::Type { fqcn } => write!(f, "{fqcn}"),
            SymbolKey::Method {
                owner,
                name,
                descriptor,
            } => write!(f, "{owner}#{name}{}", descriptor.as_deref().unwrap_or("()")),
            SymbolKey::Field { owner, name } => write!(f, "{owner}#{name}"),
            SymbolKey::Local { unit, name, span } => write!(f, "{unit}@{}:{name}", span.start),
        }
    }
}

/// Normalize a textual method descriptor for key equality.
///
/// Parameter types are reduced to their simple names with generic arguments
/// stripped, so `(int, java.lang.String)` and `(int,String)` compare equal.
/// Array suffixes are preserved.
pub fn normalize_descriptor(descriptor: &str) -> String {
    let inner = descriptor.trim().trim_start_matches('(').trim_end_matches(')');
    if inner.trim().is_empty() {
        return "()".to_string();
    }
    let params: Vec<String> = split_top_level(inner)
        .into_iter()
        .map(|p| simple_type_name(&p))
        .collect();
    format!("({})", params.join(","))
}

/// Number of parameters in a textual descriptor.
pub fn descriptor_arity(descriptor: &str) -> usize {
    let inner = descriptor.trim().trim_start_matches('(').trim_end_matches(')');
    if inner.trim().is_empty() {
        0
    } else {
        split_top_level(inner).len()
    }
}

/// Split a parameter list on commas that are not nested in generics.
fn split_top_level(params: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in params.chars() {
        match ch {
            '<' => {
                depth += 1;
                current.push(ch);
            }
            '>' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

/// Reduce a type text to its simple name, keeping array suffixes.
fn simple_type_name(ty: &str) -> String {
    let ty = ty.trim();
    let (base, arrays) = match ty.find('[') {
        Some(i) => (&ty[..i], &ty[i..]),
        None => (ty, ""),
    };
    let base = match base.find('<') {
        Some(i) => &base[..i],
        None => base,
    };
    let simple = base.rsplit('.').next().unwrap_or(base).trim();
    format!("{simple}{}", arrays.replace(' ', ""))
}

// ============================================================================
// Provenance & Entries
// ============================================================================

/// Inference source of a proposed name.
///
/// Variant order is precedence order (ascending), so the derived `Ord`
/// ranks `Explicit` above everything else.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    /// Shape-based naming-convention heuristic (loop counters, accessors).
    ConventionHeuristic,
    /// Inferred from call-graph / field-access / literal evidence.
    XrefInferred,
    /// Canonical name of an externally known interface method.
    InterfaceOverride,
    /// Supplied by the explicit mapping file. Never overridden.
    Explicit,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            Provenance::ConventionHeuristic => "convention-heuristic",
            Provenance::XrefInferred => "xref-inferred",
            Provenance::InterfaceOverride => "interface-override",
            Provenance::Explicit => "explicit",
        };
        write!(f, "{tag}")
    }
}

/// One proposed rename with its source and confidence (0-100).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub key: SymbolKey,
    pub name: String,
    pub provenance: Provenance,
    pub confidence: u8,
    /// Declaration span in the declaring unit, when known. Orders
    /// collision-suffix assignment deterministically.
    pub decl_span: Option<Span>,
}

impl MappingEntry {
    /// Create an explicit entry (confidence 100).
    pub fn explicit(key: SymbolKey, name: impl Into<String>) -> Self {
        MappingEntry {
            key,
            name: name.into(),
            provenance: Provenance::Explicit,
            confidence: 100,
            decl_span: None,
        }
    }

    /// Create an inferred entry.
    pub fn inferred(
        key: SymbolKey,
        name: impl Into<String>,
        provenance: Provenance,
        confidence: u8,
    ) -> Self {
        MappingEntry {
            key,
            name: name.into(),
            provenance,
            confidence: confidence.min(100),
            decl_span: None,
        }
    }

    /// Attach a declaration span for deterministic collision ordering.
    pub fn with_decl_span(mut self, span: Span) -> Self {
        self.decl_span = Some(span);
        self
    }
}

/// An equal-precedence disagreement between two layers, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConflict {
    pub key: SymbolKey,
    pub kept: String,
    pub rejected: String,
    pub provenance: Provenance,
}

// ============================================================================
// Store
// ============================================================================

/// Errors raised by the mapping store.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Write attempted after `freeze()`.
    #[error("mapping store is frozen; no further writes permitted")]
    Frozen,
}

/// The layered mapping table.
///
/// Population order is explicit load first, then enhancement passes in
/// descending precedence. A later insert at lower precedence is simply
/// ignored; at equal precedence with a different name it is recorded as a
/// conflict. After `freeze()` the store is read-only and duplicate proposed
/// names within one scope have been suffixed apart.
#[derive(Debug, Default)]
pub struct MappingStore {
    entries: BTreeMap<SymbolKey, MappingEntry>,
    conflicts: Vec<MappingConflict>,
    method_index: HashMap<(String, String), Vec<SymbolKey>>,
    frozen: bool,
}

impl MappingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        MappingStore::default()
    }

    /// Insert an entry, applying the layer precedence rules.
    pub fn insert(&mut self, entry: MappingEntry) -> Result<(), MappingError> {
        if self.frozen {
            return Err(MappingError::Frozen);
        }
        match self.entries.get_mut(&entry.key) {
            None => {
                self.entries.insert(entry.key.clone(), entry);
            }
            Some(existing) => {
                if entry.provenance > existing.provenance {
                    *existing = entry;
                } else if entry.provenance == existing.provenance && entry.name != existing.name {
                    self.conflicts.push(MappingConflict {
                        key: entry.key,
                        kept: existing.name.clone(),
                        rejected: entry.name,
                        provenance: entry.provenance,
                    });
                }
                // Lower precedence (or an identical proposal): ignore.
            }
        }
        Ok(())
    }

    /// Insert a batch of entries from one layer.
    pub fn insert_all(
        &mut self,
        entries: impl IntoIterator<Item = MappingEntry>,
    ) -> Result<(), MappingError> {
        for entry in entries {
            self.insert(entry)?;
        }
        Ok(())
    }

    /// Exact-key lookup.
    pub fn resolve(&self, key: &SymbolKey) -> Option<&MappingEntry> {
        self.entries.get(key)
    }

    /// Method lookup with descriptor fallback.
    ///
    /// Tries the exact descriptor, then the descriptor-less key (enhanced
    /// mapping format), then a unique arity match among the owner's
    /// same-named methods. Requires a frozen store (the arity index is
    /// built at freeze time).
    pub fn resolve_method(
        &self,
        owner: &str,
        name: &str,
        descriptor: Option<&str>,
    ) -> Option<&MappingEntry> {
        if let Some(desc) = descriptor {
            let key = SymbolKey::Method {
                owner: owner.to_string(),
                name: name.to_string(),
                descriptor: Some(normalize_descriptor(desc)),
            };
            if let Some(entry) = self.entries.get(&key) {
                return Some(entry);
            }
        }
        let bare = SymbolKey::Method {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: None,
        };
        if let Some(entry) = self.entries.get(&bare) {
            return Some(entry);
        }

        let candidates = self
            .method_index
            .get(&(owner.to_string(), name.to_string()))?;
        if let Some(desc) = descriptor {
            let arity = descriptor_arity(desc);
            let mut matched = candidates.iter().filter(|k| match k {
                SymbolKey::Method {
                    descriptor: Some(d),
                    ..
                } => descriptor_arity(d) == arity,
                _ => false,
            });
            if let Some(key) = matched.next() {
                return self.entries.get(key);
            }
            None
        } else {
            candidates.first().and_then(|k| self.entries.get(k))
        }
    }

    /// Field lookup.
    pub fn resolve_field(&self, owner: &str, name: &str) -> Option<&MappingEntry> {
        self.entries.get(&SymbolKey::Field {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Type lookup by obfuscated FQCN.
    pub fn resolve_type(&self, fqcn: &str) -> Option<&MappingEntry> {
        self.entries.get(&SymbolKey::Type {
            fqcn: fqcn.to_string(),
        })
    }

    /// Conflicts recorded so far.
    pub fn conflicts(&self) -> &[MappingConflict] {
        &self.conflicts
    }

    /// Deterministic iteration over all entries.
    pub fn iter(&self) -> impl Iterator<Item = &MappingEntry> {
        self.entries.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `freeze()` has been called.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Finalize the store: disambiguate duplicate proposed names, build the
    /// method arity index, and reject all further writes.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.assign_collision_suffixes();

        for key in self.entries.keys() {
            if let SymbolKey::Method { owner, name, .. } = key {
                self.method_index
                    .entry((owner.clone(), name.clone()))
                    .or_default()
                    .push(key.clone());
            }
        }
        self.frozen = true;
    }

    /// Suffix duplicate proposed names within one scope, ordered by
    /// declaration span (entries without spans sort last, by key), so
    /// reruns assign identical suffixes.
    fn assign_collision_suffixes(&mut self) {
        let mut groups: BTreeMap<(String, String), Vec<SymbolKey>> = BTreeMap::new();
        for (key, entry) in &self.entries {
            groups
                .entry((key.collision_scope(), entry.name.clone()))
                .or_default()
                .push(key.clone());
        }

        for ((_, _), mut keys) in groups {
            if keys.len() < 2 {
                continue;
            }
            keys.sort_by(|a, b| {
                let sa = self.entries[a].decl_span;
                let sb = self.entries[b].decl_span;
                match (sa, sb) {
                    (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => a.cmp(b),
                }
            });
            for (i, key) in keys.iter().enumerate().skip(1) {
                let entry = self.entries.get_mut(key).expect("grouped key present");
                entry.name = format!("{}{}", entry.name, i + 1);
            }
        }
    }
}

// ============================================================================
// Mapping-file Parsing
// ============================================================================

static CLASS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S+)\s*->\s*(\S+):$").expect("class line regex"));

static MEMBER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+:\d+:)?(\S+)\s+(\S+?)(\(.*?\))?\s+->\s+(\S+)$").expect("member line regex")
});

static MEMBER_LINE_SHORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+?)(\(.*?\))?\s*->\s*(\S+)$").expect("short member line regex")
});

/// Result of parsing a mapping file.
#[derive(Debug, Default)]
pub struct ParsedMapping {
    /// Obfuscated FQCN -> original FQCN.
    pub classes: BTreeMap<String, String>,
    /// All records as explicit entries (types and members).
    pub entries: Vec<MappingEntry>,
}

/// Parse mapping-file text.
///
/// Unparseable lines are skipped with a warning; only I/O-level failures
/// (handled by the caller) are fatal.
pub fn parse_mapping(text: &str) -> ParsedMapping {
    let mut parsed = ParsedMapping::default();
    let mut current_class: Option<String> = None;

    for (line_no, raw) in text.lines().enumerate() {
        let indented = raw.starts_with(' ') || raw.starts_with('\t');
        let line = strip_comment(raw).trim().to_string();
        if line.is_empty() {
            continue;
        }

        if !indented {
            if let Some(caps) = CLASS_LINE.captures(&line) {
                let obf = caps[1].to_string();
                let orig = caps[2].to_string();
                parsed.entries.push(MappingEntry::explicit(
                    SymbolKey::Type { fqcn: obf.clone() },
                    orig.clone(),
                ));
                parsed.classes.insert(obf.clone(), orig);
                current_class = Some(obf);
                continue;
            }
            tracing::warn!(line = line_no + 1, "skipping unrecognized mapping line");
            continue;
        }

        let Some(owner) = current_class.clone() else {
            tracing::warn!(line = line_no + 1, "member record before any class record");
            continue;
        };

        if let Some(caps) = MEMBER_LINE.captures(&line) {
            let obf = caps[2].to_string();
            let descriptor = caps.get(3).map(|m| normalize_descriptor(m.as_str()));
            let orig = caps[4].to_string();
            parsed
                .entries
                .push(MappingEntry::explicit(member_key(owner, obf, descriptor), orig));
        } else if let Some(caps) = MEMBER_LINE_SHORT.captures(&line) {
            let obf = caps[1].to_string();
            let descriptor = caps.get(2).map(|m| normalize_descriptor(m.as_str()));
            let orig = caps[3].to_string();
            parsed
                .entries
                .push(MappingEntry::explicit(member_key(owner, obf, descriptor), orig));
        } else {
            tracing::warn!(line = line_no + 1, "skipping unrecognized member line");
        }
    }

    parsed
}

fn member_key(owner: String, name: String, descriptor: Option<String>) -> SymbolKey {
    match descriptor {
        Some(d) => SymbolKey::Method {
            owner,
            name,
            descriptor: Some(d),
        },
        None => SymbolKey::Field { owner, name },
    }
}

/// Strip a trailing `#` comment (a `#` preceded by whitespace or at the
/// start of the line).
fn strip_comment(line: &str) -> &str {
    if line.trim_start().starts_with('#') {
        return "";
    }
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'#' && i > 0 && bytes[i - 1].is_ascii_whitespace() {
            return &line[..i];
        }
    }
    line
}

// ============================================================================
// Mapping-file Dump
// ============================================================================

/// Re-emit the merged store in the mapping-file line format.
///
/// Types come first in key order, each followed by its member records.
/// Members of a type with no rename still get a self-mapped class header so
/// the dump stays a valid, self-contained mapping. Inferred entries carry a
/// provenance comment; local entries are emitted as comments (they are not
/// re-loadable and exist for the record).
pub fn dump_mapping(store: &MappingStore) -> String {
    let mut classes: BTreeMap<String, &MappingEntry> = BTreeMap::new();
    let mut members: BTreeMap<String, Vec<&MappingEntry>> = BTreeMap::new();
    let mut locals: Vec<&MappingEntry> = Vec::new();

    for entry in store.iter() {
        match &entry.key {
            SymbolKey::Type { fqcn } => {
                classes.insert(fqcn.clone(), entry);
            }
            SymbolKey::Method { owner, .. } | SymbolKey::Field { owner, .. } => {
                members.entry(owner.clone()).or_default().push(entry);
            }
            SymbolKey::Local { .. } => locals.push(entry),
        }
    }

    let mut owners: Vec<&String> = classes.keys().chain(members.keys()).collect();
    owners.sort();
    owners.dedup();

    let mut out = String::new();
    for owner in owners {
        match classes.get(owner) {
            Some(entry) => {
                out.push_str(&format!("{} -> {}:{}\n", owner, entry.name, comment(entry)));
            }
            None => {
                out.push_str(&format!("{owner} -> {owner}:\n"));
            }
        }
        if let Some(list) = members.get(owner) {
            let mut list = list.clone();
            list.sort_by(|a, b| a.key.cmp(&b.key));
            for entry in list {
                let record = match &entry.key {
                    SymbolKey::Method {
                        name, descriptor, ..
                    } => format!("{}{}", name, descriptor.as_deref().unwrap_or("()")),
                    SymbolKey::Field { name, .. } => name.clone(),
                    _ => continue,
                };
                out.push_str(&format!("    {} -> {}{}\n", record, entry.name, comment(entry)));
            }
        }
    }

    locals.sort_by(|a, b| a.key.cmp(&b.key));
    for entry in locals {
        if let SymbolKey::Local { unit, name, span } = &entry.key {
            out.push_str(&format!(
                "# local {}@{}..{}: {} -> {}  # {} {}%\n",
                unit, span.start, span.end, name, entry.name, entry.provenance, entry.confidence
            ));
        }
    }

    out
}

fn comment(entry: &MappingEntry) -> String {
    if entry.provenance == Provenance::Explicit {
        String::new()
    } else {
        format!("  # {} {}%", entry.provenance, entry.confidence)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn method_key(owner: &str, name: &str, desc: &str) -> SymbolKey {
        SymbolKey::Method {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: Some(desc.to_string()),
        }
    }

    fn field_key(owner: &str, name: &str) -> SymbolKey {
        SymbolKey::Field {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    mod descriptor_tests {
        use super::*;

        #[test]
        fn normalizes_qualified_params_to_simple_names() {
            assert_eq!(
                normalize_descriptor("(int, java.lang.String)"),
                "(int,String)"
            );
            assert_eq!(normalize_descriptor("()"), "()");
            assert_eq!(normalize_descriptor("(com.a.b[])"), "(b[])");
        }

        #[test]
        fn strips_generic_arguments() {
            assert_eq!(
                normalize_descriptor("(java.util.List<com.a.b>, int)"),
                "(List,int)"
            );
            // Nested generic commas are not parameter separators
            assert_eq!(
                normalize_descriptor("(Map<String, Integer>)"),
                "(Map)"
            );
        }

        #[test]
        fn arity_counts_top_level_params() {
            assert_eq!(descriptor_arity("()"), 0);
            assert_eq!(descriptor_arity("(int)"), 1);
            assert_eq!(descriptor_arity("(Map<String, Integer>, int)"), 2);
        }
    }

    mod store_tests {
        use super::*;

        #[test]
        fn explicit_beats_inferred_regardless_of_order() {
            let mut store = MappingStore::new();
            let key = field_key("com.a.b", "c");
            store
                .insert(MappingEntry::inferred(
                    key.clone(),
                    "inferredName",
                    Provenance::XrefInferred,
                    95,
                ))
                .unwrap();
            store
                .insert(MappingEntry::explicit(key.clone(), "playerName"))
                .unwrap();
            assert_eq!(store.resolve(&key).unwrap().name, "playerName");

            // And the reverse order: explicit is never displaced.
            let mut store = MappingStore::new();
            store
                .insert(MappingEntry::explicit(key.clone(), "playerName"))
                .unwrap();
            store
                .insert(MappingEntry::inferred(
                    key.clone(),
                    "inferredName",
                    Provenance::XrefInferred,
                    95,
                ))
                .unwrap();
            assert_eq!(store.resolve(&key).unwrap().name, "playerName");
        }

        #[test]
        fn equal_provenance_conflict_keeps_first_and_records() {
            let mut store = MappingStore::new();
            let key = method_key("com.a.b", "a", "()");
            store
                .insert(MappingEntry::inferred(
                    key.clone(),
                    "drawFrame",
                    Provenance::XrefInferred,
                    70,
                ))
                .unwrap();
            store
                .insert(MappingEntry::inferred(
                    key.clone(),
                    "renderFrame",
                    Provenance::XrefInferred,
                    90,
                ))
                .unwrap();

            assert_eq!(store.resolve(&key).unwrap().name, "drawFrame");
            assert_eq!(store.conflicts().len(), 1);
            assert_eq!(store.conflicts()[0].rejected, "renderFrame");
        }

        #[test]
        fn provenance_precedence_order() {
            assert!(Provenance::Explicit > Provenance::InterfaceOverride);
            assert!(Provenance::InterfaceOverride > Provenance::XrefInferred);
            assert!(Provenance::XrefInferred > Provenance::ConventionHeuristic);
        }

        #[test]
        fn frozen_store_rejects_writes() {
            let mut store = MappingStore::new();
            store.freeze();
            let err = store.insert(MappingEntry::explicit(
                field_key("com.a.b", "c"),
                "x",
            ));
            assert!(matches!(err, Err(MappingError::Frozen)));
        }

        #[test]
        fn collision_suffixes_ordered_by_decl_span() {
            let mut store = MappingStore::new();
            store
                .insert(
                    MappingEntry::inferred(
                        field_key("com.a.b", "d"),
                        "count",
                        Provenance::XrefInferred,
                        60,
                    )
                    .with_decl_span(Span::new(200, 201)),
                )
                .unwrap();
            store
                .insert(
                    MappingEntry::inferred(
                        field_key("com.a.b", "c"),
                        "count",
                        Provenance::XrefInferred,
                        60,
                    )
                    .with_decl_span(Span::new(100, 101)),
                )
                .unwrap();
            store.freeze();

            // Earlier declaration keeps the bare name.
            assert_eq!(store.resolve_field("com.a.b", "c").unwrap().name, "count");
            assert_eq!(store.resolve_field("com.a.b", "d").unwrap().name, "count2");
        }

        #[test]
        fn method_and_field_namespaces_do_not_collide() {
            let mut store = MappingStore::new();
            store
                .insert(MappingEntry::explicit(field_key("com.a.b", "a"), "score"))
                .unwrap();
            store
                .insert(MappingEntry::explicit(
                    method_key("com.a.b", "a", "()"),
                    "score",
                ))
                .unwrap();
            store.freeze();

            assert_eq!(store.resolve_field("com.a.b", "a").unwrap().name, "score");
            assert_eq!(
                store.resolve_method("com.a.b", "a", Some("()")).unwrap().name,
                "score"
            );
        }

        #[test]
        fn method_arity_fallback_after_freeze() {
            let mut store = MappingStore::new();
            store
                .insert(MappingEntry::explicit(
                    method_key("com.a.b", "a", "(int,String)"),
                    "setLabel",
                ))
                .unwrap();
            store.freeze();

            // Descriptor text differs but arity matches.
            let entry = store.resolve_method("com.a.b", "a", Some("(int,java.lang.String)"));
            assert_eq!(entry.unwrap().name, "setLabel");
            // Wrong arity resolves nothing.
            assert!(store.resolve_method("com.a.b", "a", Some("(int)")).is_none());
        }
    }

    mod format_tests {
        use super::*;

        const SAMPLE: &str = "\
# comment line
com.a.b -> com.example.GameEngine:
    boolean c -> paused
    1:10:void a(int,com.a.d) -> drawFrame
    e() -> tick
com.a.d -> com.example.Frame:
";

        #[test]
        fn parses_class_and_member_records() {
            let parsed = parse_mapping(SAMPLE);
            assert_eq!(parsed.classes.len(), 2);
            assert_eq!(
                parsed.classes.get("com.a.b").map(String::as_str),
                Some("com.example.GameEngine")
            );

            let mut store = MappingStore::new();
            store.insert_all(parsed.entries).unwrap();
            store.freeze();

            assert_eq!(
                store.resolve_type("com.a.b").unwrap().name,
                "com.example.GameEngine"
            );
            assert_eq!(store.resolve_field("com.a.b", "c").unwrap().name, "paused");
            assert_eq!(
                store
                    .resolve_method("com.a.b", "a", Some("(int,d)"))
                    .unwrap()
                    .name,
                "drawFrame"
            );
            // Enhanced record without return type
            assert_eq!(
                store.resolve_method("com.a.b", "e", Some("()")).unwrap().name,
                "tick"
            );
        }

        #[test]
        fn dump_round_trips_through_parse() {
            let parsed = parse_mapping(SAMPLE);
            let mut store = MappingStore::new();
            store.insert_all(parsed.entries).unwrap();
            store
                .insert(MappingEntry::inferred(
                    SymbolKey::Method {
                        owner: "com.a.b".to_string(),
                        name: "f".to_string(),
                        descriptor: Some("()".to_string()),
                    },
                    "dispose",
                    Provenance::XrefInferred,
                    80,
                ))
                .unwrap();
            store.freeze();

            let dumped = dump_mapping(&store);
            assert!(dumped.contains("com.a.b -> com.example.GameEngine:"));
            assert!(dumped.contains("f() -> dispose  # xref-inferred 80%"));

            let reparsed = parse_mapping(&dumped);
            let mut store2 = MappingStore::new();
            store2.insert_all(reparsed.entries).unwrap();
            store2.freeze();

            // The annotated inferred entry re-loads as explicit.
            let entry = store2.resolve_method("com.a.b", "f", Some("()")).unwrap();
            assert_eq!(entry.name, "dispose");
            assert_eq!(entry.provenance, Provenance::Explicit);

            // Second dump is byte-identical apart from provenance comments.
            let dumped2 = dump_mapping(&store2);
            let strip = |s: &str| {
                s.lines()
                    .map(|l| strip_comment(l).trim_end().to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            assert_eq!(strip(&dumped), strip(&dumped2));
        }

        #[test]
        fn member_record_before_class_is_skipped() {
            let parsed = parse_mapping("    a -> b\nx.y -> z:\n");
            assert_eq!(parsed.classes.len(), 1);
            assert_eq!(parsed.entries.len(), 1);
        }

        #[test]
        fn trailing_comments_are_stripped() {
            let parsed = parse_mapping("com.a.b -> Game:\n    c -> paused  # Type: boolean\n");
            let mut store = MappingStore::new();
            store.insert_all(parsed.entries).unwrap();
            assert_eq!(store.resolve_field("com.a.b", "c").unwrap().name, "paused");
        }
    }
}
