//! The signature database: member signatures for types whose source is
//! unavailable.
//!
//! Covers two populations: project types extracted from compiled
//! artifacts upstream, and known framework types. Entries marked
//! `canonical` carry authoritative member names — implementing one of
//! those interfaces pins the implementor's method names (the
//! interface-override inference layer).
//!
//! A small built-in table of ubiquitous JDK and Android callback
//! interfaces is merged underneath any user-supplied database, so the
//! common cases (click handlers, runnables, comparators) work with no
//! configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use unmask_core::mapping::normalize_descriptor;

// ============================================================================
// Errors
// ============================================================================

/// Errors loading a signature database.
#[derive(Debug, Error)]
pub enum SigDbError {
    #[error("cannot read signature database {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse signature database {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Model
// ============================================================================

/// A method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    /// Normalized textual descriptor, e.g. `(View,MotionEvent)`.
    #[serde(default)]
    pub descriptor: Option<String>,
    #[serde(default)]
    pub returns: Option<String>,
}

/// A field signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSig {
    pub name: String,
    #[serde(default, rename = "type")]
    pub ty: Option<String>,
}

/// One type's signature entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSig {
    #[serde(default)]
    pub supers: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub methods: Vec<MethodSig>,
    #[serde(default)]
    pub fields: Vec<FieldSig>,
    /// Member names are authoritative (known framework interface).
    #[serde(default)]
    pub canonical: bool,
}

/// The database: FQCN -> signature entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureDb {
    pub types: BTreeMap<String, TypeSig>,
}

impl SignatureDb {
    /// Load from a JSON file and merge the built-in table underneath.
    pub fn load(path: &Path) -> Result<SignatureDb, SigDbError> {
        let text = fs::read_to_string(path).map_err(|e| SigDbError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let user: SignatureDb =
            serde_json::from_str(&text).map_err(|e| SigDbError::Parse {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(Self::builtin().merged_with(user))
    }

    /// Merge `other` over `self`; `other` wins on FQCN collisions.
    pub fn merged_with(mut self, other: SignatureDb) -> SignatureDb {
        for (fqcn, sig) in other.types {
            self.types.insert(fqcn, sig);
        }
        self
    }

    /// Look up a type by FQCN.
    pub fn get(&self, fqcn: &str) -> Option<&TypeSig> {
        self.types.get(fqcn)
    }

    /// Look up types whose simple name matches.
    pub fn by_simple_name<'a>(&'a self, simple: &'a str) -> impl Iterator<Item = (&'a str, &'a TypeSig)> {
        self.types.iter().filter_map(move |(fqcn, sig)| {
            let last = fqcn.rsplit(['.', '$']).next().unwrap_or(fqcn);
            (last == simple).then_some((fqcn.as_str(), sig))
        })
    }

    /// The built-in table of JDK and Android callback interfaces.
    pub fn builtin() -> SignatureDb {
        let mut types = BTreeMap::new();
        for (fqcn, methods) in BUILTIN_INTERFACES {
            let sig = TypeSig {
                supers: Vec::new(),
                interfaces: Vec::new(),
                methods: methods
                    .iter()
                    .map(|(name, descriptor)| MethodSig {
                        name: (*name).to_string(),
                        descriptor: Some(normalize_descriptor(descriptor)),
                        returns: None,
                    })
                    .collect(),
                fields: Vec::new(),
                canonical: true,
            };
            types.insert((*fqcn).to_string(), sig);
        }
        SignatureDb { types }
    }
}

/// Ubiquitous callback interfaces with their canonical method names.
const BUILTIN_INTERFACES: &[(&str, &[(&str, &str)])] = &[
    ("java.lang.Runnable", &[("run", "()")]),
    ("java.lang.Comparable", &[("compareTo", "(Object)")]),
    ("java.util.Comparator", &[("compare", "(Object,Object)")]),
    ("java.lang.Iterable", &[("iterator", "()")]),
    (
        "java.util.Iterator",
        &[("hasNext", "()"), ("next", "()"), ("remove", "()")],
    ),
    ("java.util.concurrent.Callable", &[("call", "()")]),
    ("android.view.View$OnClickListener", &[("onClick", "(View)")]),
    (
        "android.view.View$OnLongClickListener",
        &[("onLongClick", "(View)")],
    ),
    (
        "android.view.View$OnTouchListener",
        &[("onTouch", "(View,MotionEvent)")],
    ),
    (
        "android.view.View$OnKeyListener",
        &[("onKey", "(View,int,KeyEvent)")],
    ),
    (
        "android.view.View$OnFocusChangeListener",
        &[("onFocusChange", "(View,boolean)")],
    ),
    (
        "android.content.DialogInterface$OnClickListener",
        &[("onClick", "(DialogInterface,int)")],
    ),
    (
        "android.content.DialogInterface$OnCancelListener",
        &[("onCancel", "(DialogInterface)")],
    ),
    (
        "android.content.DialogInterface$OnDismissListener",
        &[("onDismiss", "(DialogInterface)")],
    ),
    (
        "android.text.TextWatcher",
        &[
            ("beforeTextChanged", "(CharSequence,int,int,int)"),
            ("onTextChanged", "(CharSequence,int,int,int)"),
            ("afterTextChanged", "(Editable)"),
        ],
    ),
    (
        "android.widget.CompoundButton$OnCheckedChangeListener",
        &[("onCheckedChanged", "(CompoundButton,boolean)")],
    ),
    (
        "android.widget.SeekBar$OnSeekBarChangeListener",
        &[
            ("onProgressChanged", "(SeekBar,int,boolean)"),
            ("onStartTrackingTouch", "(SeekBar)"),
            ("onStopTrackingTouch", "(SeekBar)"),
        ],
    ),
    (
        "android.widget.AdapterView$OnItemClickListener",
        &[("onItemClick", "(AdapterView,View,int,long)")],
    ),
    (
        "android.view.SurfaceHolder$Callback",
        &[
            ("surfaceCreated", "(SurfaceHolder)"),
            ("surfaceChanged", "(SurfaceHolder,int,int,int)"),
            ("surfaceDestroyed", "(SurfaceHolder)"),
        ],
    ),
    (
        "android.os.Handler$Callback",
        &[("handleMessage", "(Message)")],
    ),
    (
        "android.hardware.SensorEventListener",
        &[
            ("onSensorChanged", "(SensorEvent)"),
            ("onAccuracyChanged", "(Sensor,int)"),
        ],
    ),
];

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_contains_click_listener() {
        let db = SignatureDb::builtin();
        let sig = db.get("android.view.View$OnClickListener").unwrap();
        assert!(sig.canonical);
        assert_eq!(sig.methods[0].name, "onClick");
        assert_eq!(sig.methods[0].descriptor.as_deref(), Some("(View)"));
    }

    #[test]
    fn user_entries_override_builtin() {
        let user: SignatureDb = serde_json::from_str(
            r#"{
                "types": {
                    "java.lang.Runnable": {
                        "methods": [{"name": "run", "descriptor": "()"}],
                        "canonical": false
                    },
                    "com.a.b": {
                        "supers": ["com.a.c"],
                        "fields": [{"name": "x", "type": "int"}]
                    }
                }
            }"#,
        )
        .unwrap();

        let merged = SignatureDb::builtin().merged_with(user);
        assert!(!merged.get("java.lang.Runnable").unwrap().canonical);
        assert_eq!(
            merged.get("com.a.b").unwrap().supers,
            vec!["com.a.c".to_string()]
        );
        // Builtin entries not overridden are still present.
        assert!(merged.get("java.util.Comparator").is_some());
    }

    #[test]
    fn by_simple_name_matches_inner_classes() {
        let db = SignatureDb::builtin();
        let hits: Vec<&str> = db.by_simple_name("OnClickListener").map(|(f, _)| f).collect();
        assert!(hits.contains(&"android.view.View$OnClickListener"));
        assert!(hits.contains(&"android.content.DialogInterface$OnClickListener"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SignatureDb::load(Path::new("/nonexistent/sigdb.json")).unwrap_err();
        assert!(matches!(err, SigDbError::Io { .. }));
    }
}
