//! End-to-end pipeline tests over on-disk fixture projects.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use unmask::cli::{run_pipeline, PipelineConfig};
use unmask::java::rewrite::RewriteOptions;
use unmask::report::{DiagnosticKind, RunReport, UnitStatus};

// ============================================================================
// Helpers
// ============================================================================

struct Fixture {
    input: TempDir,
    output: TempDir,
}

impl Fixture {
    fn new(files: &[(&str, &str)]) -> Fixture {
        let input = TempDir::new().expect("input dir");
        for (rel, content) in files {
            let path = input.path().join(rel);
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(path, content).expect("write fixture");
        }
        Fixture {
            input,
            output: TempDir::new().expect("output dir"),
        }
    }

    fn config(&self, mapping: Option<&Path>) -> PipelineConfig {
        PipelineConfig {
            input: self.input.path().to_path_buf(),
            output: Some(self.output.path().to_path_buf()),
            mapping: mapping.map(Path::to_path_buf),
            sigdb: None,
            dump_mappings: None,
            report: None,
            rewrite: RewriteOptions::default(),
            force_regex: false,
        }
    }

    fn run(&self, mapping: Option<&Path>) -> RunReport {
        run_pipeline(&self.config(mapping)).expect("pipeline run")
    }

    fn output_of(&self, rel: &str) -> String {
        fs::read_to_string(self.output.path().join(rel)).expect("read output")
    }
}

fn write_mapping(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("mapping.txt");
    fs::write(&path, content).expect("write mapping");
    path
}

// ============================================================================
// Scope & Literal Safety
// ============================================================================

#[test]
fn renaming_a_field_never_touches_a_shadowing_local() {
    let fixture = Fixture::new(&[(
        "com/a/b.java",
        "\
package com.a;
class b {
    int a;
    void m() {
        int a = 1;
        int x = a;
        this.a = a;
    }
    void n() {
        a = 5;
    }
}
",
    )]);
    let mapping = write_mapping(
        &fixture.input,
        "com.a.b -> com.a.b:\n    int a -> playerName\n",
    );

    fixture.run(Some(&mapping));
    let out = fixture.output_of("com/a/b.java");

    assert!(out.contains("int playerName;"));
    assert!(out.contains("int a = 1;"), "local declaration untouched");
    assert!(out.contains("int x = a;"), "local read untouched");
    assert!(out.contains("this.playerName = a;"));
    // The sibling method sees the field through implicit this.
    assert!(out.contains("playerName = 5;"));
}

#[test]
fn string_and_char_literals_survive_renames_verbatim() {
    let fixture = Fixture::new(&[(
        "com/a/b.java",
        "\
package com.a;
class b {
    int a;
    void m() {
        this.a = 1;
        String s = \"a\";
        char c = 'a';
        // a comment mentioning a
    }
}
",
    )]);
    let mapping =
        write_mapping(&fixture.input, "com.a.b -> com.a.b:\n    int a -> score\n");

    fixture.run(Some(&mapping));
    let out = fixture.output_of("com/a/b.java");

    assert!(out.contains("this.score = 1;"));
    assert!(out.contains("String s = \"a\";"));
    assert!(out.contains("char c = 'a';"));
    assert!(out.contains("// a comment mentioning a"));
}

// ============================================================================
// Inheritance Binding
// ============================================================================

const LISTENER_IFACE: &str = "\
package com.a;
import android.view.View;
public interface f extends View.OnClickListener {
    void a(View p);
}
";

const LISTENER_IMPL_ONE: &str = "\
package com.a;
import android.view.View;
class h implements f {
    public void a(View v) { }
}
";

const LISTENER_IMPL_TWO: &str = "\
package com.a;
import android.view.View;
class k implements f {
    public void a(View v) { }
}
";

const LISTENER_CALLER: &str = "\
package com.a;
import android.view.View;
class u {
    void go(f l, View v) {
        l.a(v);
    }
}
";

#[test]
fn interface_canonical_name_applies_to_all_overriders_and_call_sites() {
    let fixture = Fixture::new(&[
        ("com/a/f.java", LISTENER_IFACE),
        ("com/a/h.java", LISTENER_IMPL_ONE),
        ("com/a/k.java", LISTENER_IMPL_TWO),
        ("com/a/u.java", LISTENER_CALLER),
    ]);

    fixture.run(None);

    assert!(fixture.output_of("com/a/f.java").contains("void onClick(View p);"));
    assert!(fixture
        .output_of("com/a/h.java")
        .contains("public void onClick(View v) { }"));
    assert!(fixture
        .output_of("com/a/k.java")
        .contains("public void onClick(View v) { }"));
    // A call through the interface-typed variable binds to the interface
    // member and is renamed consistently.
    assert!(fixture.output_of("com/a/u.java").contains("l.onClick(v);"));
}

#[test]
fn explicit_mapping_beats_high_confidence_inference() {
    let fixture = Fixture::new(&[
        ("com/a/f.java", LISTENER_IFACE),
        ("com/a/h.java", LISTENER_IMPL_ONE),
    ]);
    // The interface-override layer would say `onClick`; the explicit file
    // is authoritative.
    let mapping = write_mapping(
        &fixture.input,
        "com.a.h -> com.a.h:\n    void a(android.view.View) -> handleTap\n",
    );

    fixture.run(Some(&mapping));
    assert!(fixture
        .output_of("com/a/h.java")
        .contains("public void handleTap(View v) { }"));
}

// ============================================================================
// Determinism & Idempotence
// ============================================================================

#[test]
fn identical_input_produces_byte_identical_output() {
    let files: &[(&str, &str)] = &[
        ("com/a/f.java", LISTENER_IFACE),
        ("com/a/h.java", LISTENER_IMPL_ONE),
        ("com/a/k.java", LISTENER_IMPL_TWO),
        ("com/a/u.java", LISTENER_CALLER),
    ];

    let first = Fixture::new(files);
    first.run(None);
    let second = Fixture::new(files);
    second.run(None);

    for (rel, _) in files {
        assert_eq!(
            first.output_of(rel),
            second.output_of(rel),
            "{rel} differs between runs"
        );
    }
}

#[test]
fn rerun_with_dumped_mappings_is_a_fixed_point() {
    let fixture = Fixture::new(&[(
        "com/a/b.java",
        "\
package com.a;
class b {
    String a;
    void m(b p) {
        this.a = p.getString(\"player_name\");
        for (int q = 0; q < 3; q++) { }
        try { } catch (RuntimeException w) { }
    }
    String getString(String key) { return key; }
}
",
    )]);

    let dump_path = fixture.input.path().join("dump.txt");
    let mut config = fixture.config(None);
    config.dump_mappings = Some(dump_path.clone());
    run_pipeline(&config).expect("first run");
    let first_output = fixture.output_of("com/a/b.java");
    assert!(first_output.contains("String playerName;"));
    assert!(first_output.contains("for (int i = 0; i < 3; i++)"));
    assert!(first_output.contains("catch (RuntimeException ex)"));

    // Feed the rewritten output and the dumped mapping back in.
    let second = Fixture::new(&[("com/a/b.java", first_output.as_str())]);
    let mapping = second.input.path().join("mapping.txt");
    fs::copy(&dump_path, &mapping).expect("copy dump");
    second.run(Some(&mapping));

    assert_eq!(second.output_of("com/a/b.java"), first_output);
}

// ============================================================================
// Merged Blobs & Error Isolation
// ============================================================================

#[test]
fn merged_blob_is_rewritten_in_place_with_updated_markers() {
    let blob = "\
==================
// FILE_PATH: com/a/b.java
==================
package com.a;
class b {
    int c;
}
==================
// FILE_PATH: com/a/d.java
==================
package com.a;
class d {
    b link;
}
";
    let fixture = Fixture::new(&[("merged.txt", blob)]);
    let mapping = write_mapping(
        &fixture.input,
        "com.a.b -> com.example.GameEngine:\n    int c -> score\n",
    );

    fixture.run(Some(&mapping));
    let out = fixture.output_of("merged.txt");

    assert!(out.contains("// FILE_PATH: com/example/GameEngine.java"));
    assert!(out.contains("class GameEngine {"));
    assert!(out.contains("int score;"));
    // The sibling unit keeps its marker but sees the type rename.
    assert!(out.contains("// FILE_PATH: com/a/d.java"));
    assert!(out.contains("GameEngine link;"));
}

#[test]
fn one_bad_unit_never_aborts_its_siblings() {
    let fixture = Fixture::new(&[("com/a/good.java", "package com.a;\nclass good { int c; }\n")]);
    fs::write(
        fixture.input.path().join("com/a/bad.java"),
        [0xff, 0xfe, 0x00, b'x'],
    )
    .expect("write bad unit");
    let mapping = write_mapping(
        &fixture.input,
        "com.a.good -> com.a.good:\n    int c -> score\n",
    );

    let report = fixture.run(Some(&mapping));

    assert!(fixture.output_of("com/a/good.java").contains("int score;"));
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.kind == DiagnosticKind::EncodingError));
    assert!(report
        .units
        .iter()
        .any(|u| u.path == "com/a/bad.java" && u.status == UnitStatus::Skipped));
}

#[test]
fn heavily_malformed_unit_degrades_to_regex_fallback() {
    let fixture = Fixture::new(&[(
        "com/a/b.java",
        ")))] class b ((( ;;; not java at all [[(\n",
    )]);
    let mapping = write_mapping(&fixture.input, "b -> Salvaged:\n");

    let report = fixture.run(Some(&mapping));
    assert!(report
        .units
        .iter()
        .any(|u| u.path == "com/a/b.java" && u.status == UnitStatus::Degraded));
}

#[test]
fn missing_mapping_file_is_fatal() {
    let fixture = Fixture::new(&[("com/a/b.java", "class b { }\n")]);
    let missing = fixture.input.path().join("nonexistent.txt");
    let err = run_pipeline(&fixture.config(Some(&missing))).unwrap_err();
    assert_eq!(err.exit_code().code(), 3);
}
