//! End-to-end compiles of help sources written to temporary directories.

use std::fs;
use std::path::{Path, PathBuf};

use bstr::ByteSlice;
use tempfile::TempDir;

use helpc::compiler::read_source_bytes;
use helpc::model::ResolvedLink;
use helpc::resolve::make_hot_links;
use helpc::writer::SignatureRecord;
use helpc::{CompileContext, Error, HeaderStatus, HelpConfig, Severity, compile};

const MANUAL: &str = "\
~HdrFile=help.h
~HlpFile=help.hlp
~Version=3
; contents
~DocContents
{1, 0, Starting Out, INTRO}
{2, 0, Colors, COLORS}
~Topic=Starting Out
~Label=INTRO
Welcome.  See {Colors} for palettes and {=ZOOM_BOX zooming}.
~Topic=Colors
~Label=COLORS
Colors cycle.
~Topic=Zoom Box
~Label=ZOOM_BOX
Drag a box.
";

fn write_source(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

fn messages(diagnostics: &[helpc::Diagnostic], severity: Severity) -> Vec<String> {
    diagnostics
        .iter()
        .filter(|d| d.severity == severity)
        .map(|d| d.message.clone())
        .collect()
}

#[test]
fn test_compile_writes_header_and_database() {
    let dir = TempDir::new().unwrap();
    let src = write_source(dir.path(), "help.src", MANUAL);

    let outcome = compile(&src, &HelpConfig::default())
        .unwrap()
        .into_result()
        .unwrap();
    assert_eq!(outcome.header, Some(HeaderStatus::Created));
    assert_eq!(outcome.help_file.as_deref(), Some(dir.path().join("help.hlp").as_path()));
    assert_eq!(outcome.stats.topics, 4);
    assert_eq!(outcome.stats.labels, 3);
    assert!(outcome.stats.document_pages >= 1);

    let header = fs::read_to_string(dir.path().join("help.h")).unwrap();
    assert!(header.contains("Generated by helpc from: help.src"));
    assert!(header.contains(&format!("#define {:<32}   0", "COLORS")));
    assert!(header.contains(&format!("#define {:<32}   2", "ZOOM_BOX")));

    let hlp = fs::read(dir.path().join("help.hlp")).unwrap();
    assert_eq!(
        SignatureRecord::decode(&hlp),
        Some(SignatureRecord {
            version: 3,
            base: 0
        })
    );
}

#[test]
fn test_forward_label_reference_resolves() {
    let config = HelpConfig::default();
    let mut ctx = CompileContext::new(&config.limits);
    let src = b"~Topic=Intro\nHello {=@foo World}\n~Label=@foo\nDone".to_vec();
    let mut source = read_source_bytes("a.src", src, &config, &mut ctx).unwrap();
    make_hot_links(&mut source.tables, &mut ctx).unwrap();
    assert!(!ctx.has_errors());

    let tables = &source.tables;
    assert_eq!(tables.links.len(), 1);
    let label = &tables.labels[0];
    assert_eq!(
        tables.links[0].resolved,
        Some(ResolvedLink {
            topic: 0,
            offset: label.offset
        })
    );

    let text = source.texts.load(tables.topics[0].text).unwrap();
    assert!(text[label.offset as usize..].contains_str("Done"));
    assert!(!text[..label.offset as usize].contains_str("Done"));
    source.texts.release(text);
}

#[test]
fn test_data_only_contents_fails_without_output() {
    let dir = TempDir::new().unwrap();
    let src = write_source(
        dir.path(),
        "help.src",
        "~HdrFile=d.h\n~HlpFile=d.hlp\n~Version=1\n~DocContents\n{1, 0, Raw, RAW}\n\
         ~Topic=T\ntext\n~Data=RAW\nbytes\n",
    );

    let outcome = compile(&src, &HelpConfig::default()).unwrap();
    assert!(outcome.errors > 0);
    assert!(
        messages(&outcome.diagnostics, Severity::Error)
            .iter()
            .any(|m| m.contains("data-only topic"))
    );
    assert!(outcome.header.is_none());
    assert!(!dir.path().join("d.h").exists());
    assert!(!dir.path().join("d.hlp").exists());
    assert!(matches!(
        outcome.into_result(),
        Err(Error::CompilationFailed { .. })
    ));
}

#[test]
fn test_missing_output_names_are_errors() {
    let dir = TempDir::new().unwrap();
    let src = write_source(dir.path(), "help.src", "~Topic=T\ntext\n");

    let outcome = compile(&src, &HelpConfig::default()).unwrap();
    assert_eq!(
        messages(&outcome.diagnostics, Severity::Error),
        [
            "No .H file defined. (Use \"~HdrFile=\")",
            "No .HLP file defined. (Use \"~HlpFile=\")"
        ]
    );
    assert_eq!(
        messages(&outcome.diagnostics, Severity::Warning),
        ["No help version has been defined. (Use \"~Version=\")"]
    );

    let config = HelpConfig::default()
        .with_header_file(dir.path().join("x.h"))
        .with_help_file(dir.path().join("x.hlp"));
    let outcome = compile(&src, &config).unwrap();
    assert_eq!(outcome.errors, 0);
    assert!(dir.path().join("x.hlp").exists());
}

#[test]
fn test_compile_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let src = write_source(dir.path(), "help.src", MANUAL);
    let hlp = dir.path().join("help.hlp");

    compile(&src, &HelpConfig::default()).unwrap().into_result().unwrap();
    let first = fs::read(&hlp).unwrap();
    compile(&src, &HelpConfig::default()).unwrap().into_result().unwrap();
    assert_eq!(fs::read(&hlp).unwrap(), first);
}

#[test]
fn test_comment_only_changes_leave_outputs_identical() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    let src_a = write_source(a.path(), "help.src", MANUAL);
    let src_b = write_source(
        b.path(),
        "help.src",
        &MANUAL.replace("; contents\n", ";      \n;\n"),
    );

    compile(&src_a, &HelpConfig::default()).unwrap().into_result().unwrap();
    compile(&src_b, &HelpConfig::default()).unwrap().into_result().unwrap();

    for name in ["help.h", "help.hlp"] {
        assert_eq!(
            fs::read(a.path().join(name)).unwrap(),
            fs::read(b.path().join(name)).unwrap(),
            "{name} differs"
        );
    }
}

#[test]
fn test_comment_after_trailing_escape_is_dropped() {
    fn topic_text(src: &str) -> Vec<u8> {
        let config = HelpConfig::default();
        let mut ctx = CompileContext::new(&config.limits);
        let mut source =
            read_source_bytes("t.src", src.as_bytes().to_vec(), &config, &mut ctx).unwrap();
        assert!(!ctx.has_errors());
        let text = source.texts.load(source.tables.topics[0].text).unwrap();
        let copy = text.clone();
        source.texts.release(text);
        copy
    }

    assert_eq!(
        topic_text("~Topic=T\nPrice \\65\n; secret note\nend\n"),
        topic_text("~Topic=T\nPrice \\65\nend\n"),
    );
}

#[test]
fn test_unchanged_header_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let src = write_source(dir.path(), "help.src", MANUAL);
    let header = dir.path().join("help.h");

    compile(&src, &HelpConfig::default()).unwrap();
    let before = fs::metadata(&header).unwrap().modified().unwrap();
    let text_before = fs::read_to_string(&header).unwrap();

    let outcome = compile(&src, &HelpConfig::default()).unwrap();
    assert_eq!(outcome.header, Some(HeaderStatus::Unchanged));
    assert_eq!(fs::metadata(&header).unwrap().modified().unwrap(), before);
    assert!(messages(&outcome.diagnostics, Severity::Note).is_empty());

    // renaming one label changes exactly its own line
    write_source(dir.path(), "help.src", &MANUAL.replace("COLORS", "COLOURS"));
    let outcome = compile(&src, &HelpConfig::default()).unwrap();
    assert_eq!(outcome.header, Some(HeaderStatus::Updated));
    assert_eq!(messages(&outcome.diagnostics, Severity::Note).len(), 1);

    let text_after = fs::read_to_string(&header).unwrap();
    let changed: Vec<(&str, &str)> = text_before
        .lines()
        .zip(text_after.lines())
        .filter(|(a, b)| a != b)
        .collect();
    assert_eq!(text_before.lines().count(), text_after.lines().count());
    assert_eq!(changed.len(), 1);
    assert!(changed[0].1.contains("COLOURS"));
}

#[test]
fn test_errors_in_included_files_name_that_file() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "part.src", "line one\n{Missing Topic}\n");
    let src = write_source(
        dir.path(),
        "help.src",
        "~HdrFile=i.h\n~HlpFile=i.hlp\n~Version=1\n~Topic=T\n~Include part.src\nafter\n",
    );

    let outcome = compile(&src, &HelpConfig::default()).unwrap();
    let error = outcome
        .diagnostics
        .iter()
        .find(|d| d.severity == Severity::Error)
        .unwrap();
    assert_eq!(error.message, "Cannot find implicit hot-link \"Missing Topic\".");
    let location = error.location.as_ref().unwrap();
    assert!(location.file.ends_with("part.src"));
    assert_eq!(location.line, 2);
}

#[test]
fn test_missing_source_is_fatal() {
    let dir = TempDir::new().unwrap();
    let err = compile(dir.path().join("nope.src"), &HelpConfig::default()).unwrap_err();
    assert!(matches!(err, Error::Open { .. }));
}
