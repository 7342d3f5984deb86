//! Generated `#define` header.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use bstr::ByteSlice;
use tempfile::NamedTempFile;

use crate::diagnostics::CompileContext;
use crate::error::{Error, Result};
use crate::model::{INDEX_LABEL, SymbolTables};

/// What [`write_header`] did to the header on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "lowercase"))]
pub enum HeaderStatus {
    Created,
    Updated,
    Unchanged,
}

impl HeaderStatus {
    pub fn changed(self) -> bool {
        self != HeaderStatus::Unchanged
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

/// Renders the header text. `tables` must already be sorted.
pub fn render_header(
    header_path: &Path,
    source_path: &Path,
    version: i32,
    tables: &SymbolTables,
) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "\n/*\n * {}\n *\n * Contains #defines for help.\n *\n * Generated by helpc from: {}\n *\n */\n\n\n",
        file_name(header_path),
        file_name(source_path),
    );
    out.push_str("/* current help file version */\n\n");
    let _ = writeln!(out, "#define {:<32} {:>3}", "HELP_VERSION", version);
    out.push_str("\n\n/* labels */\n\n");

    for (index, label) in tables.public_labels().enumerate() {
        let _ = write!(out, "#define {:<32} {:>3}", label.name.to_str_lossy(), index);
        if label.name == INDEX_LABEL {
            out.push_str("        /* index */");
        }
        out.push('\n');
    }
    out.push_str("\n\n");
    out
}

fn read_existing(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::open(path, e)),
    }
}

/// Regenerates the header at `path`, replacing it only if its content
/// changes.
pub fn write_header(
    path: &Path,
    source_path: &Path,
    version: i32,
    tables: &SymbolTables,
    ctx: &mut CompileContext,
) -> Result<HeaderStatus> {
    let text = render_header(path, source_path, version, tables);

    let existing = read_existing(path)?;
    if existing.is_some() {
        log::info!("Comparing: {}", path.display());
    } else {
        log::info!("Writing: {}", path.display());
    }
    if existing.as_deref() == Some(text.as_bytes()) {
        return Ok(HeaderStatus::Unchanged);
    }

    let dir = super::staging_dir(path);
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::open(dir, e))?;
    temp.write_all(text.as_bytes())?;
    temp.flush()?;

    let status = if existing.is_some() {
        log::info!("Updating: {}", path.display());
        HeaderStatus::Updated
    } else {
        HeaderStatus::Created
    };
    temp.persist(path).map_err(|e| Error::open(path, e.error))?;

    ctx.note(format!(
        "{} changed; code that includes it must be re-compiled.",
        file_name(path)
    ));
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Limits;
    use crate::diagnostics::Severity;
    use crate::model::Label;

    fn tables(names: &[&str]) -> SymbolTables {
        let mut tables = SymbolTables::new();
        for name in names {
            tables.labels.push(Label::new(*name, 0, 0));
        }
        tables.sort_labels();
        tables
    }

    #[test]
    fn test_render() {
        let tables = tables(&["ZOOM", "@hidden", "HELP_INDEX", "COLORS"]);
        let text = render_header(Path::new("dir/help.h"), Path::new("help.src"), 3, &tables);
        assert!(text.starts_with("\n/*\n * help.h\n"));
        assert!(text.contains(" * Generated by helpc from: help.src\n"));
        assert!(text.contains(&format!("#define {:<32}   3\n", "HELP_VERSION")));

        let defines: Vec<&str> = text
            .lines()
            .filter(|l| l.starts_with("#define") && !l.contains("HELP_VERSION"))
            .collect();
        assert_eq!(
            defines,
            [
                format!("#define {:<32}   0        /* index */", "HELP_INDEX"),
                format!("#define {:<32}   1", "COLORS"),
                format!("#define {:<32}   2", "ZOOM"),
            ]
        );
        assert!(!text.contains("hidden"));
        assert!(text.ends_with("\n\n\n"));
    }

    #[test]
    fn test_write_only_when_changed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("help.h");
        let mut ctx = CompileContext::new(&Limits::default());
        let src = Path::new("help.src");

        let a = tables(&["ONE"]);
        let status = write_header(&path, src, 1, &a, &mut ctx).unwrap();
        assert_eq!(status, HeaderStatus::Created);
        let first = fs::read(&path).unwrap();

        let status = write_header(&path, src, 1, &a, &mut ctx).unwrap();
        assert_eq!(status, HeaderStatus::Unchanged);
        assert_eq!(ctx.messages(Severity::Note).count(), 1);

        let b = tables(&["TWO"]);
        let status = write_header(&path, src, 1, &b, &mut ctx).unwrap();
        assert_eq!(status, HeaderStatus::Updated);
        let second = fs::read(&path).unwrap();
        assert_ne!(first, second);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
