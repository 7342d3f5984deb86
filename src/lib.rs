//! # helpc
//!
//! A compiler for a line-oriented help markup language. One source (plus
//! its includes) becomes:
//!
//! - a binary help database of paginated, hot-linked topics for a runtime
//!   viewer,
//! - a C header of `#define`s naming every public label,
//! - or, in print mode, a paginated plain-text manual.
//!
//! ## Quick Start
//!
//! ```no_run
//! use helpc::{HelpConfig, compile};
//!
//! let outcome = compile("help.src", &HelpConfig::default()).unwrap();
//! println!("{}", outcome.stats);
//! outcome.into_result().unwrap();
//! ```
//!
//! ## Pipeline
//!
//! Each stage needs everything the previous one produced:
//!
//! 1. [`compiler::read_source`] reads commands and text into topics and
//!    symbol tables.
//! 2. [`resolve::make_hot_links`] binds links and contents entries.
//! 3. [`paginate::paginate_online`] cuts topics into screens.
//! 4. [`paginate::paginate_document`] numbers the printed pages.
//! 5. [`writer`] lays out and writes the database, then the header.
//!
//! Source problems are collected as [`Diagnostic`]s in a
//! [`CompileContext`]. Any error suppresses the outputs, but the run keeps
//! going so one pass reports as much as possible.

pub mod command;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod exe;
pub mod model;
pub mod paginate;
pub mod print;
pub mod report;
pub mod resolve;
pub mod source;
pub mod swap;
pub mod text;
pub mod writer;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub use compiler::{HelpSource, read_source};
pub use config::{DocumentGeometry, HelpConfig, Limits, OnlineGeometry, SwapMode};
pub use diagnostics::{CompileContext, Diagnostic, Severity, SourceLocation};
pub use error::{Error, Result};
pub use exe::{append_help, delete_help};
pub use report::{MemoryReport, Stats};
pub use writer::HeaderStatus;

use paginate::{OnlineLayout, paginate_document, paginate_online};
use writer::DatabaseHeader;

/// What a compile run produced.
#[derive(Debug)]
pub struct CompileOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub errors: usize,
    pub warnings: usize,
    pub stats: Stats,
    pub memory: MemoryReport,
    /// What happened to the header, if outputs were written.
    pub header: Option<HeaderStatus>,
    /// The database written, if outputs were written.
    pub help_file: Option<PathBuf>,
}

impl CompileOutcome {
    /// Fails with [`Error::CompilationFailed`] if any error was reported.
    pub fn into_result(self) -> Result<Self> {
        if self.errors > 0 {
            Err(Error::CompilationFailed {
                errors: self.errors,
            })
        } else {
            Ok(self)
        }
    }
}

/// What a print run produced.
#[derive(Debug)]
pub struct PrintOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub errors: usize,
    pub warnings: usize,
    pub document_pages: u32,
}

impl PrintOutcome {
    /// Fails with [`Error::CompilationFailed`] if any error was reported.
    pub fn into_result(self) -> Result<Self> {
        if self.errors > 0 {
            Err(Error::CompilationFailed {
                errors: self.errors,
            })
        } else {
            Ok(self)
        }
    }
}

fn log_status(ctx: &CompileContext) {
    log::info!(
        "Compiler Status: {} Error{} / {} Warning{}",
        ctx.errors(),
        if ctx.errors() == 1 { "" } else { "s" },
        ctx.warnings(),
        if ctx.warnings() == 1 { "" } else { "s" },
    );
}

/// Compiles the source at `path` into its header and help database.
///
/// Returns `Err` only for fatal conditions. Source errors come back in the
/// outcome with no files written; see [`CompileOutcome::into_result`].
pub fn compile(path: impl AsRef<Path>, config: &HelpConfig) -> Result<CompileOutcome> {
    let path = path.as_ref();
    let mut ctx = CompileContext::new(&config.limits);

    log::info!("Compiling: {}", path.display());
    let mut source = read_source(path, config, &mut ctx)?;

    let header_path = config.header_file.clone().or(source.header_file.take());
    let help_path = config.help_file.clone().or(source.help_file.take());
    if header_path.is_none() {
        ctx.error("No .H file defined. (Use \"~HdrFile=\")")?;
    }
    if help_path.is_none() {
        ctx.error("No .HLP file defined. (Use \"~HlpFile=\")")?;
    }
    if source.version == -1 {
        ctx.warn("No help version has been defined. (Use \"~Version=\")")?;
    }

    // reports unresolved links even when there are already errors
    resolve::make_hot_links(&mut source.tables, &mut ctx)?;

    let mut layout = OnlineLayout::default();
    let mut document_pages = 0;
    if !ctx.has_errors() {
        layout = paginate_online(&mut source, &config.online)?;
    }
    if !ctx.has_errors() {
        document_pages = paginate_document(&mut source, config, &mut ctx)?;
    }

    let mut header = None;
    let mut written = None;
    if let (false, Some(header_path), Some(help_path)) = (ctx.has_errors(), header_path, help_path)
    {
        writer::calc_offsets(&mut source.tables);
        source.tables.sort_labels();

        let db = DatabaseHeader {
            version: source.version,
            max_pages: layout.max_pages,
            max_links: layout.max_links,
            doc_pages: document_pages,
        };
        writer::write_help_file(&help_path, &mut source, &db)?;
        written = Some(help_path);

        header = Some(writer::write_header(
            &header_path,
            &source.path,
            source.version,
            &source.tables,
            &mut ctx,
        )?);
    }

    let stats = Stats::collect(&source, document_pages);
    let memory = MemoryReport::collect(&source);
    log_status(&ctx);

    Ok(CompileOutcome {
        errors: ctx.errors(),
        warnings: ctx.warnings(),
        diagnostics: ctx.into_diagnostics(),
        stats,
        memory,
        header,
        help_file: written,
    })
}

/// Compiles the source at `path` and prints its document to `out`.
///
/// Source errors come back in the outcome with nothing printed; see
/// [`PrintOutcome::into_result`].
pub fn print(
    path: impl AsRef<Path>,
    out: impl AsRef<Path>,
    config: &HelpConfig,
) -> Result<PrintOutcome> {
    let path = path.as_ref();
    let out = out.as_ref();
    let mut ctx = CompileContext::new(&config.limits);

    log::info!("Compiling: {}", path.display());
    let mut source = read_source(path, config, &mut ctx)?;
    resolve::make_hot_links(&mut source.tables, &mut ctx)?;

    let mut document_pages = 0;
    if !ctx.has_errors() {
        document_pages = paginate_document(&mut source, config, &mut ctx)?;
    }
    if !ctx.has_errors() {
        if source.tables.contents.is_empty() {
            return Err(Error::NoContents);
        }
        log::info!("Printing to: {}", out.display());
        let file = File::create(out).map_err(|e| Error::open(out, e))?;
        print::print_document(&mut source, BufWriter::new(file), config, &mut ctx)?;
    }
    log_status(&ctx);

    Ok(PrintOutcome {
        errors: ctx.errors(),
        warnings: ctx.warnings(),
        diagnostics: ctx.into_diagnostics(),
        document_pages,
    })
}
