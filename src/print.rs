//! Plain-text rendering of the printed document.

use std::io::Write;

use crate::compiler::HelpSource;
use crate::config::HelpConfig;
use crate::diagnostics::CompileContext;
use crate::error::{Error, Result};
use crate::paginate::{ContentsFeed, DocumentSink, Section, process_document};
use crate::text::CMD_LITERAL;

/// Width the heading text is centered in, ahead of `Page N`.
const HEADING_FIELD: usize = 64;

/// Renders layout events as text.
///
/// Blanks are held back until something visible follows them, so lines
/// never end in spaces, and every line starts at the current margin.
pub struct DocumentPrinter<W: Write> {
    out: W,
    heading: String,
    indent: usize,
    title_indent: usize,
    margin: usize,
    spaces: usize,
    start_of_line: bool,
}

impl<W: Write> DocumentPrinter<W> {
    pub fn new(out: W, config: &HelpConfig) -> Self {
        Self {
            out,
            heading: config.document_heading.clone(),
            indent: config.document.indent,
            title_indent: config.document.title_indent,
            margin: config.document.indent,
            spaces: 0,
            start_of_line: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn put(&mut self, byte: u8) -> Result<()> {
        match byte {
            b' ' => self.spaces += 1,
            b'\n' | b'\x0c' => {
                self.start_of_line = true;
                self.spaces = 0;
                self.out.write_all(&[byte])?;
            }
            _ => {
                if self.start_of_line {
                    self.spaces += self.margin;
                    self.start_of_line = false;
                }
                for _ in 0..self.spaces {
                    self.out.write_all(b" ")?;
                }
                self.spaces = 0;
                self.out.write_all(&[byte])?;
            }
        }
        Ok(())
    }

    fn put_str(&mut self, text: &[u8]) -> Result<()> {
        text.iter().try_for_each(|&b| self.put(b))
    }

    fn centered_heading(&self) -> String {
        let len = self.heading.len();
        let pad = HEADING_FIELD.saturating_sub(len);
        let left = pad / 2;
        format!(
            "{}{}{}",
            " ".repeat(left),
            self.heading,
            " ".repeat(pad - left)
        )
    }
}

impl<W: Write> DocumentSink for DocumentPrinter<W> {
    fn heading(&mut self, page: u32) -> Result<()> {
        self.margin = 0;
        let heading = format!("\n{}Page {page}\n\n", self.centered_heading());
        self.put_str(heading.as_bytes())?;
        self.margin = self.indent;
        Ok(())
    }

    fn footing(&mut self, _page: u32) -> Result<()> {
        self.margin = 0;
        self.put(b'\x0c')?;
        self.margin = self.indent;
        Ok(())
    }

    fn print(&mut self, text: &[u8]) -> Result<()> {
        let mut bytes = text.iter();
        while let Some(&b) = bytes.next() {
            if b == CMD_LITERAL {
                if let Some(&next) = bytes.next() {
                    self.put(next)?;
                }
            } else {
                self.put(b)?;
            }
        }
        Ok(())
    }

    fn print_n(&mut self, byte: u8, count: usize) -> Result<()> {
        for _ in 0..count {
            self.put(byte)?;
        }
        Ok(())
    }

    fn print_section(&mut self, section: &Section) -> Result<()> {
        self.margin = self.title_indent;
        if !section.id.is_empty() {
            self.put_str(&section.id)?;
            self.put(b' ')?;
        }
        self.put_str(&section.title)?;
        self.put(b'\n')?;
        self.margin = self.indent;
        Ok(())
    }
}

/// Prints the document of a compiled and paginated source to `out`.
pub fn print_document<W: Write>(
    source: &mut HelpSource,
    out: W,
    config: &HelpConfig,
    ctx: &mut CompileContext,
) -> Result<W> {
    if source.tables.contents.is_empty() {
        return Err(Error::NoContents);
    }

    let mut printer = DocumentPrinter::new(out, config);
    let mut feed = ContentsFeed::new(&source.tables, &mut source.texts, ctx, false);
    process_document(&config.document, &mut feed, &mut printer)?;

    let mut out = printer.into_inner();
    out.flush()?;
    Ok(out)
}
