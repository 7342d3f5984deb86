//! Character-level reading of help source files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics::{CompileContext, SourceLocation};
use crate::error::{Error, Result};

const PUSHBACK_CAPACITY: usize = 32;
const TAB_STOP: usize = 8;
const COMMENT_MARKER: u8 = b';';

/// Value substituted for characters that cannot be stored.
const SENTINEL: u8 = 0xFF;

/// One logical source character.
///
/// `escaped` is set for characters produced by a backslash escape, so that
/// an escaped `{` or newline is never mistaken for markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceChar {
    pub byte: u8,
    pub escaped: bool,
}

impl SourceChar {
    pub const fn plain(byte: u8) -> Self {
        Self {
            byte,
            escaped: false,
        }
    }

    /// True for the unescaped character `byte`.
    pub fn is(&self, byte: u8) -> bool {
        !self.escaped && self.byte == byte
    }

    /// True for `byte` whether or not it was escaped.
    pub fn is_any(&self, byte: u8) -> bool {
        self.byte == byte
    }
}

struct OpenFile {
    path: Arc<Path>,
    data: Vec<u8>,
    pos: usize,
    line: usize,
    col: usize,
}

impl OpenFile {
    fn new(path: Arc<Path>, data: Vec<u8>) -> Self {
        Self {
            path,
            data,
            pos: 0,
            line: 1,
            col: 0,
        }
    }

    fn next_byte(&mut self) -> Option<u8> {
        loop {
            let b = *self.data.get(self.pos)?;
            self.pos += 1;
            if b == b'\r' && self.data.get(self.pos) == Some(&b'\n') {
                continue;
            }
            return Some(b);
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }
}

/// Reads logical characters from a stack of source files.
///
/// Tabs expand to the next multiple of eight, blanks before a newline
/// disappear, lines starting with `;` are comments and `\NNN` or `\x`
/// produce escaped characters. [`SourceReader::read_char`] returns `None`
/// at the end of the file currently being read; the caller decides whether
/// to resume an including file with [`SourceReader::end_include`].
pub struct SourceReader {
    main: OpenFile,
    includes: Vec<OpenFile>,
    /// Pushed-back characters with the column reached after each.
    pushback: Vec<(SourceChar, usize)>,
    pending_spaces: usize,
    max_include_depth: usize,
}

impl SourceReader {
    /// Opens the main source file.
    pub fn open(path: impl AsRef<Path>, max_include_depth: usize) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| Error::open(path, e))?;
        Ok(Self::from_bytes(path, data, max_include_depth))
    }

    /// Reads source held in memory, reporting diagnostics against `name`.
    pub fn from_bytes(name: impl AsRef<Path>, data: Vec<u8>, max_include_depth: usize) -> Self {
        Self {
            main: OpenFile::new(Arc::from(name.as_ref()), data),
            includes: Vec::new(),
            pushback: Vec::with_capacity(PUSHBACK_CAPACITY),
            pending_spaces: 0,
            max_include_depth,
        }
    }

    fn current(&self) -> &OpenFile {
        self.includes.last().unwrap_or(&self.main)
    }

    fn current_mut(&mut self) -> &mut OpenFile {
        self.includes.last_mut().unwrap_or(&mut self.main)
    }

    pub fn file(&self) -> &Arc<Path> {
        &self.current().path
    }

    pub fn line(&self) -> usize {
        self.current().line
    }

    pub fn column(&self) -> usize {
        self.current().col
    }

    pub fn location(&self) -> SourceLocation {
        SourceLocation::new(self.file().clone(), self.line())
    }

    /// Number of files currently open, including the main file.
    pub fn depth(&self) -> usize {
        self.includes.len() + 1
    }

    /// Resolves a path named inside the file currently being read.
    pub fn resolve(&self, name: &str) -> PathBuf {
        match self.file().parent() {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    /// Suspends the current file and continues reading from `path`.
    ///
    /// Fails with a message suitable for a diagnostic when nesting is too
    /// deep or the file cannot be read.
    pub fn include(&mut self, path: &Path) -> std::result::Result<(), String> {
        if self.includes.len() >= self.max_include_depth {
            return Err("Too many nested Includes.".to_string());
        }
        let data =
            fs::read(path).map_err(|e| format!("Unable to open \"{}\": {e}", path.display()))?;
        log::debug!("including {}", path.display());
        self.includes.push(OpenFile::new(Arc::from(path), data));
        Ok(())
    }

    /// Resumes the including file once an included one is exhausted.
    /// Returns false when the main file itself has ended.
    pub fn end_include(&mut self) -> bool {
        self.includes.pop().is_some()
    }

    /// True once every pushed-back character and every open file is
    /// exhausted.
    pub fn eos(&self) -> bool {
        self.pushback.is_empty()
            && self.pending_spaces == 0
            && self.main.at_end()
            && self.includes.iter().all(OpenFile::at_end)
    }

    /// Pushes a character back; the next read returns it again.
    pub fn unread_char(&mut self, ch: SourceChar) -> Result<()> {
        if self.pushback.len() >= PUSHBACK_CAPACITY {
            return Err(Error::PushbackOverflow);
        }
        let file = self.current_mut();
        let col = file.col;
        file.col = col.saturating_sub(1);
        self.pushback.push((ch, col));
        Ok(())
    }

    /// Pushes back a string so that it is read again in order.
    pub fn unread_str(&mut self, s: &[u8]) -> Result<()> {
        for &b in s.iter().rev() {
            self.unread_char(SourceChar::plain(b))?;
        }
        Ok(())
    }

    /// Reads the next physical character, expanding tabs and dropping
    /// blanks that precede a newline.
    fn raw_char(&mut self) -> Option<u8> {
        if self.pending_spaces > 0 {
            self.pending_spaces -= 1;
            return Some(b' ');
        }

        loop {
            let Some(b) = self.current_mut().next_byte() else {
                if self.pending_spaces > 0 {
                    self.pending_spaces -= 1;
                    return Some(b' ');
                }
                return None;
            };

            match b {
                b'\t' => {
                    let file = self.current_mut();
                    let diff = (file.col / TAB_STOP + 1) * TAB_STOP - file.col;
                    file.col += diff;
                    self.pending_spaces += diff;
                }
                b' ' => {
                    self.current_mut().col += 1;
                    self.pending_spaces += 1;
                }
                b'\n' => {
                    self.pending_spaces = 0;
                    let file = self.current_mut();
                    file.col = 0;
                    file.line += 1;
                    return Some(b'\n');
                }
                _ if self.pending_spaces > 0 => {
                    self.current_mut().pos -= 1;
                    self.pending_spaces -= 1;
                    return Some(b' ');
                }
                _ => {
                    self.current_mut().col += 1;
                    return Some(b);
                }
            }
        }
    }

    fn next_char(&mut self) -> Option<SourceChar> {
        if let Some((ch, col)) = self.pushback.pop() {
            self.current_mut().col = col;
            return Some(ch);
        }
        self.raw_char().map(SourceChar::plain)
    }

    /// Returns the next logical character, or `None` at the end of the
    /// current file.
    pub fn read_char(&mut self, ctx: &mut CompileContext) -> Result<Option<SourceChar>> {
        let mut ch = self.next_char();
        while let Some(c) = ch
            && c.is(COMMENT_MARKER)
            && self.column() == 1
        {
            loop {
                match self.next_char() {
                    Some(c) if c.is(b'\n') => break,
                    None => break,
                    Some(_) => {}
                }
            }
            ch = self.next_char();
        }

        let Some(ch) = ch else {
            return Ok(None);
        };

        if !ch.is(b'\\') {
            if ch.byte == 0 {
                ctx.error_at(Some(&self.location()), "Null character ('\\0') not allowed!")?;
                return Ok(Some(SourceChar {
                    byte: SENTINEL,
                    escaped: true,
                }));
            }
            return Ok(Some(ch));
        }

        let Some(next) = self.next_char() else {
            return Ok(None);
        };

        let value = if !next.escaped && next.byte.is_ascii_digit() {
            let mut value = u32::from(next.byte - b'0');
            let mut digits = 1;
            while let Some(d) = self.next_char() {
                if d.escaped || !d.byte.is_ascii_digit() || digits >= 3 {
                    self.unread_char(d)?;
                    break;
                }
                value = value * 10 + u32::from(d.byte - b'0');
                digits += 1;
            }
            value
        } else {
            u32::from(next.byte)
        };

        let byte = match u8::try_from(value) {
            Ok(0) => {
                ctx.error_at(Some(&self.location()), "Null character ('\\0') not allowed!")?;
                SENTINEL
            }
            Ok(byte) => byte,
            Err(_) => {
                ctx.error_at(
                    Some(&self.location()),
                    format!("Escape value {value} is out of range."),
                )?;
                SENTINEL
            }
        };

        Ok(Some(SourceChar {
            byte,
            escaped: true,
        }))
    }

    /// Reads characters up to and including the first unescaped byte in
    /// `stop`, keeping at most `limit - 1` characters.
    pub fn read_until(
        &mut self,
        ctx: &mut CompileContext,
        limit: usize,
        stop: &[u8],
    ) -> Result<Until> {
        let mut text = Vec::new();
        for _ in 1..limit {
            let Some(ch) = self.read_char(ctx)? else {
                return Ok(Until {
                    text,
                    end: UntilEnd::Eof,
                });
            };
            if !ch.escaped && stop.contains(&ch.byte) {
                return Ok(Until {
                    text,
                    end: UntilEnd::Stop(ch.byte),
                });
            }
            text.push(ch.byte);
        }
        Ok(Until {
            text,
            end: UntilEnd::TooLong,
        })
    }

    /// Skips characters from `skip`, leaving the first other character
    /// unread.
    pub fn skip_over(&mut self, ctx: &mut CompileContext, skip: &[u8]) -> Result<()> {
        while let Some(ch) = self.read_char(ctx)? {
            if ch.escaped || !skip.contains(&ch.byte) {
                self.unread_char(ch)?;
                break;
            }
        }
        Ok(())
    }
}

/// How a [`SourceReader::read_until`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntilEnd {
    Stop(u8),
    Eof,
    TooLong,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Until {
    pub text: Vec<u8>,
    pub end: UntilEnd,
}
