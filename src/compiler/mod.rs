//! Help source to topics and symbol tables.
//!
//! [`read_source`] drives the reader over the whole input. Commands are
//! executed as they are met, text is run through the formatting state
//! machine of the open topic and appended to its encoded text, and every
//! finished topic is moved to swap storage.
//!
//! # Example
//!
//! ```
//! use helpc::compiler::read_source_bytes;
//! use helpc::{CompileContext, HelpConfig};
//!
//! let config = HelpConfig::default();
//! let mut ctx = CompileContext::new(&config.limits);
//! let src = b"~Topic=Intro\nHello, world.\n".to_vec();
//! let source = read_source_bytes("help.src", src, &config, &mut ctx).unwrap();
//!
//! assert_eq!(source.tables.topics.len(), 1);
//! assert!(!ctx.has_errors());
//! ```

mod contents;
mod format;
mod link;
mod table;

use std::path::{Path, PathBuf};

use bstr::{BString, ByteSlice};

use crate::command::{self, Command, CommandError, FormatExcludeArg, Scope, Toggle};
use crate::config::HelpConfig;
use crate::diagnostics::{CompileContext, SourceLocation};
use crate::error::{Error, Result};
use crate::model::{DOC_CONTENTS_TITLE, Label, SymbolTables, Topic, TopicFlags};
use crate::source::{SourceChar, SourceReader, UntilEnd};
use crate::swap::TopicTexts;
use crate::text::{CMD_FF, CMD_XDOC, CMD_XONLINE, TextBuilder};

pub(crate) use contents::PAGE_NUM_WIDTH;
use format::FormatState;

/// Longest command, hot-link or contents item, terminator included.
const MAX_COMMAND: usize = 128;

const MAX_TITLE: usize = 70;
const LONG_TITLE: usize = 60;
const LONG_LABEL: usize = 32;

/// Everything read from a help source.
pub struct HelpSource {
    /// The main source file.
    pub path: PathBuf,
    pub tables: SymbolTables,
    pub texts: TopicTexts,
    /// `HdrFile=`, relative to the main source file's directory.
    pub header_file: Option<PathBuf>,
    /// `HlpFile=`, relative to the main source file's directory.
    pub help_file: Option<PathBuf>,
    /// `Version=`, or -1 when none was given.
    pub version: i32,
}

/// Compiles the help source at `path`.
pub fn read_source(
    path: impl AsRef<Path>,
    config: &HelpConfig,
    ctx: &mut CompileContext,
) -> Result<HelpSource> {
    let path = path.as_ref();
    let reader = SourceReader::open(path, config.limits.max_include_depth)?;
    Compiler::new(path, reader, config, ctx)?.run()
}

/// Compiles help source held in memory, naming it `name` in diagnostics.
/// Includes resolve against the directory of `name`.
pub fn read_source_bytes(
    name: impl AsRef<Path>,
    data: Vec<u8>,
    config: &HelpConfig,
    ctx: &mut CompileContext,
) -> Result<HelpSource> {
    let name = name.as_ref();
    let reader = SourceReader::from_bytes(name, data, config.limits.max_include_depth);
    Compiler::new(name, reader, config, ctx)?.run()
}

/// `[A-Za-z@_][A-Za-z0-9_]*`
pub(crate) fn is_valid_label(name: &[u8]) -> bool {
    match name.split_first() {
        Some((&first, rest)) => {
            (first.is_ascii_alphabetic() || first == b'@' || first == b'_')
                && rest.iter().all(|&b| b.is_ascii_alphanumeric() || b == b'_')
        }
        None => false,
    }
}

struct OpenTopic {
    title: BString,
    flags: TopicFlags,
}

struct Compiler<'a> {
    path: PathBuf,
    config: &'a HelpConfig,
    ctx: &'a mut CompileContext,
    reader: SourceReader,
    tables: SymbolTables,
    texts: TopicTexts,
    out: TextBuilder,
    topic: Option<OpenTopic>,
    fmt: FormatState,
    /// Format-exclude column set outside any topic.
    global_exclude: i32,
    /// Where the command being executed started.
    cmd_location: SourceLocation,
    header_file: Option<BString>,
    help_file: Option<BString>,
    version: i32,
}

impl<'a> Compiler<'a> {
    fn new(
        path: &Path,
        reader: SourceReader,
        config: &'a HelpConfig,
        ctx: &'a mut CompileContext,
    ) -> Result<Self> {
        let cmd_location = reader.location();
        Ok(Self {
            path: path.to_path_buf(),
            config,
            ctx,
            reader,
            tables: SymbolTables::new(),
            texts: TopicTexts::from_mode(&config.swap)?,
            out: TextBuilder::new(config.limits.max_topic_text),
            topic: None,
            fmt: FormatState::topic(0),
            global_exclude: 0,
            cmd_location,
            header_file: None,
            help_file: None,
            version: -1,
        })
    }

    fn run(mut self) -> Result<HelpSource> {
        log::info!("Compiling: {}", self.path.display());

        loop {
            let Some(ch) = self.read_char()? else {
                if self.reader.end_include() {
                    continue;
                }
                break;
            };

            if ch.is(b'~') {
                self.command()?;
                self.check_size()?;
                continue;
            }

            if self.topic.is_none() {
                self.text_outside_topic(ch)?;
                continue;
            }

            self.put_source_char(ch)?;
            self.check_size()?;
        }

        if self.topic.is_some() {
            self.end_topic()?;
        }
        if self.tables.topics.is_empty() {
            self.ctx.warn("Source file has no topics.")?;
        }

        let dir = self.path.parent().map(Path::to_path_buf).unwrap_or_default();
        let resolve = |name: Option<BString>| name.map(|n| dir.join(n.to_str_lossy().as_ref()));
        Ok(HelpSource {
            header_file: resolve(self.header_file),
            help_file: resolve(self.help_file),
            path: self.path,
            tables: self.tables,
            texts: self.texts,
            version: self.version,
        })
    }

    fn read_char(&mut self) -> Result<Option<SourceChar>> {
        self.reader.read_char(self.ctx)
    }

    fn error(&mut self, message: impl Into<String>) -> Result<()> {
        let location = self.reader.location();
        self.ctx.error_at(Some(&location), message)
    }

    fn warn(&mut self, message: impl Into<String>) -> Result<()> {
        let location = self.reader.location();
        self.ctx.warn_at(Some(&location), message)
    }

    fn command_error(&mut self, message: impl Into<String>) -> Result<()> {
        self.ctx.error_at(Some(&self.cmd_location), message)
    }

    fn command_warn(&mut self, message: impl Into<String>) -> Result<()> {
        self.ctx.warn_at(Some(&self.cmd_location), message)
    }

    fn is_data_topic(&self) -> bool {
        self.topic.as_ref().is_some_and(|t| t.flags.data_only)
    }

    fn check_size(&self) -> Result<()> {
        if !self.out.is_full() {
            return Ok(());
        }
        let title = match &self.topic {
            Some(topic) => topic.title.to_string(),
            None => DOC_CONTENTS_TITLE.to_string(),
        };
        Err(Error::TopicTooLarge {
            title,
            size: self.out.len(),
            limit: self.out.limit(),
        })
    }

    fn start_topic(&mut self, title: &[u8], flags: TopicFlags) {
        self.topic = Some(OpenTopic {
            title: title.into(),
            flags,
        });
        self.fmt = if flags.data_only {
            FormatState::data(self.global_exclude)
        } else {
            FormatState::topic(self.global_exclude)
        };
    }

    fn end_topic(&mut self) -> Result<()> {
        let Some(open) = self.topic.take() else {
            return Ok(());
        };
        let text = self.out.take();
        let handle = self.texts.store(&text)?;
        log::debug!("topic {:?}: {} bytes", open.title, text.len());
        self.tables
            .topics
            .push(Topic::new(open.title, open.flags, handle));
        Ok(())
    }

    fn text_outside_topic(&mut self, ch: SourceChar) -> Result<()> {
        if ch.is(b'\n') || ch.is(b' ') {
            return Ok(());
        }
        let location = self.reader.location();
        let until = self.reader.read_until(self.ctx, MAX_COMMAND - 1, b"\n~")?;
        if until.end == UntilEnd::Stop(b'~') {
            self.reader.unread_char(SourceChar::plain(b'~'))?;
        }
        let mut text = vec![ch.byte];
        text.extend_from_slice(&until.text);
        self.ctx.error_at(
            Some(&location),
            format!("Text outside of any topic \"{}\".", text.as_bstr()),
        )
    }

    /// Reads `(` after `~` if there is one.
    fn read_imbedded(&mut self) -> Result<bool> {
        match self.read_char()? {
            Some(ch) if ch.is(b'(') => Ok(true),
            Some(ch) => {
                self.reader.unread_char(ch)?;
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Re-queues the rest of a command chain so it runs after a command
    /// that reads the following source text itself.
    fn requeue_chain(&mut self, imbedded: bool) -> Result<()> {
        if imbedded {
            self.reader.unread_char(SourceChar::plain(b'('))?;
        }
        self.reader.unread_char(SourceChar::plain(b'~'))
    }

    /// Reads one sub-command and the byte that ended it.
    fn read_sub_command(&mut self, imbedded: bool) -> Result<Option<(Vec<u8>, u8)>> {
        let stop: &[u8] = if imbedded { b")\n," } else { b"\n," };
        self.reader.skip_over(self.ctx, b" ")?;
        let until = self.reader.read_until(self.ctx, MAX_COMMAND, stop)?;
        match until.end {
            UntilEnd::Eof => {
                self.command_error("Unexpected EOF in command.")?;
                Ok(None)
            }
            UntilEnd::TooLong => {
                self.command_error("Command line too long.")?;
                Ok(None)
            }
            UntilEnd::Stop(end) => {
                if imbedded && end == b'\n' {
                    self.command_error("Imbedded command has no closing paren (')')")?;
                }
                Ok(Some((until.text, end)))
            }
        }
    }

    /// Runs the command (or chain of commands) after a `~`.
    fn command(&mut self) -> Result<()> {
        self.cmd_location = self.reader.location();
        let imbedded = self.read_imbedded()?;

        let mut done = false;
        while !done {
            let Some((mut text, mut end)) = self.read_sub_command(imbedded)? else {
                break;
            };
            // Table= arguments may be separated by commas too.
            while end == b',' && wants_table_args(&text) {
                let Some((more, next_end)) = self.read_sub_command(imbedded)? else {
                    return Ok(());
                };
                text.push(b' ');
                text.extend_from_slice(&more);
                end = next_end;
            }
            done = end != b',';
            self.execute(&text, imbedded, &mut done)?;
        }
        Ok(())
    }

    fn execute(&mut self, text: &[u8], imbedded: bool, done: &mut bool) -> Result<()> {
        let cmd = match command::parse(text) {
            Ok(cmd) => cmd,
            Err(CommandError::Unknown) => {
                return self
                    .command_error(format!("Bad or unexpected command \"{}\".", text.as_bstr()));
            }
            Err(e) => return self.command_error(e.to_string()),
        };

        match cmd.scope() {
            Scope::BeforeTopics if self.topic.is_some() => {
                return self.command_error(format!(
                    "\"{}\" must come before the first topic.",
                    cmd.name()
                ));
            }
            Scope::InTopic if self.topic.is_none() => {
                return self.command_error(format!(
                    "\"{}\" is only allowed inside a topic.",
                    cmd.name()
                ));
            }
            _ => {}
        }

        match cmd {
            Command::Topic(title) => self.topic_command(title),
            Command::Data(label) => self.data_command(label),
            Command::DocContents => {
                self.end_topic()?;
                if !*done {
                    self.requeue_chain(imbedded)?;
                    *done = true;
                }
                if !self.tables.contents.is_empty() {
                    self.command_error("DocContents has already been defined.")?;
                }
                self.doc_contents()
            }
            Command::Comment => self.comment(),
            Command::FormatExclude(arg) => self.format_exclude(arg),
            Command::Include(name) => {
                let path = self.reader.resolve(&name.to_str_lossy());
                match self.reader.include(&path) {
                    Ok(()) => Ok(()),
                    Err(message) => self.command_error(message),
                }
            }
            Command::HdrFile(name) => {
                if self.header_file.is_some() {
                    self.command_warn("Header Filename has already been defined.")?;
                }
                self.header_file = Some(name.into());
                Ok(())
            }
            Command::HlpFile(name) => {
                if self.help_file.is_some() {
                    self.command_warn("Help Filename has already been defined.")?;
                }
                self.help_file = Some(name.into());
                Ok(())
            }
            Command::Version(value) => {
                if self.version != -1 {
                    self.command_warn("Help version has already been defined.")?;
                }
                self.version = value;
                Ok(())
            }
            Command::FormFeed => {
                self.form_feed(None);
                Ok(())
            }
            Command::DocFormFeed => {
                let excluded = self.fmt.xonline;
                self.form_feed((!excluded).then_some(CMD_XONLINE));
                Ok(())
            }
            Command::OnlineFormFeed => {
                let excluded = self.fmt.xdoc;
                self.form_feed((!excluded).then_some(CMD_XDOC));
                Ok(())
            }
            Command::Label(name) => self.label_command(name),
            Command::Table(args) => {
                self.end_para();
                if !*done {
                    self.requeue_chain(imbedded)?;
                    *done = true;
                }
                self.table(args)
            }
            Command::EndTable => self.command_error("\"EndTable\" without a matching Table=."),
            Command::Format(Toggle::On) => {
                if self.fmt.formatting {
                    return self.command_warn("\"Format+\" is already in effect.");
                }
                self.fmt.formatting = true;
                self.fmt.reset_para();
                Ok(())
            }
            Command::Format(Toggle::Off) => {
                if !self.fmt.formatting {
                    return self.command_warn("\"Format-\" is already in effect.");
                }
                if self.fmt.in_para {
                    self.out.push_raw(b'\n');
                }
                self.fmt.formatting = false;
                self.fmt.reset_para();
                Ok(())
            }
            Command::Online(toggle) => self.toggle_exclusion(toggle, CMD_XONLINE),
            Command::Doc(toggle) => self.toggle_exclusion(toggle, CMD_XDOC),
            Command::Center(Toggle::On) => {
                if self.fmt.centering {
                    return self.command_warn("\"Center+\" already in effect.");
                }
                self.fmt.centering = true;
                if self.fmt.in_para {
                    self.out.push_raw(b'\n');
                    self.fmt.in_para = false;
                }
                self.fmt.state = format::State::Start;
                Ok(())
            }
            Command::Center(Toggle::Off) => {
                if !self.fmt.centering {
                    return self.command_warn("\"Center-\" already in effect.");
                }
                self.fmt.centering = false;
                self.fmt.state = format::State::Start;
                Ok(())
            }
            Command::CompressSpaces(toggle) => {
                let on = toggle == Toggle::On;
                if self.fmt.compress == on {
                    return self.command_warn(format!(
                        "\"CompressSpaces{}\" is already in effect.",
                        toggle.symbol()
                    ));
                }
                self.fmt.compress = on;
                Ok(())
            }
            Command::BinInc(name) => {
                if !self.is_data_topic() {
                    return self.command_error("BinInc allowed only in Data topics.");
                }
                self.bin_inc(name)
            }
        }
    }

    fn topic_command(&mut self, title: &[u8]) -> Result<()> {
        self.end_topic()?;

        if title.is_empty() {
            self.command_warn("Topic has no title.")?;
        } else if title.len() > MAX_TITLE {
            self.command_error("Topic title is too long.")?;
        } else if title.len() > LONG_TITLE {
            self.command_warn("Topic title is long.")?;
        }

        if self.tables.find_topic_title(title).is_some() {
            self.command_error("Topic title already exists.")?;
        }

        self.start_topic(title, TopicFlags::default());
        Ok(())
    }

    fn data_command(&mut self, label: &[u8]) -> Result<()> {
        self.end_topic()?;

        let flags = TopicFlags {
            in_document: false,
            data_only: true,
        };

        if label.is_empty() {
            self.command_warn("Data topic has no label.")?;
        }

        if !is_valid_label(label) {
            self.command_error(format!(
                "Label \"{}\" contains illegal characters.",
                label.as_bstr()
            ))?;
            self.start_topic(b"", flags);
            return Ok(());
        }

        if self.tables.find_label(label).is_some() {
            self.command_error(format!("Label \"{}\" already exists", label.as_bstr()))?;
            self.start_topic(b"", flags);
            return Ok(());
        }

        if label.first() == Some(&crate::model::PRIVATE_SIGIL) {
            self.command_warn("Data topic has a local label.")?;
        }
        if label.len() > LONG_LABEL {
            self.command_warn("Label name is long.")?;
        }

        self.start_topic(b"", flags);
        let topic = self.tables.topics.len();
        self.tables.labels.push(Label::new(label, topic, 0));
        Ok(())
    }

    fn label_command(&mut self, name: &[u8]) -> Result<()> {
        if name.is_empty() {
            return self.command_error("Label has no name.");
        }
        if !is_valid_label(name) {
            return self.command_error(format!(
                "Label \"{}\" contains illegal characters.",
                name.as_bstr()
            ));
        }
        if self.tables.find_label(name).is_some() {
            return self.command_error(format!("Label \"{}\" already exists", name.as_bstr()));
        }

        if name.len() > LONG_LABEL {
            self.command_warn("Label name is long.")?;
        }
        if self.is_data_topic() && name.first() == Some(&crate::model::PRIVATE_SIGIL) {
            self.command_warn("Data topic has a local label.")?;
        }

        let topic = self.tables.topics.len();
        let offset = self.out.len() as u32;
        self.tables.labels.push(Label::new(name, topic, offset));
        Ok(())
    }

    fn format_exclude(&mut self, arg: FormatExcludeArg) -> Result<()> {
        let in_topic = self.topic.is_some();
        match arg {
            FormatExcludeArg::Disable | FormatExcludeArg::Enable => {
                let enable = arg == FormatExcludeArg::Enable;
                let threshold = if in_topic {
                    &mut self.fmt.exclude
                } else {
                    &mut self.global_exclude
                };
                let toggles = if enable { *threshold < 0 } else { *threshold > 0 };
                if toggles {
                    *threshold = -*threshold;
                    Ok(())
                } else {
                    let symbol = if enable { '+' } else { '-' };
                    self.command_warn(format!("\"FormatExclude{symbol}\" is already in effect."))
                }
            }
            FormatExcludeArg::Never => {
                if in_topic {
                    self.fmt.exclude = 0;
                } else {
                    self.global_exclude = 0;
                }
                Ok(())
            }
            FormatExcludeArg::Reset => {
                self.fmt.exclude = self.global_exclude;
                Ok(())
            }
            FormatExcludeArg::Column(column) => {
                let current = if in_topic {
                    self.fmt.exclude
                } else {
                    self.global_exclude
                };
                self.fmt.exclude = if current < 0 { -column } else { column };
                if !in_topic {
                    self.global_exclude = self.fmt.exclude;
                }
                Ok(())
            }
        }
    }

    /// Ends any open paragraph and emits a form-feed, wrapped in `toggle`
    /// codes when it applies to one output only.
    fn form_feed(&mut self, toggle: Option<u8>) {
        if self.fmt.in_para {
            self.out.push_raw(b'\n');
        }
        if let Some(code) = toggle {
            self.out.push_raw(code);
        }
        self.out.push_raw(CMD_FF);
        if let Some(code) = toggle {
            self.out.push_raw(code);
        }
        self.fmt.reset_para();
    }

    fn end_para(&mut self) {
        if self.fmt.in_para {
            self.out.push_raw(b'\n');
            self.fmt.reset_para();
        }
    }

    /// `Online+`/`Online-` and `Doc+`/`Doc-`.
    fn toggle_exclusion(&mut self, toggle: Toggle, code: u8) -> Result<()> {
        let (excluded, name) = if code == CMD_XONLINE {
            (&mut self.fmt.xonline, "Online")
        } else {
            (&mut self.fmt.xdoc, "Doc")
        };
        let want_excluded = toggle == Toggle::Off;
        if *excluded == want_excluded {
            return self.command_warn(format!(
                "\"{name}{}\" already in effect.",
                toggle.symbol()
            ));
        }
        *excluded = want_excluded;
        self.out.push_raw(code);
        Ok(())
    }

    fn bin_inc(&mut self, name: &[u8]) -> Result<()> {
        let path = self.reader.resolve(&name.to_str_lossy());
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                return self.command_error(format!("Unable to open \"{}\": {e}", path.display()));
            }
        };
        if data.len() >= self.out.limit() {
            return self.command_error(format!(
                "File \"{}\" is too large to BinInc ({}K).",
                path.display(),
                data.len() >> 10
            ));
        }
        log::debug!("BinInc {} ({} bytes)", path.display(), data.len());
        self.out.push_bytes(&data);
        Ok(())
    }
}

/// True for a `Table=` command whose three arguments are not all there yet.
fn wants_table_args(text: &[u8]) -> bool {
    matches!(command::parse(text), Ok(Command::Table(args)) if command::table_args(args).is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::model::LinkTarget;
    use crate::text::{CMD_CENTER, CMD_LINK, CMD_PARA, CMD_SPACE, LINK_SLOT_SIZE};

    pub(super) fn compile(src: &str) -> (HelpSource, CompileContext) {
        let config = HelpConfig::default().with_limits(crate::config::Limits {
            max_errors: 0,
            max_warnings: 0,
            ..Default::default()
        });
        let mut ctx = CompileContext::new(&config.limits);
        let source = read_source_bytes("test.src", src.as_bytes().to_vec(), &config, &mut ctx)
            .expect("fatal error");
        (source, ctx)
    }

    pub(super) fn topic_text(source: &mut HelpSource, topic: usize) -> Vec<u8> {
        let handle = source.tables.topics[topic].text;
        let text = source.texts.load(handle).unwrap();
        let copy = text.clone();
        source.texts.release(text);
        copy
    }

    pub(super) fn errors(ctx: &CompileContext) -> Vec<String> {
        ctx.messages(Severity::Error).map(str::to_string).collect()
    }

    pub(super) fn warnings(ctx: &CompileContext) -> Vec<String> {
        ctx.messages(Severity::Warning).map(str::to_string).collect()
    }

    #[test]
    fn test_single_paragraph() {
        let (mut source, ctx) = compile("~Topic=Intro\nHello world.\nSecond line\n");
        assert!(!ctx.has_errors());
        let text = topic_text(&mut source, 0);
        assert_eq!(text, b"\x02\x00\x00Hello world.  Second line");
    }

    #[test]
    fn test_indent_and_margin() {
        let src = "~Topic=T\n    first\n  second\n  third\n   fourth\n";
        let (mut source, _) = compile(src);
        let text = topic_text(&mut source, 0);
        let mut expected = vec![CMD_PARA, 4, 2];
        expected.extend_from_slice(b"first second third\n");
        expected.extend_from_slice(&[CMD_PARA, 3, 3]);
        expected.extend_from_slice(b"fourth");
        assert_eq!(text, expected);
    }

    #[test]
    fn test_blank_line_ends_paragraph() {
        let (mut source, _) = compile("~Topic=T\none\n\ntwo\n");
        let text = topic_text(&mut source, 0);
        assert_eq!(text, b"\x02\x00\x00one\n\n\x02\x00\x00two");
    }

    #[test]
    fn test_hyphen_joins_without_blank() {
        let (mut source, _) = compile("~Topic=T\nwell-\nknown\n");
        let text = topic_text(&mut source, 0);
        assert_eq!(text, b"\x02\x00\x00well-known");
    }

    #[test]
    fn test_format_exclude_keeps_indented_lines() {
        let src = "~FormatExclude=8\n~Topic=T\ntext\n\n        code  here\n";
        let (mut source, ctx) = compile(src);
        assert!(!ctx.has_errors());
        let text = topic_text(&mut source, 0);
        let mut expected = b"\x02\x00\x00text\n\n".to_vec();
        expected.extend_from_slice(&[CMD_SPACE, 8]);
        expected.extend_from_slice(b"code  here\n");
        assert_eq!(text, expected);
    }

    #[test]
    fn test_format_minus_is_verbatim() {
        let (mut source, _) = compile("~Topic=T\n~Format-\n a    b\n");
        let text = topic_text(&mut source, 0);
        assert_eq!(text, [b' ', b'a', CMD_SPACE, 4, b'b', b'\n']);
    }

    #[test]
    fn test_centering() {
        let (mut source, _) = compile("~Topic=T\n~Center+\n   Title\n\n");
        let text = topic_text(&mut source, 0);
        assert_eq!(text, [&[CMD_CENTER][..], b"Title\n\n"].concat());
    }

    #[test]
    fn test_labels_record_offsets() {
        let (source, ctx) = compile("~Topic=T\nabc\n~Label=HERE\nmore\n");
        assert!(!ctx.has_errors());
        let label = &source.tables.labels[0];
        assert_eq!(label.name, "HERE");
        assert_eq!(label.topic, 0);
        assert_eq!(label.offset, 6);
    }

    #[test]
    fn test_label_errors() {
        let (_, ctx) = compile("~Topic=T\n~Label=9bad\n~Label=ok\n~Label=ok\n~Label=\n");
        assert_eq!(
            errors(&ctx),
            [
                "Label \"9bad\" contains illegal characters.",
                "Label \"ok\" already exists",
                "Label has no name.",
            ]
        );
    }

    #[test]
    fn test_topic_title_checks() {
        let long = "x".repeat(65);
        let src = format!("~Topic=\n~Topic={long}\n~Topic=A\n~Topic=a\n");
        let (_, ctx) = compile(&src);
        assert_eq!(warnings(&ctx), ["Topic has no title.", "Topic title is long."]);
        assert_eq!(errors(&ctx), ["Topic title already exists."]);
    }

    #[test]
    fn test_text_outside_topic() {
        let (_, ctx) = compile("stray text\n~Topic=T\n");
        assert_eq!(errors(&ctx), ["Text outside of any topic \"stray text\"."]);
    }

    #[test]
    fn test_scope_errors() {
        let (_, ctx) = compile("~Label=x\n~Topic=T\n~HdrFile=help.h\n");
        assert_eq!(
            errors(&ctx),
            [
                "\"Label=\" is only allowed inside a topic.",
                "\"HdrFile=\" must come before the first topic.",
            ]
        );
    }

    #[test]
    fn test_trailing_text_is_not_executed() {
        let (_, ctx) = compile("~Topic=T\n~Center+ please\ntext\n");
        assert_eq!(errors(&ctx), ["Invalid text after a command \" please\""]);
    }

    #[test]
    fn test_imbedded_chain() {
        let (mut source, ctx) = compile("~Topic=T\nA ~(Online-,Doc-)x~(Online+,Doc+) B\n");
        assert!(!ctx.has_errors());
        let text = topic_text(&mut source, 0);
        assert_eq!(
            text,
            [
                &[CMD_PARA, 0, 0][..],
                b"A",
                &[CMD_XONLINE, CMD_XDOC],
                b" x",
                &[CMD_XONLINE, CMD_XDOC],
                b" B"
            ]
            .concat()
        );
    }

    #[test]
    fn test_redundant_toggle_warns() {
        let (_, ctx) = compile("~Topic=T\n~Online+\n~CompressSpaces+\n");
        assert_eq!(
            warnings(&ctx),
            [
                "\"Online+\" already in effect.",
                "\"CompressSpaces+\" is already in effect."
            ]
        );
    }

    #[test]
    fn test_doc_ff_is_hidden_online() {
        let (mut source, _) = compile("~Topic=T\ntext\n~DocFF\n");
        let text = topic_text(&mut source, 0);
        assert!(text.ends_with(&[b'\n', CMD_XONLINE, CMD_FF, CMD_XONLINE]));
    }

    #[test]
    fn test_header_settings() {
        let src = "~HdrFile=help.h\n~HlpFile=out.hlp\n~Version=42\n~Version=43\n~Topic=T\n";
        let (source, ctx) = compile(src);
        assert_eq!(source.header_file, Some(PathBuf::from("help.h")));
        assert_eq!(source.help_file, Some(PathBuf::from("out.hlp")));
        assert_eq!(source.version, 43);
        assert_eq!(warnings(&ctx), ["Help version has already been defined."]);
    }

    #[test]
    fn test_data_topic() {
        let (mut source, ctx) = compile("~Data=RAW\n{not a link}  x\n");
        assert!(!ctx.has_errors());
        assert!(source.tables.topics[0].is_data());
        assert_eq!(source.tables.labels[0].name, "RAW");
        assert!(source.tables.links.is_empty());
        let text = topic_text(&mut source, 0);
        assert_eq!(text, b"{not a link}  x\n");
    }

    #[test]
    fn test_comment_block() {
        let (mut source, ctx) = compile("~Topic=T\n~Comment\n{ignored}\n~EndComment\nkept\n");
        assert!(!ctx.has_errors());
        assert!(source.tables.links.is_empty());
        assert_eq!(topic_text(&mut source, 0), b"\x02\x00\x00kept");
    }

    #[test]
    fn test_links_are_recorded() {
        let (mut source, ctx) = compile("~Topic=T\nSee {Other Topic} and {=LBL here}.\n");
        assert!(!ctx.has_errors());
        let targets: Vec<_> = source.tables.links.iter().map(|l| l.target.clone()).collect();
        assert_eq!(
            targets,
            [
                LinkTarget::Title("Other Topic".into()),
                LinkTarget::Label("LBL".into())
            ]
        );
        let text = topic_text(&mut source, 0);
        let first = 3 + 4;
        assert_eq!(text[first], CMD_LINK);
        assert_eq!(
            &text[first + 1 + LINK_SLOT_SIZE..first + 1 + LINK_SLOT_SIZE + 11],
            b"Other Topic"
        );
    }

    #[test]
    fn test_topic_too_large_is_fatal() {
        let config = HelpConfig::default().with_limits(crate::config::Limits {
            max_topic_text: 64,
            ..Default::default()
        });
        let mut ctx = CompileContext::new(&config.limits);
        let src = format!("~Topic=Big\n{}\n", "word ".repeat(40));
        let result = read_source_bytes("big.src", src.into_bytes(), &config, &mut ctx);
        assert!(matches!(result, Err(Error::TopicTooLarge { .. })));
    }

    #[test]
    fn test_valid_labels() {
        assert!(is_valid_label(b"HELP_INDEX"));
        assert!(is_valid_label(b"@local"));
        assert!(is_valid_label(b"_x1"));
        assert!(!is_valid_label(b"1x"));
        assert!(!is_valid_label(b"a-b"));
        assert!(!is_valid_label(b""));
    }
}
