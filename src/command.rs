//! Recognition of `~` commands.
//!
//! The compiler reads the text of one sub-command (everything up to the
//! closing `)`, newline or comma) and hands it to [`parse`]. Keywords match
//! without regard to case. A recognized keyword followed by unexpected text
//! is rejected rather than executed.

use bstr::ByteSlice;

/// Argument of the `+`/`-` style commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            b'+' => Some(Toggle::On),
            b'-' => Some(Toggle::Off),
            _ => None,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Toggle::On => '+',
            Toggle::Off => '-',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatExcludeArg {
    /// `FormatExclude+`: re-enable the current threshold.
    Enable,
    /// `FormatExclude-`: suspend the current threshold.
    Disable,
    /// `FormatExclude=n`: never exclude.
    Never,
    /// `FormatExclude=`: back to the global threshold.
    Reset,
    /// `FormatExclude=<column>`.
    Column(i32),
}

/// Where a command may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Anywhere,
    BeforeTopics,
    InTopic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Topic(&'a [u8]),
    Data(&'a [u8]),
    DocContents,
    Comment,
    FormatExclude(FormatExcludeArg),
    Include(&'a [u8]),
    HdrFile(&'a [u8]),
    HlpFile(&'a [u8]),
    Version(i32),
    FormFeed,
    DocFormFeed,
    OnlineFormFeed,
    Label(&'a [u8]),
    Table(&'a [u8]),
    EndTable,
    Format(Toggle),
    Online(Toggle),
    Doc(Toggle),
    Center(Toggle),
    CompressSpaces(Toggle),
    BinInc(&'a [u8]),
}

impl Command<'_> {
    pub fn scope(&self) -> Scope {
        match self {
            Command::Topic(_)
            | Command::Data(_)
            | Command::DocContents
            | Command::Comment
            | Command::FormatExclude(_)
            | Command::Include(_) => Scope::Anywhere,
            Command::HdrFile(_) | Command::HlpFile(_) | Command::Version(_) => {
                Scope::BeforeTopics
            }
            _ => Scope::InTopic,
        }
    }

    /// Keyword as written in messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Topic(_) => "Topic=",
            Command::Data(_) => "Data=",
            Command::DocContents => "DocContents",
            Command::Comment => "Comment",
            Command::FormatExclude(_) => "FormatExclude",
            Command::Include(_) => "Include",
            Command::HdrFile(_) => "HdrFile=",
            Command::HlpFile(_) => "HlpFile=",
            Command::Version(_) => "Version=",
            Command::FormFeed => "FF",
            Command::DocFormFeed => "DocFF",
            Command::OnlineFormFeed => "OnlineFF",
            Command::Label(_) => "Label=",
            Command::Table(_) => "Table=",
            Command::EndTable => "EndTable",
            Command::Format(_) => "Format",
            Command::Online(_) => "Online",
            Command::Doc(_) => "Doc",
            Command::Center(_) => "Center",
            Command::CompressSpaces(_) => "CompressSpaces",
            Command::BinInc(_) => "BinInc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Nothing recognizable.
    Unknown,
    /// A recognized keyword followed by unexpected text.
    TrailingText(String),
    /// A recognized keyword with a malformed argument.
    InvalidArgument(&'static str),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Unknown => f.write_str("Bad or unexpected command"),
            CommandError::TrailingText(rest) => {
                write!(f, "Invalid text after a command \"{rest}\"")
            }
            CommandError::InvalidArgument(keyword) => write!(f, "Invalid argument to {keyword}"),
        }
    }
}

fn trim_blanks(text: &[u8]) -> &[u8] {
    text.trim_with(|c| c == ' ')
}

fn strip_keyword<'a>(cmd: &'a [u8], keyword: &str) -> Option<&'a [u8]> {
    let len = keyword.len();
    (cmd.len() >= len && cmd[..len].eq_ignore_ascii_case(keyword.as_bytes())).then(|| &cmd[len..])
}

fn expect_end<'a>(rest: &[u8], command: Command<'a>) -> Result<Command<'a>, CommandError> {
    if rest.is_empty() {
        Ok(command)
    } else {
        Err(CommandError::TrailingText(rest.to_str_lossy().into_owned()))
    }
}

fn toggle<'a>(
    rest: &[u8],
    keyword: &'static str,
    make: fn(Toggle) -> Command<'a>,
) -> Result<Command<'a>, CommandError> {
    match rest.split_first() {
        Some((&b, tail)) => match Toggle::from_byte(b) {
            Some(t) => expect_end(tail, make(t)),
            None => Err(CommandError::InvalidArgument(keyword)),
        },
        None => Err(CommandError::InvalidArgument(keyword)),
    }
}

fn format_exclude(rest: &[u8]) -> Result<Command<'static>, CommandError> {
    let arg = match rest.split_first() {
        Some((b'-', tail)) => return expect_end(tail, Command::FormatExclude(FormatExcludeArg::Disable)),
        Some((b'+', tail)) => return expect_end(tail, Command::FormatExclude(FormatExcludeArg::Enable)),
        Some((b'=', tail)) => tail,
        _ => return Err(CommandError::InvalidArgument("FormatExclude")),
    };
    match arg {
        [] => Ok(Command::FormatExclude(FormatExcludeArg::Reset)),
        [b'n' | b'N', tail @ ..] => {
            expect_end(tail, Command::FormatExclude(FormatExcludeArg::Never))
        }
        _ => match split_int(arg) {
            Some((col, tail)) if col > 0 => {
                expect_end(tail, Command::FormatExclude(FormatExcludeArg::Column(col)))
            }
            _ => Err(CommandError::InvalidArgument("FormatExclude=")),
        },
    }
}

/// Parses one sub-command.
pub fn parse(cmd: &[u8]) -> Result<Command<'_>, CommandError> {
    if let Some(rest) = strip_keyword(cmd, "Topic=") {
        return Ok(Command::Topic(rest));
    }
    if let Some(rest) = strip_keyword(cmd, "Data=") {
        return Ok(Command::Data(rest));
    }
    if let Some(rest) = strip_keyword(cmd, "DocContents") {
        return expect_end(rest, Command::DocContents);
    }
    if cmd.eq_ignore_ascii_case(b"Comment") {
        return Ok(Command::Comment);
    }
    if cmd.eq_ignore_ascii_case(b"EndTable") {
        return Ok(Command::EndTable);
    }
    if let Some(rest) = strip_keyword(cmd, "FormatExclude") {
        return format_exclude(rest);
    }
    if let Some(rest) = strip_keyword(cmd, "Include ") {
        return Ok(Command::Include(trim_blanks(rest)));
    }
    if let Some(rest) = strip_keyword(cmd, "HdrFile=") {
        return Ok(Command::HdrFile(trim_blanks(rest)));
    }
    if let Some(rest) = strip_keyword(cmd, "HlpFile=") {
        return Ok(Command::HlpFile(trim_blanks(rest)));
    }
    if let Some(rest) = strip_keyword(cmd, "Version=") {
        return match split_int(rest) {
            Some((value, tail)) => expect_end(tail, Command::Version(value)),
            None => Err(CommandError::InvalidArgument("Version=")),
        };
    }
    if let Some(rest) = strip_keyword(cmd, "FF") {
        return expect_end(rest, Command::FormFeed);
    }
    if let Some(rest) = strip_keyword(cmd, "DocFF") {
        return expect_end(rest, Command::DocFormFeed);
    }
    if let Some(rest) = strip_keyword(cmd, "OnlineFF") {
        return expect_end(rest, Command::OnlineFormFeed);
    }
    if let Some(rest) = strip_keyword(cmd, "Label=") {
        return Ok(Command::Label(rest));
    }
    if let Some(rest) = strip_keyword(cmd, "Table=") {
        return Ok(Command::Table(rest));
    }
    if let Some(rest) = strip_keyword(cmd, "Format") {
        return toggle(rest, "Format", Command::Format);
    }
    if let Some(rest) = strip_keyword(cmd, "Online") {
        return toggle(rest, "Online", Command::Online);
    }
    if let Some(rest) = strip_keyword(cmd, "Doc") {
        return toggle(rest, "Doc", Command::Doc);
    }
    if let Some(rest) = strip_keyword(cmd, "Center") {
        return toggle(rest, "Center", Command::Center);
    }
    if let Some(rest) = strip_keyword(cmd, "CompressSpaces") {
        return toggle(rest, "CompressSpaces", Command::CompressSpaces);
    }
    if let Some(rest) = strip_keyword(cmd, "BinInc ") {
        return Ok(Command::BinInc(trim_blanks(rest)));
    }
    Err(CommandError::Unknown)
}

/// Leading integer of `text` (optional blanks and sign, then digits)
/// together with the text that follows it. Returns `None` when there are
/// no digits.
pub fn split_int(text: &[u8]) -> Option<(i32, &[u8])> {
    let text = text.trim_start_with(|c| c == ' ');
    let (negative, digits) = match text.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some((b'+', rest)) => (false, rest),
        _ => (false, text),
    };
    let count = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if count == 0 {
        return None;
    }
    let value = digits[..count]
        .iter()
        .try_fold(0i32, |acc, &d| acc.checked_mul(10)?.checked_add(i32::from(d - b'0')))?;
    Some((if negative { -value } else { value }, &digits[count..]))
}

/// Leading integer of `text`, ignoring whatever follows it.
pub fn parse_int(text: &[u8]) -> Option<i32> {
    split_int(text).map(|(value, _)| value)
}

/// Arguments of `Table=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableArgs<'a> {
    pub width: i32,
    pub cols: i32,
    pub indent: i32,
    /// Whatever follows the third number.
    pub trailing: &'a [u8],
}

/// Splits `Table=` arguments: three integers separated by blanks or commas.
pub fn table_args(text: &[u8]) -> Option<TableArgs<'_>> {
    let separator = |c: char| c == ' ' || c == ',';
    let mut rest = text;
    let mut values = [0i32; 3];
    for value in &mut values {
        let (v, tail) = split_int(rest.trim_start_with(separator))?;
        *value = v;
        rest = tail;
    }
    Some(TableArgs {
        width: values[0],
        cols: values[1],
        indent: values[2],
        trailing: rest.trim_with(separator),
    })
}
