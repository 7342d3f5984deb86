//! Character handling inside a topic.
//!
//! Three machines share one state variable: paragraph reflow (the default),
//! centering, and verbatim text (`Format-` and data topics).

use crate::error::Result;
use crate::source::SourceChar;
use crate::text::CMD_CENTER;

use super::Compiler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum State {
    /// Between paragraphs.
    Start,
    /// Blanks at the start of a paragraph's first line.
    StartFirstLine,
    FirstLine,
    FirstLineSpaces,
    /// Blanks at the start of the second line; they fix the margin.
    StartSecondLine,
    Line,
    LineSpaces,
    /// Blanks at the start of the third and later lines.
    StartLine,
    /// A line indented past the format-exclude column.
    FormatDisabled,
    FormatDisabledSpaces,
    /// Blanks in verbatim text.
    Spaces,
}

/// Formatting state of the open topic.
#[derive(Debug, Clone)]
pub(super) struct FormatState {
    pub formatting: bool,
    pub centering: bool,
    pub state: State,
    pub num_spaces: usize,
    pub margin: usize,
    pub in_para: bool,
    /// Position of the margin byte of the open paragraph.
    pub margin_pos: usize,
    /// Lines indented at least this far are not reflowed. Zero or negative
    /// disables the check; the sign is flipped by `FormatExclude+/-`.
    pub exclude: i32,
    pub compress: bool,
    pub xonline: bool,
    pub xdoc: bool,
}

impl FormatState {
    pub fn topic(exclude: i32) -> Self {
        Self {
            formatting: true,
            centering: false,
            state: State::Start,
            num_spaces: 0,
            margin: 0,
            in_para: false,
            margin_pos: 0,
            exclude,
            compress: true,
            xonline: false,
            xdoc: false,
        }
    }

    pub fn data(exclude: i32) -> Self {
        Self {
            formatting: false,
            compress: false,
            ..Self::topic(exclude)
        }
    }

    pub fn reset_para(&mut self) {
        self.in_para = false;
        self.num_spaces = 0;
        self.state = State::Start;
    }

    fn excluded(&self) -> bool {
        self.exclude > 0 && self.num_spaces as i64 >= i64::from(self.exclude)
    }
}

impl Compiler<'_> {
    pub(super) fn put_source_char(&mut self, ch: SourceChar) -> Result<()> {
        if self.fmt.centering {
            self.center_char(ch)
        } else if self.fmt.formatting {
            self.format_char(ch)
        } else {
            self.verbatim_char(ch)
        }
    }

    /// Emits a text character, or parses a hot-link at `{`.
    fn put_a_char(&mut self, ch: SourceChar) -> Result<()> {
        if self.is_data_topic() {
            self.out.push_raw(ch.byte);
        } else if ch.is(b'{') {
            if let Some(link) = self.parse_link()? {
                self.out.push_link(link.index, &link.display);
            }
        } else {
            self.out.push_char(ch.byte);
        }
        Ok(())
    }

    pub(super) fn put_spaces(&mut self, count: usize) -> Result<()> {
        let mut count = count;
        if self.fmt.compress && count > 255 {
            self.error("Too many spaces (over 255).")?;
            count = 255;
        }
        self.out.push_spaces(count, self.fmt.compress);
        Ok(())
    }

    fn center_char(&mut self, ch: SourceChar) -> Result<()> {
        loop {
            match self.fmt.state {
                State::Line => {
                    self.put_a_char(ch)?;
                    if ch.is_any(b'\n') {
                        self.fmt.state = State::Start;
                    }
                    return Ok(());
                }
                _ => {
                    if ch.is(b' ') {
                        return Ok(());
                    }
                    if ch.is_any(b'\n') {
                        self.out.push_raw(b'\n');
                        return Ok(());
                    }
                    self.out.push_raw(CMD_CENTER);
                    self.fmt.state = State::Line;
                }
            }
        }
    }

    fn verbatim_char(&mut self, ch: SourceChar) -> Result<()> {
        loop {
            match self.fmt.state {
                State::Spaces => {
                    if ch.is(b' ') {
                        self.fmt.num_spaces += 1;
                        return Ok(());
                    }
                    self.put_spaces(self.fmt.num_spaces)?;
                    self.fmt.num_spaces = 0;
                    self.fmt.state = State::Start;
                }
                _ => {
                    if ch.is(b' ') {
                        self.fmt.state = State::Spaces;
                        self.fmt.num_spaces = 1;
                    } else {
                        self.put_a_char(ch)?;
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Paragraph reflow. Returns once `ch` has been consumed.
    fn format_char(&mut self, ch: SourceChar) -> Result<()> {
        loop {
            let again = match self.fmt.state {
                State::Start => {
                    if ch.is_any(b'\n') {
                        self.out.push_raw(b'\n');
                        false
                    } else {
                        self.fmt.state = State::StartFirstLine;
                        self.fmt.num_spaces = 0;
                        true
                    }
                }

                State::StartFirstLine => {
                    if ch.is(b' ') {
                        self.fmt.num_spaces += 1;
                        false
                    } else if self.fmt.excluded() {
                        self.put_spaces(self.fmt.num_spaces)?;
                        self.fmt.num_spaces = 0;
                        self.fmt.state = State::FormatDisabled;
                        true
                    } else {
                        let indent = self.fmt.num_spaces;
                        self.fmt.margin_pos = self.out.start_para(indent, indent);
                        self.fmt.state = State::FirstLine;
                        self.fmt.in_para = true;
                        true
                    }
                }

                State::FirstLine | State::Line => {
                    let first = self.fmt.state == State::FirstLine;
                    if ch.is(b'\n') {
                        self.fmt.state = if first {
                            State::StartSecondLine
                        } else {
                            State::StartLine
                        };
                        self.fmt.num_spaces = 0;
                    } else if ch.is_any(b'\n') {
                        // an escaped newline forces the paragraph to end
                        self.out.push_raw(b'\n');
                        self.fmt.in_para = false;
                        self.fmt.state = State::Start;
                    } else if ch.is(b' ') {
                        self.fmt.state = if first {
                            State::FirstLineSpaces
                        } else {
                            State::LineSpaces
                        };
                        self.fmt.num_spaces = 1;
                    } else {
                        self.put_a_char(ch)?;
                    }
                    false
                }

                State::FirstLineSpaces | State::LineSpaces => {
                    if ch.is(b' ') {
                        self.fmt.num_spaces += 1;
                        false
                    } else {
                        self.put_spaces(self.fmt.num_spaces)?;
                        self.fmt.state = if self.fmt.state == State::FirstLineSpaces {
                            State::FirstLine
                        } else {
                            State::Line
                        };
                        true
                    }
                }

                State::StartSecondLine => {
                    if ch.is(b' ') {
                        self.fmt.num_spaces += 1;
                        false
                    } else if ch.is_any(b'\n') {
                        self.end_para_with_blank_line();
                        false
                    } else if self.fmt.excluded() {
                        self.out.push_raw(b'\n');
                        self.fmt.in_para = false;
                        self.put_spaces(self.fmt.num_spaces)?;
                        self.fmt.num_spaces = 0;
                        self.fmt.state = State::FormatDisabled;
                        true
                    } else {
                        self.out.add_blank_for_split();
                        self.fmt.margin = self.fmt.num_spaces;
                        self.out
                            .set(self.fmt.margin_pos, self.fmt.margin.min(255) as u8);
                        self.fmt.state = State::Line;
                        true
                    }
                }

                State::StartLine => {
                    if ch.is(b' ') {
                        self.fmt.num_spaces += 1;
                        false
                    } else if ch.is_any(b'\n') {
                        self.end_para_with_blank_line();
                        false
                    } else if self.fmt.num_spaces != self.fmt.margin {
                        // a change of margin starts a new paragraph
                        self.out.push_raw(b'\n');
                        self.fmt.in_para = false;
                        self.fmt.state = State::StartFirstLine;
                        true
                    } else {
                        self.out.add_blank_for_split();
                        self.fmt.state = State::Line;
                        true
                    }
                }

                State::FormatDisabled => {
                    if ch.is(b' ') {
                        self.fmt.state = State::FormatDisabledSpaces;
                        self.fmt.num_spaces = 1;
                    } else {
                        if ch.is_any(b'\n') {
                            self.fmt.state = State::Start;
                        }
                        self.put_a_char(ch)?;
                    }
                    false
                }

                State::FormatDisabledSpaces => {
                    if ch.is(b' ') {
                        self.fmt.num_spaces += 1;
                        false
                    } else {
                        self.put_spaces(self.fmt.num_spaces)?;
                        self.fmt.num_spaces = 0;
                        self.fmt.state = State::FormatDisabled;
                        true
                    }
                }

                State::Spaces => {
                    // left over from verbatim text after `Format+`
                    self.fmt.state = State::Start;
                    true
                }
            };

            if !again {
                return Ok(());
            }
        }
    }

    fn end_para_with_blank_line(&mut self) {
        self.out.push_raw(b'\n');
        self.out.push_raw(b'\n');
        self.fmt.in_para = false;
        self.fmt.state = State::Start;
    }
}
