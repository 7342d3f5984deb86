//! Encoded topic text.
//!
//! Topic text is a byte stream where the values `1..=8` are control codes:
//!
//! | byte | meaning                                                     |
//! |------|-------------------------------------------------------------|
//! | 1    | next byte is literal                                        |
//! | 2    | paragraph start, followed by indent and margin bytes        |
//! | 3    | hot-link: 12-byte slot, display text, closing 3             |
//! | 4    | form-feed                                                   |
//! | 5    | toggle exclusion from the online viewer                     |
//! | 6    | toggle exclusion from the printed document                  |
//! | 7    | center this line                                            |
//! | 8    | run of spaces, followed by the count                        |
//!
//! Both paginators and the link patcher walk the stream with [`scan`].

mod builder;
mod link;

pub use builder::TextBuilder;
pub use link::{LINK_SLOT_SIZE, LinkSlot, link_display, link_positions};

use memchr::memchr2;

pub const CMD_LITERAL: u8 = 1;
pub const CMD_PARA: u8 = 2;
pub const CMD_LINK: u8 = 3;
pub const CMD_FF: u8 = 4;
pub const CMD_XONLINE: u8 = 5;
pub const CMD_XDOC: u8 = 6;
pub const CMD_CENTER: u8 = 7;
pub const CMD_SPACE: u8 = 8;
pub const MAX_CMD: u8 = 8;

/// Which output the text is being laid out for.
///
/// Regions toggled off for the current output are skipped as one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Online,
    Document,
    /// No region is skipped.
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Done,
    Space,
    Link,
    Para,
    Newline,
    FormFeed,
    Word,
    ExcludeOnline,
    ExcludeDocument,
    Center,
}

/// One token: its kind, how many bytes it spans and how many columns it
/// takes when laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanned {
    pub token: Token,
    pub size: usize,
    pub width: usize,
}

impl Scanned {
    const DONE: Scanned = Scanned {
        token: Token::Done,
        size: 0,
        width: 0,
    };

    fn new(token: Token, size: usize, width: usize) -> Self {
        Self { token, size, width }
    }
}

/// True if `text[pos]` is a real hyphen: a `-` that is not preceded by a
/// blank or another `-`. A `-` at the very start counts as following a blank.
pub fn is_hyphen(text: &[u8], pos: usize) -> bool {
    if pos == 0 || text.get(pos) != Some(&b'-') {
        return false;
    }
    !matches!(text[pos - 1], b' ' | b'-')
}

fn scan_raw(text: &[u8]) -> Scanned {
    let Some(&first) = text.first() else {
        return Scanned::DONE;
    };
    let len = text.len();

    match first {
        b' ' => {
            let run = text.iter().take_while(|&&b| b == b' ').count();
            Scanned::new(Token::Space, run, run)
        }
        CMD_SPACE => {
            let width = text.get(1).copied().unwrap_or(0) as usize;
            Scanned::new(Token::Space, len.min(2), width)
        }
        CMD_LINK => {
            let mut pos = (1 + LINK_SLOT_SIZE).min(len);
            let mut width = 0;
            loop {
                match memchr2(CMD_LITERAL, CMD_LINK, &text[pos..]) {
                    Some(skip) => {
                        width += skip;
                        pos += skip;
                        if text[pos] == CMD_LINK {
                            pos += 1;
                            break;
                        }
                        pos = (pos + 2).min(len);
                        width += 1;
                    }
                    None => {
                        width += len - pos;
                        pos = len;
                        break;
                    }
                }
            }
            Scanned::new(Token::Link, pos, width)
        }
        CMD_PARA => Scanned::new(Token::Para, len.min(3), 0),
        CMD_XONLINE => Scanned::new(Token::ExcludeOnline, 1, 0),
        CMD_XDOC => Scanned::new(Token::ExcludeDocument, 1, 0),
        CMD_CENTER => Scanned::new(Token::Center, 1, 0),
        CMD_FF => Scanned::new(Token::FormFeed, 1, 0),
        b'\n' => Scanned::new(Token::Newline, 1, 0),
        _ => {
            let mut size = 0;
            let mut width = 0;
            while size < len {
                let b = text[size];
                if b == CMD_LITERAL {
                    size = (size + 2).min(len);
                    width += 1;
                } else if size > 0 && (b <= MAX_CMD || b == b' ' || b == b'\n') {
                    break;
                } else {
                    size += 1;
                    width += 1;
                    if b == b'-' && is_hyphen(text, size - 1) {
                        break;
                    }
                }
            }
            Scanned::new(Token::Word, size, width)
        }
    }
}

fn skips(token: Token, mode: Mode) -> bool {
    matches!(
        (token, mode),
        (Token::ExcludeOnline, Mode::Online) | (Token::ExcludeDocument, Mode::Document)
    )
}

/// Scans the token at the start of `text`.
///
/// When the token opens a region excluded from `mode`, the whole region up
/// to and including its closing toggle is returned as a single token.
pub fn scan(text: &[u8], mode: Mode) -> Scanned {
    let first = scan_raw(text);
    if !skips(first.token, mode) {
        return first;
    }

    let mut size = first.size;
    loop {
        let next = scan_raw(&text[size..]);
        size += next.size;
        if next.token == Token::Done || skips(next.token, mode) {
            break;
        }
    }
    Scanned::new(first.token, size, first.width)
}

/// Total width of the line starting at `text`, up to the next paragraph,
/// newline, form-feed or end of text.
pub fn line_width(text: &[u8], mode: Mode) -> usize {
    let mut pos = 0;
    let mut width = 0;
    loop {
        let s = scan(&text[pos..], mode);
        match s.token {
            Token::Done | Token::Para | Token::Newline | Token::FormFeed => break,
            Token::ExcludeOnline | Token::ExcludeDocument | Token::Center => {}
            Token::Space | Token::Link | Token::Word => width += s.width,
        }
        pos += s.size;
    }
    width
}

/// Strips literal prefixes, leaving the bytes as they should be displayed.
pub fn unescape(text: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    let mut bytes = text.iter();
    while let Some(&b) = bytes.next() {
        if b == CMD_LITERAL {
            if let Some(&next) = bytes.next() {
                out.push(next);
            }
        } else {
            out.push(b);
        }
    }
    out
}
