//! Hot-link parsing.
//!
//! ```text
//! {Topic Title}          implicit: the text names a topic
//! {=LABEL display text}  explicit: jump to a label
//! {=-2 display text}     special: a topic number known to the viewer
//! ```

use bstr::{BString, ByteSlice};

use crate::command::parse_int;
use crate::error::Result;
use crate::model::{Link, LinkTarget};
use crate::source::UntilEnd;

use super::{Compiler, LONG_LABEL, MAX_COMMAND};

/// A hot-link entered in the link table, ready to be placed in text.
pub(super) struct ParsedLink {
    pub index: usize,
    /// Display text, without literal prefixes.
    pub display: Vec<u8>,
}

/// Trims blanks and one pair of surrounding quotes from an implicit
/// hot-link's text.
fn implicit_title(text: &[u8]) -> &[u8] {
    let text = text.trim_with(|c| c == ' ');
    match text {
        [b'"', inner @ .., b'"'] if text.len() > 2 => inner,
        _ => text,
    }
}

impl Compiler<'_> {
    /// Parses the hot-link after a `{` and records it in the link table.
    /// Returns `None` when the link is malformed.
    pub(super) fn parse_link(&mut self) -> Result<Option<ParsedLink>> {
        let location = self.reader.location();
        let until = self.reader.read_until(self.ctx, MAX_COMMAND, b"}\n")?;

        match until.end {
            UntilEnd::Eof => {
                self.ctx
                    .error_at(Some(&location), "Unexpected EOF in hot-link.")?;
                return Ok(None);
            }
            UntilEnd::TooLong => {
                self.ctx.error_at(Some(&location), "Hot-link is too long.")?;
                return Ok(None);
            }
            UntilEnd::Stop(b'\n') => {
                self.ctx.error_at(
                    Some(&location),
                    "Hot-link has no closing curly-brace ('}').",
                )?;
            }
            UntilEnd::Stop(_) => {}
        }

        let raw = until.text;
        let (target, display) = if let Some(rest) = raw.strip_prefix(b"=") {
            let (name, display) = match rest.find_byte(b' ') {
                Some(space) => (&rest[..space], &rest[space + 1..]),
                None => (rest, &b""[..]),
            };

            let target = if name.first() == Some(&b'-') {
                Some(LinkTarget::Special(parse_int(name).unwrap_or(0)))
            } else {
                if name.len() + 1 > LONG_LABEL {
                    self.ctx.warn_at(Some(&location), "Label is long.")?;
                }
                if name.is_empty() {
                    self.ctx
                        .error_at(Some(&location), "Explicit hot-link has no Label.")?;
                    None
                } else {
                    Some(LinkTarget::Label(BString::from(name)))
                }
            };

            if display.is_empty() {
                self.ctx
                    .warn_at(Some(&location), "Explicit hot-link has no title.")?;
            }
            (target, display.to_vec())
        } else {
            if raw.is_empty() {
                self.ctx
                    .error_at(Some(&location), "Implicit hot-link has no title.")?;
                return Ok(None);
            }
            let title = implicit_title(&raw);
            (Some(LinkTarget::Title(BString::from(title))), title.to_vec())
        };

        let Some(target) = target else {
            return Ok(None);
        };

        let index = self.tables.links.len();
        self.tables.links.push(Link::new(target, location));
        Ok(Some(ParsedLink { index, display }))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{compile, errors, warnings};
    use super::*;

    #[test]
    fn test_implicit_title_is_trimmed() {
        assert_eq!(implicit_title(b"  Zoom Box "), b"Zoom Box");
        assert_eq!(implicit_title(b"\"Quoted\""), b"Quoted");
        assert_eq!(implicit_title(b"\"\""), b"\"\"");
    }

    #[test]
    fn test_special_link() {
        let (source, ctx) = compile("~Topic=T\n{=-2 Index}\n");
        assert!(!ctx.has_errors());
        assert_eq!(source.tables.links[0].target, LinkTarget::Special(-2));
        assert!(source.tables.links[0].resolved.is_some());
    }

    #[test]
    fn test_malformed_links() {
        let (source, ctx) = compile("~Topic=T\n{}\n{= text}\n{=LBL}\n");
        assert_eq!(
            errors(&ctx),
            [
                "Implicit hot-link has no title.",
                "Explicit hot-link has no Label."
            ]
        );
        assert_eq!(warnings(&ctx), ["Explicit hot-link has no title."]);
        assert_eq!(source.tables.links.len(), 1);
    }

    #[test]
    fn test_unterminated_link_is_an_error() {
        let (_, ctx) = compile("~Topic=T\n{Other\nmore\n");
        assert_eq!(errors(&ctx), ["Hot-link has no closing curly-brace ('}')."]);
    }

    #[test]
    fn test_escaped_brace_is_text() {
        let (source, ctx) = compile("~Topic=T\n\\{not a link}\n");
        assert!(!ctx.has_errors());
        assert!(source.tables.links.is_empty());
    }

    #[test]
    fn test_link_location() {
        let (source, _) = compile("~Topic=T\n\nsee {There}\n");
        assert_eq!(source.tables.links[0].location.line, 3);
    }
}
