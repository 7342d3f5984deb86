use bstr::ByteSlice;

use crate::command::{CommandError, TableArgs, table_args};
use crate::error::{Error, Result};
use crate::source::UntilEnd;

use super::{Compiler, MAX_COMMAND};

fn char_lit(byte: u8) -> String {
    if (0x20..=0x7E).contains(&byte) {
        format!("'{}'", byte as char)
    } else {
        format!("'\\x{byte:02X}'")
    }
}

impl Compiler<'_> {
    /// `Table=width cols indent`: reads hot-links up to `EndTable` and lays
    /// them out column by column.
    pub(super) fn table(&mut self, args: &[u8]) -> Result<()> {
        let Some(TableArgs {
            width,
            cols,
            indent,
            trailing,
        }) = table_args(args)
        else {
            return self.command_error("Too few arguments to Table.");
        };
        if !trailing.is_empty() {
            self.command_error(
                CommandError::TrailingText(trailing.to_str_lossy().into_owned()).to_string(),
            )?;
        }
        let max = self.config.online.width as i32;
        if width <= 0 || width > max || cols <= 0 || indent < 0 || indent > max {
            return self.command_error("Argument out of range.");
        }
        let (width, cols, indent) = (width as usize, cols as usize, indent as usize);

        let mut links: Vec<(usize, Vec<u8>)> = Vec::new();
        let mut done = false;

        while !done {
            let ch = loop {
                match self.read_char()? {
                    Some(ch) if ch.is(b'\n') || ch.is(b' ') => continue,
                    other => break other,
                }
            };

            let Some(ch) = ch else {
                return self.error("Unexpected EOF in a Table.");
            };

            if ch.is(b'{') {
                let max_links = self.config.limits.max_table_links;
                if links.len() >= max_links {
                    return Err(Error::TableTooLarge(max_links));
                }
                if let Some(link) = self.parse_link()? {
                    let mut display = link.display;
                    if display.len() >= width {
                        self.warn("Link is too long; truncating.")?;
                        display.truncate(width - 1);
                    }
                    links.push((link.index, display));
                }
            } else if ch.is(b'~') {
                let imbedded = self.read_imbedded()?;
                let until = self.reader.read_until(self.ctx, MAX_COMMAND, b")\n,")?;
                if until.end == UntilEnd::Eof {
                    return self.error("Unexpected EOF in a Table.");
                }
                if until.text.eq_ignore_ascii_case(b"EndTable") {
                    done = true;
                } else {
                    self.error(format!(
                        "Unexpected command in table \"{}\"",
                        until.text.as_bstr()
                    ))?;
                    self.warn("Command will be ignored.")?;
                }
                if until.end == UntilEnd::Stop(b',') {
                    self.requeue_chain(imbedded)?;
                }
            } else {
                self.error(format!("Unexpected character {}.", char_lit(ch.byte)))?;
            }
        }

        let rows = 1 + links.len() / cols;
        for row in 0..rows {
            self.put_spaces(indent)?;
            for col in 0..cols {
                let Some((index, title)) = links.get(col * rows + row) else {
                    break;
                };
                self.out.push_link(*index, title);
                if col < cols - 1 {
                    let pad = width - title.len();
                    self.put_spaces(pad)?;
                }
            }
            self.out.push_raw(b'\n');
        }
        Ok(())
    }

    /// Skips a `Comment` block up to its `EndComment`.
    pub(super) fn comment(&mut self) -> Result<()> {
        loop {
            let Some(ch) = self.read_char()? else {
                return self.error("Unexpected EOF in Comment");
            };
            if !ch.is(b'~') {
                continue;
            }
            let imbedded = self.read_imbedded()?;
            let until = self.reader.read_until(self.ctx, MAX_COMMAND, b")\n,")?;
            if until.text.eq_ignore_ascii_case(b"EndComment") {
                if until.end == UntilEnd::Stop(b',') {
                    self.requeue_chain(imbedded)?;
                }
                return Ok(());
            }
            if until.end == UntilEnd::Eof {
                return self.error("Unexpected EOF in Comment");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{compile, errors, topic_text, warnings};
    use super::*;
    use crate::text::{
        CMD_LINK, CMD_SPACE, LINK_SLOT_SIZE, Mode, Token, line_width, link_display,
        link_positions, scan,
    };

    fn line_widths(text: &[u8]) -> Vec<usize> {
        let mut widths = Vec::new();
        let mut pos = 0;
        while pos < text.len() {
            widths.push(line_width(&text[pos..], Mode::Online));
            loop {
                let s = scan(&text[pos..], Mode::Online);
                pos += s.size;
                match s.token {
                    Token::Newline => break,
                    Token::Done => return widths,
                    _ => {}
                }
            }
        }
        widths
    }

    fn table_source(links: usize, args: &str) -> String {
        let mut src = format!("~Topic=T\n~Table={args}\n");
        for i in 0..links {
            src.push_str(&format!("{{Link{i}}}\n"));
        }
        src.push_str("~EndTable\n");
        src
    }

    #[test]
    fn test_column_major_layout() {
        let (mut source, ctx) = compile(&table_source(5, "10 2 0"));
        assert!(!ctx.has_errors());
        let text = topic_text(&mut source, 0);
        let lines: Vec<&[u8]> = text.split(|&b| b == b'\n').collect();
        // three rows and the empty tail after the final newline
        assert_eq!(lines.len(), 4);

        let order: Vec<Vec<u8>> = link_positions(&text)
            .into_iter()
            .map(|pos| link_display(&text[pos..pos + 1 + LINK_SLOT_SIZE + 6]).to_vec())
            .collect();
        let expected: Vec<Vec<u8>> = [0, 3, 1, 4, 2]
            .iter()
            .map(|i| format!("Link{i}").into_bytes())
            .collect();
        assert_eq!(order, expected);

        // the last row has only its first column, padded to the width
        let last = lines[2];
        assert_eq!(last[0], CMD_LINK);
        assert_eq!(&last[last.len() - 2..], &[CMD_SPACE, 5]);
    }

    #[test]
    fn test_comma_separated_arguments() {
        let (source, ctx) = compile(&table_source(2, "10,2,0"));
        assert!(!ctx.has_errors(), "{:?}", errors(&ctx));
        assert_eq!(source.tables.links.len(), 2);
    }

    #[test]
    fn test_bad_arguments() {
        let (_, ctx) = compile("~Topic=T\n~Table=10 2\n");
        assert_eq!(errors(&ctx), ["Too few arguments to Table."]);
        let (_, ctx) = compile("~Topic=T\n~Table=100 2 0\n");
        assert_eq!(errors(&ctx), ["Argument out of range."]);
    }

    #[test]
    fn test_text_after_arguments_is_an_error() {
        let (source, ctx) = compile(&table_source(2, "10 2 0 junk"));
        assert_eq!(errors(&ctx), ["Invalid text after a command \"junk\""]);
        assert_eq!(source.tables.links.len(), 2);
    }

    #[test]
    fn test_long_titles_are_truncated() {
        let src = "~Topic=T\n~Table=5 1 0\n{Very Long Title}\n~EndTable\n";
        let (mut source, ctx) = compile(src);
        assert_eq!(warnings(&ctx), ["Link is too long; truncating."]);
        let text = topic_text(&mut source, 0);
        let pos = link_positions(&text)[0];
        assert_eq!(link_display(&text[pos..pos + 1 + LINK_SLOT_SIZE + 5]), b"Very");
    }

    #[test]
    fn test_rows_stay_within_table_width() {
        let mut src = String::from("~Topic=T\n~Table=10 3 4\n");
        for i in 0..7 {
            src.push_str(&format!("{{Entry {i}}}\n"));
        }
        src.push_str("{A Title Far Wider Than Ten}\n~EndTable\n");

        let (mut source, ctx) = compile(&src);
        assert!(!ctx.has_errors(), "{:?}", errors(&ctx));
        assert_eq!(warnings(&ctx), ["Link is too long; truncating."]);

        let text = topic_text(&mut source, 0);
        let widths = line_widths(&text);
        assert_eq!(widths.len(), 3);
        assert!(widths.iter().all(|&w| w <= 3 * 10 + 4), "{widths:?}");

        let truncated: Vec<_> = link_positions(&text)
            .into_iter()
            .map(|pos| {
                let end = pos + scan(&text[pos..], Mode::Raw).size;
                link_display(&text[pos..end]).to_vec()
            })
            .filter(|d| d.starts_with(b"A Title"))
            .collect();
        assert_eq!(truncated, [b"A Title F".to_vec()]);
    }

    #[test]
    fn test_stray_text_in_table() {
        let (_, ctx) = compile("~Topic=T\n~Table=10 1 0\nx\n~Center+\n~EndTable\n");
        assert_eq!(
            errors(&ctx),
            [
                "Unexpected character 'x'.",
                "Unexpected command in table \"Center+\""
            ]
        );
        assert_eq!(warnings(&ctx), ["Command will be ignored."]);
    }

    #[test]
    fn test_table_too_large() {
        let config = crate::config::HelpConfig::default().with_limits(crate::config::Limits {
            max_table_links: 2,
            ..Default::default()
        });
        let mut ctx = crate::diagnostics::CompileContext::new(&config.limits);
        let src = table_source(3, "10 1 0").into_bytes();
        let result = super::super::read_source_bytes("t.src", src, &config, &mut ctx);
        assert!(matches!(result, Err(Error::TableTooLarge(2))));
    }

    #[test]
    fn test_comment_with_imbedded_end() {
        let (mut source, ctx) = compile("~Topic=T\nA ~(Comment)hidden~(EndComment,Center+)B\n");
        assert!(!ctx.has_errors());
        let text = topic_text(&mut source, 0);
        assert!(text.find(b"hidden").is_none());
    }
}
