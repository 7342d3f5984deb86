//! The `DocContents` block.
//!
//! ```text
//! ~DocContents
//! {1, 0, "Introduction", FF}
//! {1.1, 1, Installing, "Setup", SETUP_LABEL}
//! ```
//!
//! Each entry is `{id, indent, name[, topic...][, FF]}`. A quoted name also
//! names the entry's first topic; further quoted items are topic titles and
//! unquoted ones are labels. Every entry becomes a dot-filled line in the
//! synthetic contents topic; its last three dots are later replaced by the
//! entry's page number.

use bstr::{BString, ByteSlice};

use crate::command::parse_int;
use crate::error::Result;
use crate::model::{Content, ContentRef, DOC_CONTENTS_TITLE, Topic, TopicFlags};
use crate::source::UntilEnd;

use super::{Compiler, MAX_COMMAND};

/// Width of the page number at the end of each contents line.
pub(crate) const PAGE_NUM_WIDTH: usize = 3;

/// Columns left after the dot leaders on a contents line.
const CONTENTS_MARGIN: usize = 10;

impl Compiler<'_> {
    pub(super) fn doc_contents(&mut self) -> Result<()> {
        self.tables.contents.push(Content {
            id: BString::default(),
            name: BString::default(),
            new_page: false,
            refs: vec![ContentRef::Title(DOC_CONTENTS_TITLE.into())],
            topics: Vec::new(),
            doc_page: None,
            page_num_pos: None,
            location: None,
        });

        loop {
            let Some(ch) = self.read_char()? else {
                break;
            };
            if ch.is(b'{') {
                self.content_entry()?;
            } else if ch.is(b'~') {
                self.reader.unread_char(ch)?;
                break;
            } else {
                self.out.push_char(ch.byte);
            }
            self.check_size()?;
        }

        let text = self.out.take();
        let handle = self.texts.store(&text)?;
        self.tables
            .topics
            .push(Topic::new(DOC_CONTENTS_TITLE, TopicFlags::default(), handle));
        Ok(())
    }

    /// Reads one comma-separated item. The flag is set when the item was
    /// the last of its entry.
    fn next_item(&mut self) -> Result<(Vec<u8>, bool)> {
        self.reader.skip_over(self.ctx, b" \t\n")?;
        let until = self.reader.read_until(self.ctx, MAX_COMMAND, b",}")?;
        let last = match until.end {
            UntilEnd::Stop(b'}') => true,
            UntilEnd::Stop(_) => false,
            UntilEnd::Eof => {
                self.error("Unexpected EOF in DocContent entry.")?;
                true
            }
            UntilEnd::TooLong => {
                self.error("DocContent item is too long.")?;
                true
            }
        };
        let mut text = until.text;
        while matches!(text.last(), Some(b' ' | b'\t' | b'\n')) {
            text.pop();
        }
        Ok((text, last))
    }

    /// Strips the quotes of a quoted item (its opening quote already gone).
    fn unquote(&mut self, item: &[u8]) -> Result<BString> {
        match item.strip_suffix(b"\"") {
            Some(inner) => Ok(inner.into()),
            None => {
                self.warn("Missing ending quote.")?;
                Ok(item.into())
            }
        }
    }

    fn content_entry(&mut self) -> Result<()> {
        let location = self.reader.location();

        let (id, last) = self.next_item()?;
        if last {
            return self.error("Unexpected end of DocContent entry.");
        }
        let (indent, last) = self.next_item()?;
        if last {
            return self.error("Unexpected end of DocContent entry.");
        }
        let indent = parse_int(&indent).unwrap_or(0).max(0) as usize;

        let (name, mut last) = self.next_item()?;
        let mut refs = Vec::new();
        let name = match name.strip_prefix(b"\"") {
            Some(quoted) => {
                let title = self.unquote(quoted)?;
                refs.push(ContentRef::Title(title.clone()));
                title
            }
            None => BString::from(name),
        };

        let page_num_pos = self.content_line(&id, indent, &name)?;

        let mut new_page = false;
        let mut overflow = false;
        while !last {
            let (item, is_last) = self.next_item()?;
            last = is_last;

            if item.eq_ignore_ascii_case(b"FF") {
                if new_page {
                    self.warn("FF already present in this entry.")?;
                }
                new_page = true;
                continue;
            }

            if refs.len() >= self.config.limits.max_content_topics {
                if !overflow {
                    self.error("Too many topics in DocContent entry.")?;
                    overflow = true;
                }
                continue;
            }
            let target = match item.strip_prefix(b"\"") {
                Some(quoted) => ContentRef::Title(self.unquote(quoted)?),
                None => ContentRef::Label(item.into()),
            };
            refs.push(target);
        }

        self.tables.contents.push(Content {
            id: id.into(),
            name,
            new_page,
            refs,
            topics: Vec::new(),
            doc_page: None,
            page_num_pos: Some(page_num_pos),
            location: Some(location),
        });
        Ok(())
    }

    /// Writes `id  <indent>name.....` and returns where the page number
    /// goes.
    fn content_line(&mut self, id: &[u8], indent: usize, name: &[u8]) -> Result<usize> {
        let mut line = id.to_vec();
        line.resize(line.len().max(5), b' ');
        line.push(b' ');
        line.resize(line.len() + indent * 2, b' ');
        line.extend_from_slice(name);

        let fill_to = self
            .config
            .document
            .width
            .saturating_sub(CONTENTS_MARGIN);
        if line.len() + PAGE_NUM_WIDTH > fill_to {
            self.warn(format!(
                "DocContent entry \"{}\" is too long for its page number.",
                name.as_bstr()
            ))?;
        }
        let end = fill_to.max(line.len() + PAGE_NUM_WIDTH);
        line.resize(end, b'.');

        self.out.push_text(&line);
        Ok(self.out.len() - PAGE_NUM_WIDTH)
    }
}
