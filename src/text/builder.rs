use super::{CMD_LINK, CMD_LITERAL, CMD_PARA, CMD_SPACE, LinkSlot, MAX_CMD, is_hyphen};

/// Growable buffer for one topic's encoded text.
///
/// The buffer grows freely, but callers check [`TextBuilder::is_full`] after
/// each source character; a topic that reaches the limit is a fatal error.
#[derive(Debug, Clone)]
pub struct TextBuilder {
    buf: Vec<u8>,
    limit: usize,
}

impl TextBuilder {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() >= self.limit
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Hands out the accumulated text, leaving the builder empty.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    pub fn last(&self) -> Option<u8> {
        self.buf.last().copied()
    }

    pub fn push_raw(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pushes a text byte, protecting values that collide with control codes.
    pub fn push_char(&mut self, byte: u8) {
        if byte <= MAX_CMD {
            self.buf.push(CMD_LITERAL);
        }
        self.buf.push(byte);
    }

    pub fn push_text(&mut self, text: &[u8]) {
        for &b in text {
            self.push_char(b);
        }
    }

    /// Pushes `count` blanks. With compression on, runs of three or more
    /// become a single space-run code (at most 255 wide).
    pub fn push_spaces(&mut self, count: usize, compress: bool) {
        if count > 2 && compress {
            self.buf.push(CMD_SPACE);
            self.buf.push(count.min(255) as u8);
        } else {
            self.buf.resize(self.buf.len() + count, b' ');
        }
    }

    /// Starts a paragraph and returns the position of its margin byte,
    /// which is patched once the second line is seen.
    pub fn start_para(&mut self, indent: usize, margin: usize) -> usize {
        self.buf.push(CMD_PARA);
        self.buf.push(indent.min(255) as u8);
        self.buf.push(margin.min(255) as u8);
        self.buf.len() - 1
    }

    pub fn set(&mut self, pos: usize, byte: u8) {
        self.buf[pos] = byte;
    }

    /// Pushes a hot-link placeholder holding the link-table index.
    pub fn push_link(&mut self, index: usize, display: &[u8]) {
        self.buf.push(CMD_LINK);
        self.buf.extend_from_slice(&LinkSlot::Pending(index).encode());
        self.push_text(display);
        self.buf.push(CMD_LINK);
    }

    fn ends_sentence(&self) -> bool {
        let mut rest = self.buf.as_slice();
        if let [head @ .., b')'] = rest {
            rest = head;
        }
        if let [head @ .., b'"'] = rest {
            rest = head;
        }
        matches!(rest.last(), Some(b'.' | b'?' | b'!'))
    }

    /// Adds the blank that joins two physical lines of a paragraph: none
    /// after a hyphen, two after the end of a sentence, otherwise one.
    pub fn add_blank_for_split(&mut self) {
        let Some(last) = self.buf.len().checked_sub(1) else {
            return;
        };
        if is_hyphen(&self.buf, last) {
            return;
        }
        if self.ends_sentence() {
            self.buf.push(b' ');
        }
        self.buf.push(b' ');
    }
}
