use super::{CMD_LINK, Mode, Token, scan};

/// Bytes between the opening `CMD_LINK` and the display text.
pub const LINK_SLOT_SIZE: usize = 12;

/// The three little-endian integers carried by every hot-link in the text.
///
/// While compiling, only the first holds anything: the link's index in the
/// link table. The writer replaces the slot with the resolved target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSlot {
    Pending(usize),
    Resolved {
        topic: i32,
        offset: u32,
        doc_page: Option<u32>,
    },
}

impl LinkSlot {
    pub fn encode(&self) -> [u8; LINK_SLOT_SIZE] {
        let (a, b, c) = match *self {
            LinkSlot::Pending(index) => (index as i32, 0, 0),
            LinkSlot::Resolved {
                topic,
                offset,
                doc_page,
            } => (
                topic,
                offset as i32,
                doc_page.map_or(-1, |page| page as i32),
            ),
        };
        let mut out = [0u8; LINK_SLOT_SIZE];
        out[0..4].copy_from_slice(&a.to_le_bytes());
        out[4..8].copy_from_slice(&b.to_le_bytes());
        out[8..12].copy_from_slice(&c.to_le_bytes());
        out
    }

    /// Reads the link-table index from a link token (starting at its
    /// opening `CMD_LINK`).
    pub fn pending_index(token: &[u8]) -> usize {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&token[1..5]);
        u32::from_le_bytes(raw) as usize
    }

    /// Decodes a resolved slot from a link token.
    pub fn resolved(token: &[u8]) -> LinkSlot {
        let int = |at: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&token[1 + at..5 + at]);
            i32::from_le_bytes(raw)
        };
        let page = int(8);
        LinkSlot::Resolved {
            topic: int(0),
            offset: int(4) as u32,
            doc_page: (page >= 0).then_some(page as u32),
        }
    }

    /// Overwrites the slot of the link token starting at `token[0]`.
    pub fn write_into(&self, token: &mut [u8]) {
        token[1..1 + LINK_SLOT_SIZE].copy_from_slice(&self.encode());
    }
}

/// Display text of a link token, literal prefixes included.
pub fn link_display(token: &[u8]) -> &[u8] {
    let start = (1 + LINK_SLOT_SIZE).min(token.len());
    let end = match token.last() {
        Some(&CMD_LINK) if token.len() > start => token.len() - 1,
        _ => token.len(),
    };
    &token[start..end]
}

/// Byte offsets of every hot-link token in `text`.
pub fn link_positions(text: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let s = scan(&text[pos..], Mode::Raw);
        if s.token == Token::Link {
            positions.push(pos);
        }
        pos += s.size;
    }
    positions
}
