//! Symbol tables built while compiling.
//!
//! Topics own their text (through a [`TextHandle`] into swap storage).
//! Labels, links and contents entries refer to topics by index.

use bstr::{BString, ByteSlice};

use crate::diagnostics::SourceLocation;
use crate::swap::TextHandle;

pub type TopicId = usize;

/// Name of the label that must sort first in the label table.
pub const INDEX_LABEL: &str = "HELP_INDEX";

/// Title of the synthetic topic holding the table of contents.
pub const DOC_CONTENTS_TITLE: &str = "DocContent";

/// Sigil that marks a label as private.
pub const PRIVATE_SIGIL: u8 = b'@';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TopicFlags {
    pub in_document: bool,
    pub data_only: bool,
}

impl TopicFlags {
    pub const IN_DOCUMENT: u32 = 1;
    pub const DATA_ONLY: u32 = 2;

    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.in_document {
            bits |= Self::IN_DOCUMENT;
        }
        if self.data_only {
            bits |= Self::DATA_ONLY;
        }
        bits
    }
}

/// One screenful of a topic, as a slice of its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub length: u32,
    /// Margin of the paragraph the page starts in, or -1 when the page does
    /// not start inside a paragraph.
    pub margin: i32,
}

#[derive(Debug, Clone)]
pub struct Topic {
    pub title: BString,
    pub flags: TopicFlags,
    pub pages: Vec<Page>,
    pub text: TextHandle,
    /// First document page, once the document has been paginated.
    pub doc_page: Option<u32>,
    /// Offset of the topic record in the help file, relative to the end of
    /// the signature.
    pub offset: u32,
}

impl Topic {
    pub fn new(title: impl Into<BString>, flags: TopicFlags, text: TextHandle) -> Self {
        Self {
            title: title.into(),
            flags,
            pages: Vec::new(),
            text,
            doc_page: None,
            offset: 0,
        }
    }

    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    pub fn is_data(&self) -> bool {
        self.flags.data_only
    }
}

/// Whether a label is listed in the generated header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn of(name: &[u8]) -> Self {
        if name.first() == Some(&PRIVATE_SIGIL) {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }
}

#[derive(Debug, Clone)]
pub struct Label {
    pub name: BString,
    pub visibility: Visibility,
    pub topic: TopicId,
    /// Byte offset of the label within its topic's text.
    pub offset: u32,
    pub doc_page: Option<u32>,
}

impl Label {
    pub fn new(name: impl Into<BString>, topic: TopicId, offset: u32) -> Self {
        let name = name.into();
        Self {
            visibility: Visibility::of(&name),
            name,
            topic,
            offset,
            doc_page: None,
        }
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    /// The display text names a topic title.
    Title(BString),
    /// `{=label text}`.
    Label(BString),
    /// `{=-N text}`: a fixed topic number known to the viewer.
    Special(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLink {
    pub topic: i32,
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct Link {
    pub target: LinkTarget,
    pub location: SourceLocation,
    pub resolved: Option<ResolvedLink>,
    pub doc_page: Option<u32>,
}

impl Link {
    pub fn new(target: LinkTarget, location: SourceLocation) -> Self {
        let resolved = match target {
            LinkTarget::Special(topic) => Some(ResolvedLink { topic, offset: 0 }),
            _ => None,
        };
        Self {
            target,
            location,
            resolved,
            doc_page: None,
        }
    }

    /// Title or label the link names; special links have none.
    pub fn target_name(&self) -> Option<&[u8]> {
        match &self.target {
            LinkTarget::Title(name) | LinkTarget::Label(name) => Some(name.as_slice()),
            LinkTarget::Special(_) => None,
        }
    }
}

/// A topic named by a contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    Title(BString),
    Label(BString),
}

impl ContentRef {
    pub fn name(&self) -> &BString {
        match self {
            ContentRef::Title(name) | ContentRef::Label(name) => name,
        }
    }
}

/// One row of the table of contents.
#[derive(Debug, Clone)]
pub struct Content {
    pub id: BString,
    pub name: BString,
    pub new_page: bool,
    pub refs: Vec<ContentRef>,
    /// Resolved `refs`, in order.
    pub topics: Vec<TopicId>,
    pub doc_page: Option<u32>,
    /// Where the page number goes in the contents topic's text.
    pub page_num_pos: Option<usize>,
    pub location: Option<SourceLocation>,
}

impl Content {
    pub const NEW_PAGE: u32 = 1;

    pub fn flags(&self) -> u32 {
        if self.new_page { Self::NEW_PAGE } else { 0 }
    }
}

#[derive(Debug, Default)]
pub struct SymbolTables {
    pub topics: Vec<Topic>,
    pub labels: Vec<Label>,
    pub links: Vec<Link>,
    pub contents: Vec<Content>,
}

/// Trims blanks and, for titles longer than two characters, one pair of
/// surrounding quotes.
fn normalize_title(title: &[u8]) -> &[u8] {
    let title = title.trim_with(|c| c == ' ');
    match title {
        [b'"', inner @ .., b'"'] if title.len() > 2 => inner,
        _ => title,
    }
}

impl SymbolTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive title lookup.
    pub fn find_topic_title(&self, title: &[u8]) -> Option<TopicId> {
        let title = normalize_title(title);
        self.topics
            .iter()
            .position(|t| t.title.as_slice().eq_ignore_ascii_case(title))
    }

    pub fn find_label(&self, name: &[u8]) -> Option<usize> {
        self.labels.iter().position(|l| l.name.as_slice() == name)
    }

    pub fn public_labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter().filter(|l| l.is_public())
    }

    pub fn private_labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter().filter(|l| !l.is_public())
    }

    /// Labels of `topic`, in increasing offset order.
    pub fn labels_in_topic(&self, topic: TopicId) -> Vec<usize> {
        let mut found: Vec<usize> = (0..self.labels.len())
            .filter(|&i| self.labels[i].topic == topic)
            .collect();
        found.sort_by_key(|&i| self.labels[i].offset);
        found
    }

    /// Sorts labels by name, the index label first.
    pub fn sort_labels(&mut self) {
        self.labels.sort_by(|a, b| {
            let a_index = a.name == INDEX_LABEL;
            let b_index = b.name == INDEX_LABEL;
            b_index.cmp(&a_index).then_with(|| a.name.cmp(&b.name))
        });
    }

    pub fn max_pages(&self) -> usize {
        self.topics.iter().map(|t| t.pages.len()).max().unwrap_or(0)
    }
}
