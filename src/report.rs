//! Statistics and memory usage reports for a compile.

use std::fmt;
use std::mem::size_of;

use crate::compiler::HelpSource;
use crate::model::{Content, ContentRef, Label, Link, Page, Topic};

/// Counts of what a source defines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct Stats {
    pub topics: usize,
    pub links: usize,
    pub labels: usize,
    pub private_labels: usize,
    pub contents: usize,
    pub online_pages: usize,
    pub document_pages: u32,
}

impl Stats {
    pub fn collect(source: &HelpSource, document_pages: u32) -> Self {
        let tables = &source.tables;
        Self {
            topics: tables.topics.len(),
            links: tables.links.len(),
            labels: tables.public_labels().count(),
            private_labels: tables.private_labels().count(),
            contents: tables.contents.len(),
            online_pages: tables.topics.iter().map(|t| t.pages.len()).sum(),
            document_pages,
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Statistics:")?;
        writeln!(f, "{:8} Topics", self.topics)?;
        writeln!(f, "{:8} Links", self.links)?;
        writeln!(f, "{:8} Labels", self.labels)?;
        writeln!(f, "{:8} Private labels", self.private_labels)?;
        writeln!(f, "{:8} Table of contents (DocContent) entries", self.contents)?;
        writeln!(f, "{:8} Online help pages", self.online_pages)?;
        writeln!(f, "{:8} Document pages", self.document_pages)
    }
}

/// Where the compiler's memory went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(serde::Serialize))]
pub struct MemoryReport {
    /// Titles, names and contents references.
    pub strings: usize,
    /// Table records.
    pub data: usize,
    /// Topic text held in swap storage.
    pub topic_text: u64,
    /// Largest topic text resident at one time.
    pub peak_resident: usize,
}

impl MemoryReport {
    pub fn collect(source: &HelpSource) -> Self {
        let tables = &source.tables;
        let mut strings = 0;
        let mut data = 0;

        for topic in &tables.topics {
            data += size_of::<Topic>() + topic.pages.len() * size_of::<Page>();
            strings += topic.title.len();
        }
        for link in &tables.links {
            data += size_of::<Link>();
            strings += link.target_name().map_or(0, |name| name.len());
        }
        for label in &tables.labels {
            data += size_of::<Label>();
            strings += label.name.len();
        }
        for content in &tables.contents {
            data += size_of::<Content>()
                + content.refs.len() * size_of::<ContentRef>()
                + content.topics.len() * size_of::<usize>();
            strings += content.id.len() + content.name.len();
            strings += content.refs.iter().map(|r| r.name().len()).sum::<usize>();
        }

        Self {
            strings,
            data,
            topic_text: source.texts.stored_bytes(),
            peak_resident: source.texts.peak_resident(),
        }
    }
}

impl fmt::Display for MemoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memory Usage:")?;
        writeln!(f, "{:8} Bytes in strings.", self.strings)?;
        writeln!(f, "{:8} Bytes in data.", self.data)?;
        writeln!(f, "{:8} Bytes resident topic text (peak).", self.peak_resident)?;
        writeln!(f, "--------")?;
        writeln!(
            f,
            "{:8} Bytes total.",
            self.strings + self.data + self.peak_resident
        )?;
        writeln!(f)?;
        writeln!(f, "Disk Usage:")?;
        writeln!(f, "{:8} Bytes in topic text.", self.topic_text)
    }
}
