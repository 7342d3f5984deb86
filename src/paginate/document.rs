//! Printed-document layout.
//!
//! [`process_document`] walks the table of contents and lays every topic
//! it names out on printed pages. It pulls sections, topic text and link
//! pages from a [`DocumentSource`] and pushes layout events to a
//! [`DocumentSink`]. The same walk both numbers the pages
//! ([`PageRecorder`]) and prints them
//! ([`DocumentPrinter`](crate::print::DocumentPrinter)), so the two always
//! agree.

use bstr::BString;

use crate::compiler::HelpSource;
use crate::config::{DocumentGeometry, HelpConfig};
use crate::diagnostics::CompileContext;
use crate::error::Result;
use crate::model::{SymbolTables, TopicId};
use crate::resolve;
use crate::swap::TopicTexts;
use crate::text::{LinkSlot, Mode, Token, line_width, link_display, scan};

/// Columns kept for a page reference inside a reflowed paragraph, so the
/// layout does not move when real page numbers replace placeholders.
const PAGE_REF_WIDTH: usize = 8;

/// Columns kept for ` (p. N)` after a hot-link outside a paragraph.
const LINK_PAGE_WIDTH: usize = 9;

/// One table of contents entry, as the layout sees it.
#[derive(Debug, Clone)]
pub struct Section {
    /// Index in the contents table.
    pub index: usize,
    pub id: BString,
    pub title: BString,
    pub new_page: bool,
}

/// Text of one topic in a section.
#[derive(Debug)]
pub struct DocTopic {
    pub id: TopicId,
    pub text: Vec<u8>,
}

/// Supplies the document's structure.
pub trait DocumentSource {
    fn next_section(&mut self) -> Result<Option<Section>>;

    /// The next topic of the current section.
    fn next_topic(&mut self) -> Result<Option<DocTopic>>;

    /// Document page of the target of link-table entry `link`, if the
    /// target is in the document.
    fn link_page(&mut self, link: usize) -> Result<Option<u32>>;

    fn release_topic(&mut self, topic: DocTopic);
}

/// Receives layout events. Every event defaults to doing nothing.
#[allow(unused_variables)]
pub trait DocumentSink {
    fn heading(&mut self, page: u32) -> Result<()> {
        Ok(())
    }

    fn footing(&mut self, page: u32) -> Result<()> {
        Ok(())
    }

    /// Body text, possibly holding literal prefixes.
    fn print(&mut self, text: &[u8]) -> Result<()> {
        Ok(())
    }

    fn print_n(&mut self, byte: u8, count: usize) -> Result<()> {
        Ok(())
    }

    fn start_section(&mut self, section: &Section) -> Result<()> {
        Ok(())
    }

    /// Prints a section title line.
    fn print_section(&mut self, section: &Section) -> Result<()> {
        Ok(())
    }

    fn set_section_page(&mut self, page: u32) -> Result<()> {
        Ok(())
    }

    fn start_topic(&mut self, topic: TopicId) -> Result<()> {
        Ok(())
    }

    fn set_topic_page(&mut self, page: u32) -> Result<()> {
        Ok(())
    }

    /// Called as the walk passes byte `pos` of the current topic.
    fn periodic(&mut self, pos: usize, page: u32) -> Result<()> {
        Ok(())
    }
}

struct Layout<'g, S: ?Sized, K: ?Sized> {
    geometry: &'g DocumentGeometry,
    source: &'g mut S,
    sink: &'g mut K,
    page: u32,
    line: usize,
    col: usize,
}

impl<S, K> Layout<'_, S, K>
where
    S: DocumentSource + ?Sized,
    K: DocumentSink + ?Sized,
{
    fn turn_page(&mut self) -> Result<()> {
        self.sink.footing(self.page)?;
        self.page += 1;
        self.line = 0;
        self.sink.heading(self.page)
    }

    fn newline(&mut self) -> Result<()> {
        self.sink.print_n(b'\n', 1)
    }

    fn run(&mut self) -> Result<()> {
        self.sink.heading(self.page)?;

        let mut first_section = true;
        while let Some(section) = self.source.next_section()? {
            self.sink.start_section(&section)?;

            let room = self
                .geometry
                .depth
                .saturating_sub(self.geometry.content_break);
            if section.new_page && self.line != 0 {
                self.turn_page()?;
            } else if self.line + 2 > room {
                self.turn_page()?;
            } else if self.line > 0 {
                self.sink.print_n(b'\n', 2)?;
                self.line += 2;
            }

            self.sink.set_section_page(self.page)?;
            if !first_section {
                self.sink.print_section(&section)?;
                self.line += 1;
            }

            let mut first_topic = true;
            while let Some(topic) = self.source.next_topic()? {
                self.sink.start_topic(topic.id)?;
                let result = self.topic(&topic.text, first_section, first_topic);
                self.source.release_topic(topic);
                result?;
                first_topic = false;
            }
            first_section = false;
        }

        self.sink.footing(self.page)
    }

    fn topic(&mut self, text: &[u8], first_section: bool, first_topic: bool) -> Result<()> {
        let mut pos = 0;

        // The contents topic keeps its leading blank lines.
        if !first_section {
            while pos < text.len() {
                let s = scan(&text[pos..], Mode::Document);
                match s.token {
                    Token::ExcludeDocument | Token::ExcludeOnline | Token::Newline => {
                        pos += s.size
                    }
                    _ => break,
                }
            }
            if first_topic && pos < text.len() {
                self.newline()?;
                self.line += 1;
            }
        }

        if self.line > self.geometry.depth.saturating_sub(self.geometry.topic_break) {
            self.turn_page()?;
        } else if !first_topic {
            self.newline()?;
            self.line += 1;
        }

        self.sink.set_topic_page(self.page)?;
        self.body(text, pos)
    }

    fn body(&mut self, text: &[u8], mut pos: usize) -> Result<()> {
        let mut skip_blanks = false;
        self.col = 0;

        loop {
            self.sink.periodic(pos, self.page)?;

            let s = scan(&text[pos..], Mode::Document);
            let mut size = s.size;
            let mut width = s.width;

            match s.token {
                Token::Para => {
                    pos = self.paragraph(text, pos)?;
                    skip_blanks = false;
                    size = 0;
                    width = 0;
                }

                Token::Newline => {
                    if !(skip_blanks && self.col == 0) {
                        self.line += 1;
                        let blank_room = self
                            .geometry
                            .depth
                            .saturating_sub(self.geometry.blank_break);
                        if self.line >= self.geometry.depth
                            || (self.col == 0 && self.line >= blank_room)
                        {
                            if self.col != 0 {
                                self.newline()?;
                            }
                            self.turn_page()?;
                            skip_blanks = true;
                        } else {
                            self.newline()?;
                        }
                        self.col = 0;
                    }
                }

                Token::FormFeed => {
                    if !skip_blanks {
                        self.col = 0;
                        self.turn_page()?;
                    }
                }

                Token::Center => {
                    let line = line_width(&text[pos + size..], Mode::Document);
                    width = self.geometry.width.saturating_sub(line) / 2;
                    self.sink.print_n(b' ', width)?;
                }

                Token::Link => {
                    skip_blanks = false;
                    let token = &text[pos..pos + size];
                    self.sink.print(link_display(token))?;
                    if let Some(page) = self.link_page(token)? {
                        width += LINK_PAGE_WIDTH;
                        self.sink.print(format!(" (p. {page})").as_bytes())?;
                    }
                }

                Token::Word => {
                    skip_blanks = false;
                    self.sink.print(&text[pos..pos + size])?;
                }

                Token::Space => {
                    skip_blanks = false;
                    self.sink.print_n(b' ', width)?;
                }

                Token::Done | Token::ExcludeOnline | Token::ExcludeDocument => {}
            }

            pos += size;
            self.col += width;
            if pos >= text.len() {
                break;
            }
        }

        // labels at the very end of the topic
        self.sink.periodic(pos, self.page)
    }

    fn link_page(&mut self, token: &[u8]) -> Result<Option<u32>> {
        if token.len() < 5 {
            return Ok(None);
        }
        self.source.link_page(LinkSlot::pending_index(token))
    }

    /// Lays out the paragraph starting at `pos` and returns the position of
    /// the token that ended it.
    fn paragraph(&mut self, text: &[u8], mut pos: usize) -> Result<usize> {
        let indent = text.get(pos + 1).copied().unwrap_or(0) as usize;
        let margin = text.get(pos + 2).copied().unwrap_or(0) as usize;
        pos = (pos + 3).min(text.len());

        self.sink.print_n(b' ', indent)?;
        self.col = indent;

        loop {
            self.sink.periodic(pos, self.page)?;

            let s = scan(&text[pos..], Mode::Document);
            match s.token {
                Token::Newline | Token::FormFeed => break,
                Token::Done | Token::Para => {
                    self.col = 0;
                    self.line += 1;
                    self.newline()?;
                    break;
                }
                Token::ExcludeOnline | Token::ExcludeDocument | Token::Center => {}
                Token::Link => {
                    let token = &text[pos..pos + s.size];
                    let display = link_display(token);
                    let mut at = 0;
                    while at < display.len() {
                        let w = scan(&display[at..], Mode::Document);
                        if w.size == 0 {
                            break;
                        }
                        self.flow(w.token, &display[at..at + w.size], w.width, margin)?;
                        at += w.size;
                    }
                    if let Some(page) = self.link_page(token)? {
                        let reference = format!("(p. {page})");
                        let width = reference.len().max(PAGE_REF_WIDTH);
                        self.flow(Token::Space, b" ", 1, margin)?;
                        self.flow(Token::Word, reference.as_bytes(), width, margin)?;
                    }
                }
                Token::Space | Token::Word => {
                    self.flow(s.token, &text[pos..pos + s.size], s.width, margin)?;
                }
            }
            pos += s.size;
        }

        Ok(pos)
    }

    /// Places one word or blank of a paragraph, wrapping to `margin`.
    fn flow(&mut self, token: Token, bytes: &[u8], width: usize, margin: usize) -> Result<()> {
        let mut width = width;
        if self.col + width > self.geometry.width {
            self.newline()?;
            self.line += 1;
            if self.line >= self.geometry.depth {
                self.turn_page()?;
            }
            if token == Token::Space {
                width = 0;
            }
            self.sink.print_n(b' ', margin)?;
            self.col = margin;
        }

        if width > 0 {
            if token == Token::Space {
                self.sink.print_n(b' ', width)?;
            } else {
                self.sink.print(bytes)?;
            }
        }
        self.col += width;
        Ok(())
    }
}

/// Walks the document, reporting layout to `sink`.
pub fn process_document<S, K>(
    geometry: &DocumentGeometry,
    source: &mut S,
    sink: &mut K,
) -> Result<()>
where
    S: DocumentSource + ?Sized,
    K: DocumentSink + ?Sized,
{
    Layout {
        geometry,
        source,
        sink,
        page: 1,
        line: 0,
        col: 0,
    }
    .run()
}

/// Feeds the contents of a compiled source to [`process_document`].
pub struct ContentsFeed<'a> {
    tables: &'a SymbolTables,
    texts: &'a mut TopicTexts,
    ctx: &'a mut CompileContext,
    warn_links: bool,
    content: Option<usize>,
    topic: usize,
}

impl<'a> ContentsFeed<'a> {
    pub fn new(
        tables: &'a SymbolTables,
        texts: &'a mut TopicTexts,
        ctx: &'a mut CompileContext,
        warn_links: bool,
    ) -> Self {
        Self {
            tables,
            texts,
            ctx,
            warn_links,
            content: None,
            topic: 0,
        }
    }
}

impl DocumentSource for ContentsFeed<'_> {
    fn next_section(&mut self) -> Result<Option<Section>> {
        let index = self.content.map_or(0, |c| c + 1);
        let Some(content) = self.tables.contents.get(index) else {
            return Ok(None);
        };
        self.content = Some(index);
        self.topic = 0;
        Ok(Some(Section {
            index,
            id: content.id.clone(),
            title: content.name.clone(),
            new_page: content.new_page,
        }))
    }

    fn next_topic(&mut self) -> Result<Option<DocTopic>> {
        let tables = self.tables;
        let Some(content) = self.content.and_then(|c| tables.contents.get(c)) else {
            return Ok(None);
        };
        let Some(&id) = content.topics.get(self.topic) else {
            return Ok(None);
        };
        self.topic += 1;
        let text = self.texts.load(tables.topics[id].text)?;
        Ok(Some(DocTopic { id, text }))
    }

    fn link_page(&mut self, link: usize) -> Result<Option<u32>> {
        let Some(link) = self.tables.links.get(link) else {
            return Ok(None);
        };
        if link.doc_page.is_none() && self.warn_links {
            self.ctx.warn_at(
                Some(&link.location),
                "Hot-link destination is not in the document.",
            )?;
        }
        Ok(link.doc_page)
    }

    fn release_topic(&mut self, topic: DocTopic) {
        self.texts.release(topic.text);
    }
}

/// Records the page on which every section, topic and label lands.
#[derive(Debug)]
pub struct PageRecorder {
    pages: u32,
    section: Option<usize>,
    section_pages: Vec<Option<u32>>,
    topic: Option<TopicId>,
    topic_pages: Vec<Option<u32>>,
    label_pages: Vec<Option<u32>>,
    /// `(offset, label)` per topic, in offset order.
    labels_by_topic: Vec<Vec<(u32, usize)>>,
    /// Labels of the current topic not yet passed, nearest last.
    pending: Vec<(u32, usize)>,
}

impl PageRecorder {
    pub fn new(tables: &SymbolTables) -> Self {
        let labels_by_topic = (0..tables.topics.len())
            .map(|topic| {
                tables
                    .labels_in_topic(topic)
                    .into_iter()
                    .map(|label| (tables.labels[label].offset, label))
                    .collect()
            })
            .collect();
        Self {
            pages: 0,
            section: None,
            section_pages: vec![None; tables.contents.len()],
            topic: None,
            topic_pages: vec![None; tables.topics.len()],
            label_pages: vec![None; tables.labels.len()],
            labels_by_topic,
            pending: Vec::new(),
        }
    }

    /// Pages laid out so far.
    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// Stores the recorded pages in `tables` and returns the page count.
    pub fn apply(self, tables: &mut SymbolTables) -> u32 {
        for (content, page) in tables.contents.iter_mut().zip(self.section_pages) {
            content.doc_page = page;
        }
        for (topic, page) in tables.topics.iter_mut().zip(self.topic_pages) {
            topic.doc_page = page;
        }
        for (label, page) in tables.labels.iter_mut().zip(self.label_pages) {
            label.doc_page = page;
        }
        self.pages
    }
}

impl DocumentSink for PageRecorder {
    fn heading(&mut self, _page: u32) -> Result<()> {
        self.pages += 1;
        Ok(())
    }

    fn start_section(&mut self, section: &Section) -> Result<()> {
        self.section = Some(section.index);
        Ok(())
    }

    fn set_section_page(&mut self, page: u32) -> Result<()> {
        if let Some(slot) = self.section.and_then(|s| self.section_pages.get_mut(s)) {
            *slot = Some(page);
        }
        Ok(())
    }

    fn start_topic(&mut self, topic: TopicId) -> Result<()> {
        self.topic = Some(topic);
        self.pending = self
            .labels_by_topic
            .get(topic)
            .map(|labels| {
                labels
                    .iter()
                    .rev()
                    .filter(|&&(_, label)| self.label_pages[label].is_none())
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        Ok(())
    }

    fn set_topic_page(&mut self, page: u32) -> Result<()> {
        if let Some(slot) = self.topic.and_then(|t| self.topic_pages.get_mut(t)) {
            *slot = Some(page);
        }
        Ok(())
    }

    fn periodic(&mut self, pos: usize, page: u32) -> Result<()> {
        while let Some(&(offset, label)) = self.pending.last() {
            if offset as usize > pos {
                break;
            }
            self.label_pages[label] = Some(page);
            self.pending.pop();
        }
        Ok(())
    }
}

/// Numbers the printed pages of `source` and fills in every document page
/// reference. Returns the number of pages.
pub fn paginate_document(
    source: &mut HelpSource,
    config: &HelpConfig,
    ctx: &mut CompileContext,
) -> Result<u32> {
    if source.tables.contents.is_empty() {
        return Ok(0);
    }
    log::info!("Paginating document.");

    let mut recorder = PageRecorder::new(&source.tables);
    {
        let mut feed = ContentsFeed::new(
            &source.tables,
            &mut source.texts,
            ctx,
            config.warn_links_outside_document,
        );
        process_document(&config.document, &mut feed, &mut recorder)?;
    }
    let pages = recorder.apply(&mut source.tables);
    log::debug!("document: {pages} page(s)");

    resolve::set_link_doc_pages(&mut source.tables);
    resolve::set_content_doc_pages(source, ctx)?;
    Ok(pages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{CMD_FF, CMD_PARA, TextBuilder};

    /// A fixed list of sections, each with its topics' text.
    struct Fixture {
        sections: Vec<(bool, Vec<Vec<u8>>)>,
        section: Option<usize>,
        topic: usize,
        link_pages: Vec<Option<u32>>,
    }

    impl Fixture {
        fn new(sections: Vec<(bool, Vec<Vec<u8>>)>) -> Self {
            Self {
                sections,
                section: None,
                topic: 0,
                link_pages: Vec::new(),
            }
        }
    }

    impl DocumentSource for Fixture {
        fn next_section(&mut self) -> Result<Option<Section>> {
            let index = self.section.map_or(0, |s| s + 1);
            let Some((new_page, _)) = self.sections.get(index) else {
                return Ok(None);
            };
            self.section = Some(index);
            self.topic = 0;
            Ok(Some(Section {
                index,
                id: index.to_string().into(),
                title: format!("Section {index}").into(),
                new_page: *new_page,
            }))
        }

        fn next_topic(&mut self) -> Result<Option<DocTopic>> {
            let topics = &self.sections[self.section.unwrap_or(0)].1;
            let Some(text) = topics.get(self.topic) else {
                return Ok(None);
            };
            self.topic += 1;
            Ok(Some(DocTopic {
                id: self.topic - 1,
                text: text.clone(),
            }))
        }

        fn link_page(&mut self, link: usize) -> Result<Option<u32>> {
            Ok(self.link_pages.get(link).copied().flatten())
        }

        fn release_topic(&mut self, _topic: DocTopic) {}
    }

    /// Collects what would be printed, and the page of each topic.
    #[derive(Default)]
    struct Capture {
        out: Vec<u8>,
        headings: Vec<u32>,
        topic_pages: Vec<u32>,
    }

    impl DocumentSink for Capture {
        fn heading(&mut self, page: u32) -> Result<()> {
            self.headings.push(page);
            Ok(())
        }

        fn print(&mut self, text: &[u8]) -> Result<()> {
            self.out.extend_from_slice(text);
            Ok(())
        }

        fn print_n(&mut self, byte: u8, count: usize) -> Result<()> {
            self.out.extend(std::iter::repeat_n(byte, count));
            Ok(())
        }

        fn set_topic_page(&mut self, page: u32) -> Result<()> {
            self.topic_pages.push(page);
            Ok(())
        }
    }

    fn geometry() -> DocumentGeometry {
        DocumentGeometry {
            width: 20,
            depth: 10,
            content_break: 2,
            topic_break: 2,
            blank_break: 1,
            ..Default::default()
        }
    }

    fn para(words: &str) -> Vec<u8> {
        let mut text = vec![CMD_PARA, 0, 0];
        text.extend_from_slice(words.as_bytes());
        text
    }

    fn run(sections: Vec<(bool, Vec<Vec<u8>>)>) -> Capture {
        let mut source = Fixture::new(sections);
        let mut sink = Capture::default();
        process_document(&geometry(), &mut source, &mut sink).unwrap();
        sink
    }

    #[test]
    fn test_paragraph_wraps_to_width() {
        let sink = run(vec![(false, vec![para("aaaa bbbb cccc dddd eeee")])]);
        // the printer drops the blank before each line break
        assert_eq!(sink.out, b"aaaa bbbb cccc dddd \neeee\n");
    }

    #[test]
    fn test_form_feed_turns_page() {
        let text = [b'a', b'\n', CMD_FF, b'b'];
        let sink = run(vec![(false, vec![text.to_vec()])]);
        assert_eq!(sink.headings, [1, 2]);
    }

    #[test]
    fn test_new_page_sections() {
        let sink = run(vec![
            (false, vec![b"contents\n".to_vec()]),
            (true, vec![b"body\n".to_vec()]),
        ]);
        assert_eq!(sink.headings, [1, 2]);
        assert_eq!(sink.topic_pages, [1, 2]);
    }

    #[test]
    fn test_long_topics_flow_over_pages() {
        let long: Vec<u8> = b"line\n".repeat(25);
        let sink = run(vec![(false, vec![long])]);
        assert!(sink.headings.len() >= 3);
    }

    #[test]
    fn test_link_page_references() {
        let mut builder = TextBuilder::new(1024);
        builder.push_link(0, b"There");
        builder.push_raw(b'\n');
        builder.push_link(1, b"Nowhere");
        let mut source = Fixture::new(vec![(false, vec![builder.into_bytes()])]);
        source.link_pages = vec![Some(7), None];
        let mut sink = Capture::default();
        process_document(&geometry(), &mut source, &mut sink).unwrap();
        assert_eq!(sink.out, b"There (p. 7)\nNowhere");
    }

    #[test]
    fn test_centered_line() {
        let text = [&[crate::text::CMD_CENTER][..], b"abcd\n"].concat();
        let sink = run(vec![(false, vec![text])]);
        assert_eq!(sink.out, b"        abcd\n");
    }

    #[test]
    fn test_labels_are_stamped_as_passed() {
        use crate::model::{Label, Topic, TopicFlags};
        use crate::swap::TextHandle;

        let mut tables = SymbolTables::new();
        tables
            .topics
            .push(Topic::new("T", TopicFlags::default(), TextHandle::default()));
        tables.labels.push(Label::new("EARLY", 0, 0));
        tables.labels.push(Label::new("LATE", 0, 40));

        let mut text = Vec::new();
        for _ in 0..12 {
            text.extend_from_slice(b"row\n");
        }
        let mut source = Fixture::new(vec![(false, vec![text])]);
        let mut recorder = PageRecorder::new(&tables);
        process_document(&geometry(), &mut source, &mut recorder).unwrap();
        assert_eq!(recorder.pages(), 2);
        recorder.apply(&mut tables);

        assert_eq!(tables.labels[0].doc_page, Some(1));
        assert_eq!(tables.labels[1].doc_page, Some(2));
        assert_eq!(tables.topics[0].doc_page, Some(1));
    }
}
