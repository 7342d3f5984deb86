//! Screen pagination for the online viewer.

use crate::compiler::HelpSource;
use crate::config::OnlineGeometry;
use crate::error::Result;
use crate::model::Page;
use crate::text::{Mode, Token, scan};

/// Sizes the runtime viewer allocates up front.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OnlineLayout {
    /// Most pages in any one topic.
    pub max_pages: usize,
    /// Most hot-links on any one page.
    pub max_links: usize,
}

/// Page list being built for one topic.
struct PageCutter {
    pages: Vec<Page>,
    start: usize,
    start_margin: i32,
    links: usize,
    max_links: usize,
}

impl PageCutter {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            start: 0,
            start_margin: -1,
            links: 0,
            max_links: 0,
        }
    }

    /// Closes the current page at `end`; the next one starts there.
    fn cut(&mut self, end: usize, next_margin: i32) {
        self.pages.push(Page {
            offset: self.start as u32,
            length: (end - self.start) as u32,
            margin: self.start_margin,
        });
        self.max_links = self.max_links.max(self.links);
        self.start = end;
        self.start_margin = next_margin;
        self.links = 0;
    }

    /// Folds skipped bytes up to `end` into the previous page.
    fn skip_to(&mut self, end: usize) {
        if let Some(last) = self.pages.last_mut() {
            last.length += (end - self.start) as u32;
        }
        self.start = end;
    }

    fn finish(mut self, len: usize, skip_blanks: bool) -> (Vec<Page>, usize) {
        if skip_blanks && !self.pages.is_empty() {
            self.skip_to(len);
        } else {
            self.cut(len, -1);
        }
        (self.pages, self.max_links)
    }
}

/// Splits one topic's text into screen pages.
///
/// The pages cover the text exactly: blank lines dropped at the top of a
/// page are folded into the page before it. Returns the pages and the
/// most hot-links found on any of them.
pub fn paginate_topic(text: &[u8], geometry: &OnlineGeometry) -> (Vec<Page>, usize) {
    let width = geometry.width;
    let depth = geometry.depth;

    let mut cutter = PageCutter::new();
    let mut skip_blanks = false;
    let mut lnum = 0;
    let mut col = 0;
    let mut pos = 0;

    while pos < text.len() {
        let token = scan(&text[pos..], Mode::Online);
        let mut size = token.size;
        let mut advance = token.width;

        match token.token {
            Token::Para => {
                let indent = text.get(pos + 1).copied().unwrap_or(0) as usize;
                let margin = text.get(pos + 2).copied().unwrap_or(0) as usize;
                pos += token.size;
                col = indent;

                loop {
                    let t = scan(&text[pos..], Mode::Online);
                    match t.token {
                        Token::Done | Token::Newline | Token::FormFeed => break,
                        Token::Para => {
                            col = 0;
                            lnum += 1;
                            break;
                        }
                        Token::ExcludeOnline | Token::ExcludeDocument => {
                            pos += t.size;
                            continue;
                        }
                        _ => {}
                    }

                    let mut w = t.width;
                    if col + w > width {
                        lnum += 1;
                        if lnum >= depth {
                            let skipped = if t.token == Token::Space { t.size } else { 0 };
                            cutter.cut(pos + skipped, margin as i32);
                            lnum = 0;
                        }
                        if t.token == Token::Space {
                            w = 0;
                        }
                        col = margin;
                    }
                    if t.token == Token::Link {
                        cutter.links += 1;
                    }

                    col += w;
                    pos += t.size;
                }

                skip_blanks = false;
                size = 0;
                advance = 0;
            }

            Token::Newline => {
                if skip_blanks && col == 0 {
                    cutter.skip_to(pos + size);
                } else {
                    lnum += 1;
                    if lnum >= depth || (col == 0 && lnum + 1 == depth) {
                        cutter.cut(pos + size, -1);
                        lnum = 0;
                        skip_blanks = true;
                    }
                    col = 0;
                }
            }

            Token::FormFeed => {
                col = 0;
                if skip_blanks {
                    cutter.skip_to(pos + size);
                } else {
                    cutter.cut(pos + size, -1);
                    lnum = 0;
                }
            }

            Token::Link => {
                cutter.links += 1;
                skip_blanks = false;
            }

            Token::Space | Token::Word => skip_blanks = false,

            Token::Done | Token::ExcludeOnline | Token::ExcludeDocument | Token::Center => {}
        }

        pos += size;
        col += advance;
    }

    cutter.finish(text.len(), skip_blanks)
}

/// Paginates every formatted topic for the online viewer.
pub fn paginate_online(source: &mut HelpSource, geometry: &OnlineGeometry) -> Result<OnlineLayout> {
    log::info!("Paginating online help.");

    let mut layout = OnlineLayout::default();
    for topic in &mut source.tables.topics {
        if topic.is_data() {
            continue;
        }
        let text = source.texts.load(topic.text)?;
        let (pages, max_links) = paginate_topic(&text, geometry);
        source.texts.release(text);

        log::debug!("topic {:?}: {} page(s)", topic.title, pages.len());
        layout.max_pages = layout.max_pages.max(pages.len());
        layout.max_links = layout.max_links.max(max_links);
        topic.pages = pages;
    }
    Ok(layout)
}
