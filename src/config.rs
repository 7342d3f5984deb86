//! Compiler configuration.
//!
//! Layout geometry and diagnostic ceilings are configuration inputs rather
//! than hard-wired constants. The defaults reproduce the classic 78x22 help
//! screen and the 72-column, 59-line printed page.

use std::path::PathBuf;

/// Geometry of the interactive help viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlineGeometry {
    /// Usable columns per line.
    pub width: usize,
    /// Lines per page.
    pub depth: usize,
}

impl Default for OnlineGeometry {
    fn default() -> Self {
        Self {
            width: 78,
            depth: 22,
        }
    }
}

/// Geometry of the printed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentGeometry {
    /// Width of printed text.
    pub width: usize,
    /// Lines of text per page (the total depth minus the heading).
    pub depth: usize,
    /// Every body line is indented by this much.
    pub indent: usize,
    /// Section titles are indented by this much.
    pub title_indent: usize,
    /// A contents entry needs this many free lines or it starts a new page.
    pub content_break: usize,
    /// A topic needs this many free lines or it starts a new page.
    pub topic_break: usize,
    /// A blank line this close to the bottom turns the page.
    pub blank_break: usize,
}

impl DocumentGeometry {
    /// Lines taken by each page heading.
    pub const HEADING_DEPTH: usize = 3;
}

impl Default for DocumentGeometry {
    fn default() -> Self {
        Self {
            width: 72,
            depth: 59 - Self::HEADING_DEPTH,
            indent: 2,
            title_indent: 1,
            content_break: 7,
            topic_break: 4,
            blank_break: 2,
        }
    }
}

/// Ceilings that keep a bad source from running away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Stop after this many errors (0 = never stop).
    pub max_errors: usize,
    /// Stop after this many warnings (0 = never stop).
    pub max_warnings: usize,
    /// Largest encoded text a single topic may accumulate.
    pub max_topic_text: usize,
    /// Deepest `Include` nesting.
    pub max_include_depth: usize,
    /// Most hot-links a single `Table=` may hold.
    pub max_table_links: usize,
    /// Most topics one contents entry may list.
    pub max_content_topics: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_errors: 25,
            max_warnings: 25,
            max_topic_text: 30 * 1024 - 1024,
            max_include_depth: 5,
            max_table_links: 100,
            max_content_topics: 10,
        }
    }
}

/// Where topic text lives between passes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SwapMode {
    /// Keep stored text in memory.
    #[default]
    Memory,
    /// Spill stored text to an anonymous temporary file.
    File { dir: Option<PathBuf> },
}

/// Settings for one compiler run.
#[derive(Debug, Clone)]
pub struct HelpConfig {
    pub online: OnlineGeometry,
    pub document: DocumentGeometry,
    pub limits: Limits,
    pub swap: SwapMode,
    /// Overrides the source's `HdrFile=`.
    pub header_file: Option<PathBuf>,
    /// Overrides the source's `HlpFile=`.
    pub help_file: Option<PathBuf>,
    /// Text printed at the top of every document page, before `Page N`.
    pub document_heading: String,
    /// Warn about hot-links whose target is not in the printed document.
    pub warn_links_outside_document: bool,
}

impl Default for HelpConfig {
    fn default() -> Self {
        Self {
            online: OnlineGeometry::default(),
            document: DocumentGeometry::default(),
            limits: Limits::default(),
            swap: SwapMode::default(),
            header_file: None,
            help_file: None,
            document_heading: "Fractint Version xx.xx".to_string(),
            warn_links_outside_document: true,
        }
    }
}

impl HelpConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_online(mut self, online: OnlineGeometry) -> Self {
        self.online = online;
        self
    }

    pub fn with_document(mut self, document: DocumentGeometry) -> Self {
        self.document = document;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_swap(mut self, swap: SwapMode) -> Self {
        self.swap = swap;
        self
    }

    pub fn with_header_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.header_file = Some(path.into());
        self
    }

    pub fn with_help_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.help_file = Some(path.into());
        self
    }

    pub fn with_document_heading(mut self, heading: impl Into<String>) -> Self {
        self.document_heading = heading.into();
        self
    }

    pub fn with_link_warnings(mut self, warn: bool) -> Self {
        self.warn_links_outside_document = warn;
        self
    }
}
