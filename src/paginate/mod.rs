//! The two paginators.
//!
//! Online pagination cuts each topic into screens for the runtime viewer.
//! Document pagination lays the table of contents out on printed pages to
//! number them. They share the token scanner and nothing else.

pub mod document;
pub mod online;

pub use document::{
    ContentsFeed, DocTopic, DocumentSink, DocumentSource, PageRecorder, Section,
    paginate_document, process_document,
};
pub use online::{OnlineLayout, paginate_online, paginate_topic};
