//! Hot-link and contents resolution.
//!
//! Runs in two stages. [`make_hot_links`] binds every contents reference
//! and hot-link to a topic once the whole source has been read. After the
//! document has been paginated, [`set_link_doc_pages`] and
//! [`set_content_doc_pages`] fill in printed page numbers.

use bstr::ByteSlice;

use crate::compiler::{HelpSource, PAGE_NUM_WIDTH};
use crate::diagnostics::CompileContext;
use crate::error::Result;
use crate::model::{
    ContentRef, DOC_CONTENTS_TITLE, LinkTarget, ResolvedLink, SymbolTables, TopicId,
};

/// Resolves contents entries and hot-links to topics.
///
/// Every topic reached from the contents is marked as part of the
/// document. Links into the document get a placeholder page of 0, which
/// keeps the space for their page reference during document pagination.
pub fn make_hot_links(tables: &mut SymbolTables, ctx: &mut CompileContext) -> Result<()> {
    log::info!("Making hot-links.");

    for content in 0..tables.contents.len() {
        let refs = tables.contents[content].refs.clone();
        let location = tables.contents[content].location.clone();
        let mut topics = Vec::with_capacity(refs.len());

        for target in &refs {
            let topic = match target {
                ContentRef::Label(name) => match tables.find_label(name) {
                    None => {
                        ctx.error_at(
                            location.as_ref(),
                            format!("Cannot find DocContent label \"{name}\"."),
                        )?;
                        continue;
                    }
                    Some(label) => {
                        let topic = tables.labels[label].topic;
                        if tables.topics[topic].is_data() {
                            ctx.error_at(
                                location.as_ref(),
                                format!("Label \"{name}\" is a data-only topic."),
                            )?;
                            continue;
                        }
                        topic
                    }
                },
                ContentRef::Title(title) => match tables.find_topic_title(title) {
                    None => {
                        ctx.error_at(
                            location.as_ref(),
                            format!("Cannot find DocContent topic \"{title}\"."),
                        )?;
                        continue;
                    }
                    Some(topic) => topic,
                },
            };

            if tables.topics[topic].flags.in_document {
                ctx.warn_at(
                    location.as_ref(),
                    format!(
                        "Topic \"{}\" appears in document more than once.",
                        tables.topics[topic].title
                    ),
                )?;
            } else {
                tables.topics[topic].flags.in_document = true;
            }
            topics.push(topic);
        }

        tables.contents[content].topics = topics;
    }

    for index in 0..tables.links.len() {
        let resolved = match &tables.links[index].target {
            LinkTarget::Special(_) => continue,
            LinkTarget::Title(title) => match tables.find_topic_title(title) {
                Some(topic) => Some((topic, 0)),
                None => {
                    let message = format!("Cannot find implicit hot-link \"{title}\".");
                    ctx.error_at(Some(&tables.links[index].location), message)?;
                    None
                }
            },
            LinkTarget::Label(name) => match tables.find_label(name) {
                None => {
                    let message = format!("Cannot find explicit hot-link \"{name}\".");
                    ctx.error_at(Some(&tables.links[index].location), message)?;
                    None
                }
                Some(label) => {
                    let label = &tables.labels[label];
                    if tables.topics[label.topic].is_data() {
                        let message = format!("Label \"{name}\" is a data-only topic.");
                        ctx.error_at(Some(&tables.links[index].location), message)?;
                        None
                    } else {
                        Some((label.topic, label.offset))
                    }
                }
            },
        };

        if let Some((topic, offset)) = resolved {
            let in_document = tables.topics[topic].flags.in_document;
            let link = &mut tables.links[index];
            link.resolved = Some(ResolvedLink {
                topic: topic as i32,
                offset,
            });
            link.doc_page = in_document.then_some(0);
        }
    }

    Ok(())
}

fn resolved_topic(tables: &SymbolTables, index: usize) -> Option<TopicId> {
    let topic = tables.links[index].resolved?.topic;
    usize::try_from(topic).ok()
}

/// Copies document page numbers into the hot-links.
pub fn set_link_doc_pages(tables: &mut SymbolTables) {
    for index in 0..tables.links.len() {
        let page = match &tables.links[index].target {
            LinkTarget::Special(_) => None,
            LinkTarget::Title(_) => {
                resolved_topic(tables, index).and_then(|t| tables.topics[t].doc_page)
            }
            LinkTarget::Label(name) => tables
                .find_label(name)
                .and_then(|l| tables.labels[l].doc_page),
        };
        tables.links[index].doc_page = page;
    }
}

/// Right-aligned page number for a contents line.
fn page_number_field(page: u32) -> Option<[u8; PAGE_NUM_WIDTH]> {
    let digits = page.to_string();
    let digits = digits.as_bytes();
    if digits.len() > PAGE_NUM_WIDTH {
        return None;
    }
    let mut field = [b'.'; PAGE_NUM_WIDTH];
    field[PAGE_NUM_WIDTH - digits.len()..].copy_from_slice(digits);
    Some(field)
}

/// Writes each contents entry's page number over the last dots of its
/// line in the contents topic.
pub fn set_content_doc_pages(source: &mut HelpSource, ctx: &mut CompileContext) -> Result<()> {
    let Some(topic) = source.tables.find_topic_title(DOC_CONTENTS_TITLE.as_bytes()) else {
        return Ok(());
    };

    let mut text = source.texts.acquire(source.tables.topics[topic].text)?;
    for content in &source.tables.contents {
        let (Some(pos), Some(page)) = (content.page_num_pos, content.doc_page) else {
            continue;
        };
        match page_number_field(page) {
            Some(field) if pos + PAGE_NUM_WIDTH <= text.len() => {
                text[pos..pos + PAGE_NUM_WIDTH].copy_from_slice(&field);
            }
            Some(_) => {}
            None => {
                ctx.error_at(
                    content.location.as_ref(),
                    format!(
                        "Page number {page} of \"{}\" does not fit in the contents.",
                        content.name.as_bstr()
                    ),
                )?;
            }
        }
    }
    text.commit()
}
