//! Binary help database writer.
//!
//! Layout, after the signature record:
//!
//! ```text
//! i32 max_pages, max_links, num_topics, num_labels, num_contents, num_doc_pages
//! u32 topic_offset[num_topics]
//! {i32 topic, i32 offset}[num_labels]
//! contents: i32 flags, u8+id, u8+name, u8 n, i32 topic[n]
//! topics:   i32 flags, i32 num_pages, {i32 off, i32 len, i32 margin}[],
//!           u8+title, i32 text_len, text
//! ```
//!
//! Topic offsets are relative to the end of the signature record.

use std::io::{self, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::compiler::HelpSource;
use crate::error::{Error, Result};
use crate::model::{Content, SymbolTables, Topic};
use crate::text::{LinkSlot, link_positions};

use super::SignatureRecord;

const INT: usize = 4;
const PAGE_RECORD: usize = 3 * INT;
const LABEL_RECORD: usize = 2 * INT;
const FIXED_HEADER: usize = 6 * INT;

/// Values of the fixed header that come from the paginators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseHeader {
    pub version: i32,
    pub max_pages: usize,
    pub max_links: usize,
    pub doc_pages: u32,
}

fn content_size(content: &Content) -> usize {
    INT + 1 + content.id.len() + 1 + content.name.len() + 1 + INT * content.topics.len()
}

fn topic_size(topic: &Topic) -> usize {
    INT + INT + PAGE_RECORD * topic.pages.len() + 1 + topic.title.len() + INT + topic.text_len()
}

/// Stores the file offset of every topic record and returns the size of
/// the database without its signature.
pub fn calc_offsets(tables: &mut SymbolTables) -> usize {
    let mut offset = FIXED_HEADER
        + INT * tables.topics.len()
        + LABEL_RECORD * tables.public_labels().count()
        + tables.contents.iter().map(content_size).sum::<usize>();

    for topic in &mut tables.topics {
        topic.offset = offset as u32;
        offset += topic_size(topic);
    }
    offset
}

fn put_i32<W: Write>(w: &mut W, value: i32) -> io::Result<()> {
    w.write_all(&value.to_le_bytes())
}

fn put_count<W: Write>(w: &mut W, count: usize) -> io::Result<()> {
    put_i32(w, count as i32)
}

/// Writes a `u8` length prefix followed by `bytes`.
fn put_counted<W: Write>(w: &mut W, what: &'static str, bytes: &[u8]) -> Result<()> {
    let len = u8::try_from(bytes.len()).map_err(|_| Error::FieldTooLong {
        what,
        len: bytes.len(),
    })?;
    w.write_all(&[len])?;
    w.write_all(bytes)?;
    Ok(())
}

/// Replaces every pending link slot in `text` with its resolved target.
fn patch_links(text: &mut [u8], tables: &SymbolTables) -> Result<()> {
    for pos in link_positions(text) {
        let index = LinkSlot::pending_index(&text[pos..]);
        let link = tables.links.get(index);
        let Some((resolved, doc_page)) = link.and_then(|l| Some((l.resolved?, l.doc_page))) else {
            return Err(Error::UnresolvedLink(index));
        };
        LinkSlot::Resolved {
            topic: resolved.topic,
            offset: resolved.offset,
            doc_page,
        }
        .write_into(&mut text[pos..]);
    }
    Ok(())
}

/// Streams the database for `source` to `w`.
///
/// [`calc_offsets`] and [`SymbolTables::sort_labels`] must have run.
/// Topic texts are patched one at a time as they are written; the stored
/// copies keep their pending link slots.
pub fn write_database<W: Write>(
    w: &mut W,
    source: &mut HelpSource,
    header: &DatabaseHeader,
) -> Result<()> {
    let tables = &source.tables;

    w.write_all(
        &SignatureRecord {
            version: header.version,
            base: 0,
        }
        .encode(),
    )?;

    put_count(w, header.max_pages)?;
    put_count(w, header.max_links)?;
    put_count(w, tables.topics.len())?;
    put_count(w, tables.public_labels().count())?;
    put_count(w, tables.contents.len())?;
    put_i32(w, header.doc_pages as i32)?;

    for topic in &tables.topics {
        w.write_all(&topic.offset.to_le_bytes())?;
    }

    for label in tables.public_labels() {
        put_count(w, label.topic)?;
        w.write_all(&label.offset.to_le_bytes())?;
    }

    for content in &tables.contents {
        put_i32(w, content.flags() as i32)?;
        put_counted(w, "contents id", &content.id)?;
        put_counted(w, "contents name", &content.name)?;
        let count = u8::try_from(content.topics.len()).map_err(|_| Error::FieldTooLong {
            what: "contents topic list",
            len: content.topics.len(),
        })?;
        w.write_all(&[count])?;
        for &topic in &content.topics {
            put_count(w, topic)?;
        }
    }

    for topic in &tables.topics {
        put_i32(w, topic.flags.bits() as i32)?;
        put_count(w, topic.pages.len())?;
        for page in &topic.pages {
            w.write_all(&page.offset.to_le_bytes())?;
            w.write_all(&page.length.to_le_bytes())?;
            put_i32(w, page.margin)?;
        }
        put_counted(w, "topic title", &topic.title)?;
        put_count(w, topic.text_len())?;

        let mut text = source.texts.acquire(topic.text)?;
        if !topic.is_data() {
            patch_links(&mut text, tables)?;
        }
        w.write_all(&text)?;
    }

    Ok(())
}

/// Writes the database for `source` to the file at `path`.
///
/// The file is built next to `path` and renamed over it once complete, so
/// a failed write leaves any previous database in place.
pub fn write_help_file(
    path: impl AsRef<Path>,
    source: &mut HelpSource,
    header: &DatabaseHeader,
) -> Result<()> {
    let path = path.as_ref();
    log::info!("Writing: {}", path.display());

    let dir = super::staging_dir(path);
    let temp = NamedTempFile::new_in(dir).map_err(|e| Error::open(dir, e))?;
    let mut w = BufWriter::new(temp);
    write_database(&mut w, source, header)?;
    let temp = w.into_inner().map_err(|e| e.into_error())?;
    temp.persist(path).map_err(|e| Error::open(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::read_source_bytes;
    use crate::config::HelpConfig;
    use crate::diagnostics::CompileContext;
    use crate::paginate::{paginate_document, paginate_online};
    use crate::resolve::make_hot_links;
    use crate::text::CMD_LINK;

    const SOURCE: &str = "~HdrFile=t.h\n~HlpFile=t.hlp\n~Version=7\n\
        ~DocContents\n{1, 0, Intro, INTRO_LABEL}\n\
        ~Topic=Intro\n~Label=INTRO_LABEL\nSee {Second} and {=@there that}.\n\
        ~Topic=Second\nSecond topic.\n~Label=@there\nhere\n\
        ~Data=RAW_DATA\nabc\n";

    fn build(src: &str) -> (HelpSource, Vec<u8>) {
        let config = HelpConfig::default();
        let mut ctx = CompileContext::new(&config.limits);
        let mut source =
            read_source_bytes("t.src", src.as_bytes().to_vec(), &config, &mut ctx).unwrap();
        make_hot_links(&mut source.tables, &mut ctx).unwrap();
        let layout = paginate_online(&mut source, &config.online).unwrap();
        let doc_pages = paginate_document(&mut source, &config, &mut ctx).unwrap();
        assert!(!ctx.has_errors(), "{:?}", ctx.diagnostics());

        calc_offsets(&mut source.tables);
        source.tables.sort_labels();
        let header = DatabaseHeader {
            version: source.version,
            max_pages: layout.max_pages,
            max_links: layout.max_links,
            doc_pages,
        };
        let mut out = Vec::new();
        write_database(&mut out, &mut source, &header).unwrap();
        (source, out)
    }

    fn int(data: &[u8], at: usize) -> i32 {
        i32::from_le_bytes(data[at..at + 4].try_into().unwrap())
    }

    #[test]
    fn test_header_counts() {
        let (_, out) = build(SOURCE);
        let sig = SignatureRecord::decode(&out).unwrap();
        assert_eq!(sig, SignatureRecord { version: 7, base: 0 });

        let body = &out[SignatureRecord::SIZE..];
        assert_eq!(int(body, 0), 1); // max pages
        assert_eq!(int(body, 8), 4); // topics, DocContent included
        assert_eq!(int(body, 12), 2); // public labels
        assert_eq!(int(body, 16), 1); // contents
        assert!(int(body, 20) >= 1);
    }

    #[test]
    fn test_offsets_locate_topic_records() {
        let (source, out) = build(SOURCE);
        let body = &out[SignatureRecord::SIZE..];
        let topics = &source.tables.topics;

        for (i, topic) in topics.iter().enumerate() {
            let offset = int(body, 24 + 4 * i) as usize;
            assert_eq!(offset, topic.offset as usize);

            let pages = int(body, offset + 4) as usize;
            let title_at = offset + 8 + 12 * pages;
            let title_len = body[title_at] as usize;
            assert_eq!(&body[title_at + 1..title_at + 1 + title_len], topic.title);

            let len_at = title_at + 1 + title_len;
            assert_eq!(int(body, len_at) as usize, topic.text_len());
        }

        let last = topics.last().unwrap();
        let end = last.offset as usize + topic_size(last);
        assert_eq!(end, body.len());
        assert_eq!(&body[end - 4..], b"abc\n");
    }

    #[test]
    fn test_links_are_patched() {
        let (source, out) = build(SOURCE);
        let body = &out[SignatureRecord::SIZE..];
        let intro = &source.tables.topics[1];
        let start = intro.offset as usize + 8 + 12 * intro.pages.len();
        let text_at = start + 1 + intro.title.len() + 4;
        let text = &body[text_at..text_at + intro.text_len()];

        let links = link_positions(text);
        assert_eq!(links.len(), 2);
        assert_eq!(text[links[0]], CMD_LINK);

        let LinkSlot::Resolved { topic, doc_page, .. } = LinkSlot::resolved(&text[links[0]..])
        else {
            unreachable!()
        };
        assert_eq!(topic, 2);
        assert_eq!(doc_page, None);

        let second = &source.tables.topics[2];
        let LinkSlot::Resolved { topic, offset, .. } = LinkSlot::resolved(&text[links[1]..]) else {
            unreachable!()
        };
        assert_eq!(topic, 2);
        assert!(offset > 0 && (offset as usize) < second.text_len());
    }

    #[test]
    fn test_labels_sorted_index_first() {
        let src = SOURCE.replace("~Label=INTRO_LABEL", "~Label=INTRO_LABEL\n~Label=HELP_INDEX");
        let (_, out) = build(&src);
        let body = &out[SignatureRecord::SIZE..];
        let topics = int(body, 8) as usize;
        let labels = 24 + 4 * topics;
        assert_eq!(int(body, 12), 3);
        // HELP_INDEX, INTRO_LABEL, RAW_DATA all sit in their own topics
        assert_eq!(int(body, labels), 1);
        assert_eq!(int(body, labels + 8), 1);
        assert_eq!(int(body, labels + 16), 3);
    }

    #[test]
    fn test_help_file_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.hlp");
        std::fs::write(&path, b"stale").unwrap();

        let (mut source, out) = build(SOURCE);
        let header = DatabaseHeader {
            version: source.version,
            ..Default::default()
        };
        write_help_file(&path, &mut source, &header).unwrap();
        let written = std::fs::read(&path).unwrap();
        assert_eq!(&written[..SignatureRecord::SIZE], &out[..SignatureRecord::SIZE]);
        assert_eq!(written.len(), out.len());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_write_keeps_previous_help_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.hlp");
        std::fs::write(&path, b"previous").unwrap();

        let config = HelpConfig::default();
        let mut ctx = CompileContext::new(&config.limits);
        let mut source =
            read_source_bytes("t.src", b"~Topic=A\n{B}\n".to_vec(), &config, &mut ctx).unwrap();
        calc_offsets(&mut source.tables);
        let err = write_help_file(&path, &mut source, &DatabaseHeader::default());
        assert!(matches!(err, Err(Error::UnresolvedLink(0))));

        assert_eq!(std::fs::read(&path).unwrap(), b"previous");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_unresolved_link_aborts() {
        let config = HelpConfig::default();
        let mut ctx = CompileContext::new(&config.limits);
        let mut source =
            read_source_bytes("t.src", b"~Topic=A\n{B}\n".to_vec(), &config, &mut ctx).unwrap();
        calc_offsets(&mut source.tables);
        let err = write_database(&mut Vec::new(), &mut source, &DatabaseHeader::default());
        assert!(matches!(err, Err(Error::UnresolvedLink(0))));
    }
}
