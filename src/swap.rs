//! Backing storage for topic text.
//!
//! Each topic's encoded text is stored once when the topic ends and fetched
//! again by handle. Only one topic's text is resident at a time: callers
//! borrow it through [`TopicTexts::acquire`] (or [`TopicTexts::load`] /
//! [`TopicTexts::release`]) and give it back before asking for the next.

use std::fs::File;
use std::io;
use std::ops::{Deref, DerefMut};
#[cfg(all(not(unix), not(windows)))]
use std::io::{Read, Seek, SeekFrom, Write};

use crate::config::SwapMode;
use crate::error::{Error, Result};

/// Location of one topic's text in a [`TextStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextHandle {
    offset: u64,
    len: usize,
}

impl TextHandle {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Append-only random-access byte storage.
pub trait TextStore {
    /// Total bytes stored.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends `bytes`, returning the offset they were written at.
    fn append(&mut self, bytes: &[u8]) -> io::Result<u64>;

    /// Fills `buf` from `offset`. The whole buffer must be read.
    fn read_at_into(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Overwrites previously appended bytes at `offset`.
    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;
}

// --- Implementation: Temporary File ---

/// Text spilled to an anonymous temporary file, removed on drop.
pub struct FileStore {
    file: File,
    len: u64,
}

impl FileStore {
    pub fn new(dir: Option<&std::path::Path>) -> io::Result<Self> {
        let file = match dir {
            Some(dir) => tempfile::tempfile_in(dir)?,
            None => tempfile::tempfile()?,
        };
        Ok(Self { file, len: 0 })
    }
}

#[cfg(unix)]
impl FileStore {
    fn pread(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    fn pwrite(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.write_all_at(bytes, offset)
    }
}

#[cfg(windows)]
impl FileStore {
    fn pread(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            let read = self.file.seek_read(buf, offset)?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "not enough data",
                ));
            }
            buf = &mut buf[read..];
            offset += read as u64;
        }
        Ok(())
    }

    fn pwrite(&mut self, mut offset: u64, mut bytes: &[u8]) -> io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !bytes.is_empty() {
            let written = self.file.seek_write(bytes, offset)?;
            bytes = &bytes[written..];
            offset += written as u64;
        }
        Ok(())
    }
}

#[cfg(all(not(unix), not(windows)))]
impl FileStore {
    fn pread(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf)
    }

    fn pwrite(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)
    }
}

impl TextStore for FileStore {
    fn len(&self) -> u64 {
        self.len
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<u64> {
        let offset = self.len;
        self.pwrite(offset, bytes)?;
        self.len += bytes.len() as u64;
        Ok(offset)
    }

    fn read_at_into(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        if offset + buf.len() as u64 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of swap file",
            ));
        }
        self.pread(offset, buf)
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        if offset + bytes.len() as u64 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "write past end of swap file",
            ));
        }
        self.pwrite(offset, bytes)
    }
}

// --- Implementation: In-Memory ---

/// Text kept in a single in-memory vector.
#[derive(Default)]
pub struct MemoryStore {
    data: Vec<u8>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn range(&self, offset: u64, len: usize) -> io::Result<std::ops::Range<usize>> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset out of range"))?;
        let end = start + len;
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "not enough data",
            ));
        }
        Ok(start..end)
    }
}

impl TextStore for MemoryStore {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn append(&mut self, bytes: &[u8]) -> io::Result<u64> {
        let offset = self.data.len() as u64;
        self.data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn read_at_into(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let range = self.range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }
}

/// Topic text storage with a single resident buffer.
pub struct TopicTexts {
    store: Box<dyn TextStore>,
    spare: Vec<u8>,
    resident: usize,
    peak_resident: usize,
}

impl TopicTexts {
    pub fn new(store: Box<dyn TextStore>) -> Self {
        Self {
            store,
            spare: Vec::new(),
            resident: 0,
            peak_resident: 0,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    pub fn from_mode(mode: &SwapMode) -> Result<Self> {
        match mode {
            SwapMode::Memory => Ok(Self::in_memory()),
            SwapMode::File { dir } => {
                let store = FileStore::new(dir.as_deref()).map_err(|e| match dir {
                    Some(dir) => Error::open(dir, e),
                    None => Error::Io(e),
                })?;
                Ok(Self::new(Box::new(store)))
            }
        }
    }

    /// Stores a finished topic's text.
    pub fn store(&mut self, text: &[u8]) -> Result<TextHandle> {
        let offset = self.store.append(text)?;
        Ok(TextHandle {
            offset,
            len: text.len(),
        })
    }

    /// Reads a topic's text into the resident buffer and hands it out.
    /// Give it back with [`TopicTexts::release`].
    pub fn load(&mut self, handle: TextHandle) -> Result<Vec<u8>> {
        let mut buf = std::mem::take(&mut self.spare);
        buf.clear();
        buf.resize(handle.len, 0);
        self.store.read_at_into(handle.offset, &mut buf)?;
        self.resident += 1;
        debug_assert_eq!(self.resident, 1, "more than one topic resident");
        self.peak_resident = self.peak_resident.max(handle.len);
        Ok(buf)
    }

    /// Returns a buffer obtained from [`TopicTexts::load`] without saving it.
    pub fn release(&mut self, buf: Vec<u8>) {
        self.resident = self.resident.saturating_sub(1);
        if buf.capacity() > self.spare.capacity() {
            self.spare = buf;
        }
    }

    /// Writes a buffer obtained from [`TopicTexts::load`] back to storage
    /// and releases it.
    pub fn save(&mut self, handle: TextHandle, buf: Vec<u8>) -> Result<()> {
        let result = self.store.write_at(handle.offset, &buf[..handle.len]);
        self.release(buf);
        Ok(result?)
    }

    /// Borrows a topic's text for in-place work.
    pub fn acquire(&mut self, handle: TextHandle) -> Result<ResidentText<'_>> {
        let buf = self.load(handle)?;
        Ok(ResidentText {
            texts: self,
            handle,
            buf: Some(buf),
        })
    }

    /// Total bytes of topic text in storage.
    pub fn stored_bytes(&self) -> u64 {
        self.store.len()
    }

    /// Largest topic text that has been resident at once.
    pub fn peak_resident(&self) -> usize {
        self.peak_resident
    }
}

/// A topic's text, resident until dropped or committed.
pub struct ResidentText<'a> {
    texts: &'a mut TopicTexts,
    handle: TextHandle,
    buf: Option<Vec<u8>>,
}

impl ResidentText<'_> {
    /// Saves modifications and releases the text.
    pub fn commit(mut self) -> Result<()> {
        match self.buf.take() {
            Some(buf) => self.texts.save(self.handle, buf),
            None => Ok(()),
        }
    }
}

impl Deref for ResidentText<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or_default()
    }
}

impl DerefMut for ResidentText<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or_default()
    }
}

impl Drop for ResidentText<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.texts.release(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(mut texts: TopicTexts) {
        let a = texts.store(b"first topic").unwrap();
        let b = texts.store(b"second").unwrap();
        assert_eq!(texts.stored_bytes(), 17);

        {
            let mut text = texts.acquire(a).unwrap();
            assert_eq!(&*text, b"first topic");
            text[0] = b'F';
            text.commit().unwrap();
        }
        {
            let mut text = texts.acquire(b).unwrap();
            text[0] = b'S';
            // dropped without commit
        }
        assert_eq!(&*texts.acquire(a).unwrap(), b"First topic");
        assert_eq!(&*texts.acquire(b).unwrap(), b"second");
        assert_eq!(texts.peak_resident(), 11);
    }

    #[test]
    fn test_memory_store() {
        roundtrip(TopicTexts::in_memory());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let texts = TopicTexts::from_mode(&SwapMode::File {
            dir: Some(dir.path().to_path_buf()),
        })
        .unwrap();
        roundtrip(texts);
    }

    #[test]
    fn test_memory_store_rejects_reads_past_end() {
        let mut store = MemoryStore::new();
        store.append(b"abc").unwrap();
        let mut buf = [0u8; 4];
        assert!(store.read_at_into(0, &mut buf).is_err());
        assert!(store.write_at(2, b"xy").is_err());
    }

    #[test]
    fn test_load_and_release() {
        let mut texts = TopicTexts::in_memory();
        let h = texts.store(b"hello").unwrap();
        let buf = texts.load(h).unwrap();
        assert_eq!(buf, b"hello");
        texts.release(buf);
        let buf = texts.load(h).unwrap();
        texts.save(h, buf).unwrap();
        assert!(!h.is_empty());
    }
}
