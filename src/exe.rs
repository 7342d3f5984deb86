//! Help appended to an executable.
//!
//! The help body sits at the end of the executable, followed by a
//! [`SignatureRecord`] whose `base` is where the body starts.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::diagnostics::CompileContext;
use crate::error::{Error, Result};
use crate::writer::SignatureRecord;

const RECORD: u64 = SignatureRecord::SIZE as u64;

/// The signature record at the end of `file`, if there is one.
fn trailing_signature(file: &mut File) -> io::Result<Option<SignatureRecord>> {
    let len = file.metadata()?.len();
    if len < RECORD {
        return Ok(None);
    }
    let mut raw = [0u8; SignatureRecord::SIZE];
    file.seek(SeekFrom::Start(len - RECORD))?;
    file.read_exact(&mut raw)?;
    Ok(SignatureRecord::decode(&raw))
}

fn open_rw(path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| Error::open(path, e))
}

/// Appends the help database at `help` to the executable at `exe`,
/// replacing help appended earlier.
pub fn append_help(help: &Path, exe: &Path, ctx: &mut CompileContext) -> Result<()> {
    let mut exe_file = open_rw(exe)?;
    let base = match trailing_signature(&mut exe_file)? {
        Some(old) => {
            ctx.warn(format!("Overwriting previous help. (Version={})", old.version))?;
            u64::from(old.base)
        }
        None => exe_file.metadata()?.len(),
    };

    let mut help_file = File::open(help).map_err(|e| Error::open(help, e))?;
    let mut raw = [0u8; SignatureRecord::SIZE];
    let signature = match help_file.read_exact(&mut raw) {
        Ok(()) => SignatureRecord::decode(&raw),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(e) => return Err(e.into()),
    };
    let Some(signature) = signature else {
        return Err(Error::SignatureNotFound(help.to_path_buf()));
    };

    log::info!("Appending {} to {}", help.display(), exe.display());

    let record = SignatureRecord {
        version: signature.version,
        base: u32::try_from(base).map_err(|_| Error::FieldTooLong {
            what: "executable",
            len: base as usize,
        })?,
    };

    exe_file.seek(SeekFrom::Start(base))?;
    io::copy(&mut help_file, &mut exe_file)?;
    exe_file.write_all(&record.encode())?;
    let end = exe_file.stream_position()?;
    exe_file.set_len(end)?;
    exe_file.flush()?;
    Ok(())
}

/// Strips appended help from the executable at `exe`.
pub fn delete_help(exe: &Path) -> Result<()> {
    let mut file = open_rw(exe)?;
    let Some(signature) = trailing_signature(&mut file)? else {
        return Err(Error::NoHelpFound(exe.to_path_buf()));
    };

    log::info!("Deleting help from {}", exe.display());
    file.set_len(u64::from(signature.base))?;
    Ok(())
}
