//! Binary (de)serialization primitives for the on-disk log format.
//!
//! `Encodeable`/`Decodeable` handle fixed-width integers. Variable-length
//! byte ranges come in two flavors: `write_blob`/`read_blob` prefix the
//! bytes with an 8-byte length, for metadata whose size isn't known ahead
//! of time (a checkpoint's transaction list); `write_fixed`/`read_fixed`
//! write/read a bare byte range with no prefix, for page images, whose
//! size is always the configured page size and would waste a length
//! prefix that can never vary.

use std::convert::TryInto;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::mem::size_of;
use std::path::Path;

use crate::error::{DbError, DbResult};

pub trait Encodeable {
    fn encode(&self) -> Vec<u8>;
}

pub trait Decodeable: Sized {
    fn decode_from<R: Read>(reader: &mut R) -> DbResult<Self>;
}

pub(crate) fn read_exact<R: Read>(reader: &mut R, n: usize, context: &str) -> DbResult<Vec<u8>> {
    let mut buf = vec![0u8; n];
    reader
        .read_exact(&mut buf)
        .map_err(|e| DbError::storage_fault(context, e))?;
    Ok(buf)
}

macro_rules! impl_int_codec {
    (for $($t:ty),+) => {
        $(
            impl Encodeable for $t {
                fn encode(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }
            }

            impl Decodeable for $t {
                fn decode_from<R: Read>(reader: &mut R) -> DbResult<Self> {
                    let bytes = read_exact(reader, size_of::<Self>(), concat!("decode ", stringify!($t)))?;
                    Ok(Self::from_le_bytes(bytes.try_into().unwrap()))
                }
            }
        )*
    }
}

impl_int_codec!(for u8, u16, u32, u64, i32, i64, usize);

/// A length-prefixed byte blob: `[8 bytes len][len bytes payload]`. Used for
/// variable-length metadata (e.g. checkpoint transaction lists), never for
/// fixed-size page images.
pub(crate) fn write_blob<W: Write>(writer: &mut W, bytes: &[u8]) -> DbResult<()> {
    let len = bytes.len() as u64;
    writer
        .write_all(&len.to_le_bytes())
        .and_then(|_| writer.write_all(bytes))
        .map_err(|e| DbError::storage_fault("write blob", e))
}

pub(crate) fn read_blob<R: Read>(reader: &mut R) -> DbResult<Vec<u8>> {
    let len = u64::decode_from(reader)?;
    read_exact(reader, len as usize, "read blob")
}

/// A raw, fixed-width byte region with no length prefix -- used for page
/// images, whose size is always the configured page size.
pub(crate) fn write_fixed<W: Write>(writer: &mut W, bytes: &[u8]) -> DbResult<()> {
    writer
        .write_all(bytes)
        .map_err(|e| DbError::storage_fault("write page image", e))
}

pub(crate) fn read_fixed<R: Read>(reader: &mut R, len: usize) -> DbResult<Vec<u8>> {
    read_exact(reader, len, "read page image")
}

/// Thin wrapper over a `File`: every read/write failure is mapped to
/// `DbError::StorageFault` rather than bubbling up a bare `io::Error`.
pub struct RandomAccessFile {
    file: File,
}

impl RandomAccessFile {
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| DbError::storage_fault(format!("open {:?}", path.as_ref()), e))?;
        Ok(Self { file })
    }

    pub fn len(&self) -> DbResult<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| DbError::storage_fault("stat file", e))
    }

    pub fn set_len(&mut self, len: u64) -> DbResult<()> {
        self.file
            .set_len(len)
            .map_err(|e| DbError::storage_fault("truncate file", e))
    }

    pub fn seek(&mut self, pos: SeekFrom) -> DbResult<u64> {
        self.file
            .seek(pos)
            .map_err(|e| DbError::storage_fault("seek", e))
    }

    pub fn position(&mut self) -> DbResult<u64> {
        self.seek(SeekFrom::Current(0))
    }

    pub fn read_exact_at(&mut self, buf: &mut [u8]) -> DbResult<()> {
        self.file
            .read_exact(buf)
            .map_err(|e| DbError::storage_fault("read", e))
    }

    pub fn write_all(&mut self, buf: &[u8]) -> DbResult<()> {
        self.file
            .write_all(buf)
            .map_err(|e| DbError::storage_fault("write", e))
    }

    pub fn flush(&mut self) -> DbResult<()> {
        self.file
            .flush()
            .map_err(|e| DbError::storage_fault("flush", e))
    }

    /// Force buffered writes to stable storage. A commit record is not
    /// durable until this returns, so every commit path must call it
    /// before telling its caller the transaction is done.
    pub fn sync(&mut self) -> DbResult<()> {
        self.file
            .sync_all()
            .map_err(|e| DbError::storage_fault("fsync", e))
    }
}
