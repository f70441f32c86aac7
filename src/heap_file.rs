//! On-disk heap file: a flat sequence of fixed-size pages, with no tree
//! structure -- a table is just `file_len / page_size` pages.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use crate::error::DbResult;
use crate::heap_page::HeapPageLayout;
use crate::io::RandomAccessFile;
use crate::page_id::PageId;
use crate::tuple::TupleDesc;

/// A single table's backing file plus the page layout derived from its
/// tuple width and the process-wide page size.
pub struct HeapFile {
    table_id: u32,
    path: PathBuf,
    file: RandomAccessFile,
    tuple_desc: TupleDesc,
    layout: HeapPageLayout,
}

impl HeapFile {
    pub fn open(path: impl AsRef<Path>, table_id: u32, tuple_desc: TupleDesc, page_size: usize) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = RandomAccessFile::open(&path)?;
        let layout = HeapPageLayout::new(page_size, tuple_desc.byte_width());
        Ok(Self {
            table_id,
            path,
            file,
            tuple_desc,
            layout,
        })
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.tuple_desc
    }

    pub fn layout(&self) -> &HeapPageLayout {
        &self.layout
    }

    /// Number of whole pages currently on disk.
    pub fn num_pages(&self) -> DbResult<usize> {
        let len = self.file.len()?;
        Ok((len as usize) / self.layout.page_size)
    }

    /// Read one page's raw bytes from disk.
    pub fn read_page_bytes(&mut self, page_number: u32) -> DbResult<Vec<u8>> {
        let offset = page_number as u64 * self.layout.page_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; self.layout.page_size];
        self.file.read_exact_at(&mut buf)?;
        Ok(buf)
    }

    /// Overwrite one page's raw bytes on disk, extending the file if
    /// `page_number` is one past the current end.
    pub fn write_page_bytes(&mut self, page_number: u32, bytes: &[u8]) -> DbResult<()> {
        debug_assert_eq!(bytes.len(), self.layout.page_size);
        let offset = page_number as u64 * self.layout.page_size as u64;
        let min_len = offset + self.layout.page_size as u64;
        if self.file.len()? < min_len {
            self.file.set_len(min_len)?;
        }
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }

    /// Append a brand-new, all-empty page and return its id.
    pub fn allocate_page(&mut self) -> DbResult<PageId> {
        let page_number = self.num_pages()? as u32;
        let bytes = self.layout.empty_page_bytes();
        self.write_page_bytes(page_number, &bytes)?;
        Ok(PageId::new(self.table_id, page_number))
    }

    pub fn force_sync(&mut self) -> DbResult<()> {
        self.file.sync()
    }
}
