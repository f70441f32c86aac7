//! `PageId`: `(table_id, page_number)`, with equality and hashing defined
//! on both fields and an on-disk encoding of `[4 bytes table_id | 4 bytes
//! page_number]`.

use std::fmt;
use std::io::Read;

use crate::io::{Decodeable, Encodeable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId {
    pub table_id: u32,
    pub page_number: u32,
}

impl PageId {
    pub fn new(table_id: u32, page_number: u32) -> Self {
        Self {
            table_id,
            page_number,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page({}, {})", self.table_id, self.page_number)
    }
}

impl Encodeable for PageId {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8);
        buf.extend_from_slice(&self.table_id.to_le_bytes());
        buf.extend_from_slice(&self.page_number.to_le_bytes());
        buf
    }
}

impl Decodeable for PageId {
    fn decode_from<R: Read>(reader: &mut R) -> crate::error::DbResult<Self> {
        let table_id = u32::decode_from(reader)?;
        let page_number = u32::decode_from(reader)?;
        Ok(PageId::new(table_id, page_number))
    }
}
