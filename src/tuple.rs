//! Minimal tuple/field layer: just enough of a value system for the page
//! store's `insert_tuple`/`delete_tuple` surface to have a concrete tuple
//! type, and for a descriptor to report the byte width the slot-count
//! computation needs. No string fields, no predicates -- only integer
//! fields, since nothing else in this store needs them.

use crate::page_id::PageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
}

impl FieldType {
    pub fn byte_width(self) -> usize {
        match self {
            FieldType::Int => 4,
        }
    }
}

/// Ordered list of field types. Reports the fixed byte width of a tuple,
/// which the page store uses to compute `slot_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleDesc {
    fields: Vec<FieldType>,
}

impl TupleDesc {
    pub fn new(fields: Vec<FieldType>) -> Self {
        Self { fields }
    }

    pub fn ints(n: usize) -> Self {
        Self::new(vec![FieldType::Int; n])
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, i: usize) -> FieldType {
        self.fields[i]
    }

    /// Fixed on-disk byte width of one tuple, as used by the slot-count
    /// formula.
    pub fn byte_width(&self) -> usize {
        self.fields.iter().map(|f| f.byte_width()).sum()
    }
}

/// `RecordId { page_id, slot }`. Deletion clears the slot's bitmap bit but
/// never touches the tuple's `RecordId` -- a `RecordId` a caller is still
/// holding after a delete keeps pointing at the now-empty slot rather
/// than being nulled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    desc: TupleDesc,
    cells: Vec<i32>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(desc: TupleDesc, cells: Vec<i32>) -> Self {
        assert_eq!(desc.num_fields(), cells.len(), "tuple/descriptor width mismatch");
        Self {
            desc,
            cells,
            record_id: None,
        }
    }

    pub fn desc(&self) -> &TupleDesc {
        &self.desc
    }

    pub fn get_field(&self, i: usize) -> i32 {
        self.cells[i]
    }

    pub fn set_field(&mut self, i: usize, value: i32) {
        self.cells[i] = value;
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: RecordId) {
        self.record_id = Some(rid);
    }

    /// Big-endian fixed-width encoding: each field is 4 bytes, in field
    /// order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.desc.byte_width());
        for &cell in &self.cells {
            buf.extend_from_slice(&cell.to_be_bytes());
        }
        buf
    }

    pub fn from_bytes(desc: TupleDesc, bytes: &[u8]) -> Self {
        let mut cells = Vec::with_capacity(desc.num_fields());
        let mut offset = 0;
        for _ in 0..desc.num_fields() {
            let width = FieldType::Int.byte_width();
            let arr: [u8; 4] = bytes[offset..offset + width].try_into().unwrap();
            cells.push(i32::from_be_bytes(arr));
            offset += width;
        }
        Self {
            desc,
            cells,
            record_id: None,
        }
    }
}
