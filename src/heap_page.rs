//! Heap page layout: slot bitmap header + fixed-stride tuple slots.
//!
//! Slot count follows `floor(pageSize*8 / (tupleWidth*8 + 1))`: each slot
//! costs `tupleWidth` bytes of body plus one bit of header, and the
//! header itself is sized to exactly cover `slot_count` bits.

use bit_vec::BitVec;

use crate::tuple::{RecordId, Tuple, TupleDesc};

/// Page-format constants derived once per table from the configured page
/// size and the table's tuple width. Every page of a given table shares
/// the same layout.
#[derive(Debug, Clone, Copy)]
pub struct HeapPageLayout {
    pub page_size: usize,
    pub tuple_width: usize,
    pub slot_count: usize,
    pub header_len: usize,
}

impl HeapPageLayout {
    pub fn new(page_size: usize, tuple_width: usize) -> Self {
        let bits_per_tuple_including_header = tuple_width * 8 + 1;
        let slot_count = (page_size * 8) / bits_per_tuple_including_header;
        let header_len = (slot_count + 7) / 8;
        Self {
            page_size,
            tuple_width,
            slot_count,
            header_len,
        }
    }

    fn slot_offset(&self, slot: usize) -> usize {
        self.header_len + slot * self.tuple_width
    }

    /// A freshly allocated, all-empty page image: zeroed bitmap, zeroed
    /// body. Bits beyond `slot_count` in the last header byte stay zero,
    /// since no other operation ever sets them.
    pub fn empty_page_bytes(&self) -> Vec<u8> {
        vec![0u8; self.page_size]
    }

    pub fn is_slot_used(&self, bytes: &[u8], slot: usize) -> bool {
        let header = BitVec::from_bytes(&bytes[..self.header_len]);
        header.get(slot).unwrap_or(false)
    }

    fn set_slot_used(&self, bytes: &mut [u8], slot: usize, used: bool) {
        let mut header = BitVec::from_bytes(&bytes[..self.header_len]);
        header.set(slot, used);
        bytes[..self.header_len].copy_from_slice(&header.to_bytes());
    }

    /// First slot with its bitmap bit clear, if any.
    pub fn find_free_slot(&self, bytes: &[u8]) -> Option<usize> {
        (0..self.slot_count).find(|&slot| !self.is_slot_used(bytes, slot))
    }

    pub fn count_used_slots(&self, bytes: &[u8]) -> usize {
        (0..self.slot_count)
            .filter(|&slot| self.is_slot_used(bytes, slot))
            .count()
    }

    pub fn read_tuple(&self, bytes: &[u8], desc: &TupleDesc, slot: usize) -> Tuple {
        let start = self.slot_offset(slot);
        let end = start + self.tuple_width;
        let mut tuple = Tuple::from_bytes(desc.clone(), &bytes[start..end]);
        tuple.set_record_id(RecordId {
            page_id: crate::page_id::PageId::new(0, 0), // caller overwrites below
            slot,
        });
        tuple
    }

    /// Insert `tuple` into the first free slot of `bytes`, stamping its
    /// `RecordId`. Returns the slot used, or `None` if the page is full.
    pub fn insert_into_free_slot(
        &self,
        bytes: &mut [u8],
        desc: &TupleDesc,
        page_id: crate::page_id::PageId,
        tuple: &mut Tuple,
    ) -> Option<usize> {
        let slot = self.find_free_slot(bytes)?;
        let start = self.slot_offset(slot);
        let end = start + self.tuple_width;
        debug_assert_eq!(desc, tuple.desc());
        bytes[start..end].copy_from_slice(&tuple.to_bytes());
        self.set_slot_used(bytes, slot, true);
        let rid = RecordId { page_id, slot };
        tuple.set_record_id(rid);
        Some(slot)
    }

    /// Clear the bitmap bit for `slot`. The tuple bytes themselves (and
    /// thus any `RecordId` a caller is still holding) are left untouched
    /// -- only the occupancy bit flips.
    pub fn delete_slot(&self, bytes: &mut [u8], slot: usize) {
        self.set_slot_used(bytes, slot, false);
    }

    /// All occupied tuples on the page, in slot order.
    pub fn iter_tuples(&self, bytes: &[u8], desc: &TupleDesc, page_id: crate::page_id::PageId) -> Vec<Tuple> {
        (0..self.slot_count)
            .filter(|&slot| self.is_slot_used(bytes, slot))
            .map(|slot| {
                let mut t = self.read_tuple(bytes, desc, slot);
                t.set_record_id(RecordId { page_id, slot });
                t
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_id::PageId;

    #[test]
    fn slot_count_matches_bitmap_formula() {
        // 2 int fields => 8 bytes/tuple; formula: floor(4096*8 / (8*8+1))
        let layout = HeapPageLayout::new(4096, 8);
        assert_eq!(layout.slot_count, (4096 * 8) / (8 * 8 + 1));
        assert_eq!(layout.header_len, (layout.slot_count + 7) / 8);
    }

    #[test]
    fn round_trip_preserves_padding_bits() {
        let layout = HeapPageLayout::new(4096, 8);
        let mut bytes = layout.empty_page_bytes();
        let desc = TupleDesc::ints(2);
        let pid = PageId::new(1, 0);

        let mut t = Tuple::new(desc.clone(), vec![7, 9]);
        let slot = layout
            .insert_into_free_slot(&mut bytes, &desc, pid, &mut t)
            .unwrap();
        assert_eq!(slot, 0);

        let before = bytes.clone();
        // re-wrap through a fresh layout/bytes pair: should be byte-identical
        let layout2 = HeapPageLayout::new(4096, 8);
        assert_eq!(layout2.empty_page_bytes().len(), bytes.len());
        assert_eq!(before, bytes);

        // bits beyond slot_count must stay zero
        let header = BitVec::from_bytes(&bytes[..layout.header_len]);
        for i in layout.slot_count..header.len() {
            assert!(!header.get(i).unwrap());
        }
    }

    #[test]
    fn delete_preserves_record_id_slot() {
        let layout = HeapPageLayout::new(4096, 8);
        let mut bytes = layout.empty_page_bytes();
        let desc = TupleDesc::ints(2);
        let pid = PageId::new(1, 0);
        let mut t = Tuple::new(desc.clone(), vec![1, 2]);
        let slot = layout
            .insert_into_free_slot(&mut bytes, &desc, pid, &mut t)
            .unwrap();
        assert!(layout.is_slot_used(&bytes, slot));
        layout.delete_slot(&mut bytes, slot);
        assert!(!layout.is_slot_used(&bytes, slot));
        // RecordId on the in-memory tuple still points at the now-empty slot.
        assert_eq!(t.record_id().unwrap().slot, slot);
    }
}
