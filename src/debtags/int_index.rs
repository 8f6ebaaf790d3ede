use roaring::RoaringBitmap;
use crate::mmap::table::{align, get_i32, put_i32, OffsetTable, TableEncoder, WORD};

/// Builds both directions of the item↔tag association from integer pairs
pub struct IntIndexer {
    pkg_tags: Vec<RoaringBitmap>,   // package id -> tag ids
    tag_pkgs: Vec<RoaringBitmap>,   // tag id -> package ids
}

impl IntIndexer {
    pub fn new(pkg_count: usize, tag_count: usize) -> Self {
        IntIndexer {
            pkg_tags: vec![RoaringBitmap::new(); pkg_count],
            tag_pkgs: vec![RoaringBitmap::new(); tag_count],
        }
    }

    /// Associate `pkg` with `tag`; ids outside the declared ranges are ignored
    pub fn insert(&mut self, pkg: u32, tag: u32) -> bool {
        let (Some(tags), Some(pkgs)) = (
            self.pkg_tags.get_mut(pkg as usize),
            self.tag_pkgs.get_mut(tag as usize),
        ) else {
            return false;
        };
        tags.insert(tag);
        pkgs.insert(pkg);
        true
    }

    /// Table 1 of the debtags index: package id to tag ids
    pub fn pkg_indexer(&self) -> IntSetEncoder<'_> {
        IntSetEncoder { sets: &self.pkg_tags }
    }

    /// Table 2 of the debtags index: tag id to package ids
    pub fn tag_indexer(&self) -> IntSetEncoder<'_> {
        IntSetEncoder { sets: &self.tag_pkgs }
    }
}

/// `{ count, ids[count] }` records, ids ascending
pub struct IntSetEncoder<'a> {
    sets: &'a [RoaringBitmap],
}

impl TableEncoder for IntSetEncoder<'_> {
    fn encoded_size(&self) -> usize {
        let records: usize = self.sets.iter().map(|s| (1 + s.len() as usize) * WORD).sum();
        align(self.sets.len() * WORD + records)
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut pos = self.sets.len() * WORD;
        for (id, set) in self.sets.iter().enumerate() {
            put_i32(buf, id * WORD, pos as i32);
            put_i32(buf, pos, set.len() as i32);
            pos += WORD;
            for value in set {
                put_i32(buf, pos, value as i32);
                pos += WORD;
            }
        }
    }
}

/// Reader of a table written by `IntSetEncoder`
#[derive(Clone, Copy)]
pub struct IntSetTable<'a> {
    table: OffsetTable<'a>,
}

impl<'a> IntSetTable<'a> {
    /// Validate `buf`, checking every record fits in the table
    pub fn new(buf: &'a [u8]) -> Option<Self> {
        let table = IntSetTable { table: OffsetTable::new(buf)? };
        for id in 0..table.len() {
            let count = table.count(id as u32)?;
            let record = table.table.record(id)?;
            if (count + 1) * WORD > record.len() {
                return None;
            }
        }
        Some(table)
    }

    pub fn trusted(buf: &'a [u8]) -> Self {
        IntSetTable { table: OffsetTable::trusted(buf) }
    }

    pub fn len(&self) -> usize {
        self.table.size()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn count(&self, id: u32) -> Option<usize> {
        let count = get_i32(self.table.record(id as usize)?, 0)?;
        usize::try_from(count).ok()
    }

    /// Values of record `id`, ascending; nothing for unknown ids
    pub fn values(&self, id: u32) -> impl Iterator<Item = u32> + use<'a> {
        let record = self.table.record(id as usize).unwrap_or_default();
        let count = get_i32(record, 0).and_then(|c| usize::try_from(c).ok()).unwrap_or(0);
        (0..count).map_while(move |i| get_i32(record, (i + 1) * WORD).map(|v| v as u32))
    }

    pub fn get(&self, id: u32) -> RoaringBitmap {
        // Records are sorted, so the sorted fast path applies
        RoaringBitmap::from_sorted_iter(self.values(id)).unwrap_or_default()
    }

    pub fn cardinality(&self, id: u32) -> usize {
        self.count(id).unwrap_or(0)
    }

    pub fn contains(&self, id: u32, value: u32) -> bool {
        self.values(id).any(|v| v == value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(encoder: &dyn TableEncoder) -> Vec<u8> {
        let mut buf = vec![0u8; encoder.encoded_size()];
        encoder.encode(&mut buf);
        buf
    }

    fn sample() -> IntIndexer {
        let mut indexer = IntIndexer::new(3, 4);
        for (pkg, tag) in [(0, 1), (0, 3), (1, 1), (2, 0), (2, 1), (2, 3)] {
            assert!(indexer.insert(pkg, tag));
        }
        indexer
    }

    #[test]
    fn both_directions_are_encoded() {
        let indexer = sample();
        let pkg_buf = encode(&indexer.pkg_indexer());
        let tag_buf = encode(&indexer.tag_indexer());

        let pkgs = IntSetTable::new(&pkg_buf).unwrap();
        let tags = IntSetTable::new(&tag_buf).unwrap();
        assert_eq!(pkgs.len(), 3);
        assert_eq!(tags.len(), 4);

        assert_eq!(pkgs.values(2).collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(tags.values(1).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(tags.get(3).iter().collect::<Vec<_>>(), vec![0, 2]);
        assert!(tags.contains(0, 2));
        assert!(!tags.contains(0, 1));
    }

    #[test]
    fn unused_ids_have_empty_records() {
        let mut indexer = IntIndexer::new(2, 3);
        indexer.insert(1, 0);
        let buf = encode(&indexer.tag_indexer());
        let tags = IntSetTable::new(&buf).unwrap();
        assert_eq!(tags.cardinality(2), 0);
        assert!(tags.get(2).is_empty());
        assert!(tags.get(99).is_empty());
    }

    #[test]
    fn out_of_range_inserts_are_ignored() {
        let mut indexer = IntIndexer::new(1, 1);
        assert!(!indexer.insert(1, 0));
        assert!(!indexer.insert(0, 5));
    }

    #[test]
    fn oversized_counts_are_rejected() {
        let buf = encode(&sample().pkg_indexer());
        let mut broken = buf.clone();
        // record 0 starts right after the three offsets
        put_i32(&mut broken, 3 * WORD, 1000);
        assert!(IntSetTable::new(&broken).is_none());
    }
}
