//! Building blocks shared by every binary sub-table.
//!
//! A sub-table starts with an array of `i32` offsets, one per record, and
//! the records follow it. The number of records is therefore the first
//! offset divided by the word size. All integers are native-endian `i32`
//! read through bounds-checked accessors.

use std::cmp::Ordering;

pub const WORD: usize = std::mem::size_of::<i32>();

/// Round `size` up to a multiple of the word size
pub fn align(size: usize) -> usize {
    size.div_ceil(WORD) * WORD
}

/// Produces the bytes of one sub-table of a master index
pub trait TableEncoder {
    /// Size of the encoded table, already aligned
    fn encoded_size(&self) -> usize;

    /// Fill `buf`, which is zeroed and exactly `encoded_size()` long
    fn encode(&self, buf: &mut [u8]);
}

pub fn put_i32(buf: &mut [u8], pos: usize, value: i32) {
    buf[pos..pos + WORD].copy_from_slice(&value.to_ne_bytes());
}

pub fn get_i32(buf: &[u8], pos: usize) -> Option<i32> {
    let bytes = buf.get(pos..pos.checked_add(WORD)?)?;
    Some(i32::from_ne_bytes(bytes.try_into().ok()?))
}

/// Copy `name` and its 0 terminator at `pos`, returning the position after it
pub fn put_cstr(buf: &mut [u8], pos: usize, name: &str) -> usize {
    let end = pos + name.len();
    buf[pos..end].copy_from_slice(name.as_bytes());
    buf[end] = 0;
    end + 1
}

/// 0-terminated UTF-8 string at `pos`, which must end inside `buf`
pub fn get_cstr(buf: &[u8], pos: usize) -> Option<&str> {
    let rest = buf.get(pos..)?;
    let end = rest.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&rest[..end]).ok()
}

/// Read-only view of an offset-array sub-table
#[derive(Debug, Clone, Copy)]
pub struct OffsetTable<'a> {
    buf: &'a [u8],
    size: usize,
}

impl<'a> OffsetTable<'a> {
    /// Validate the offset array of `buf`. An empty buffer is an empty table.
    pub fn new(buf: &'a [u8]) -> Option<Self> {
        if buf.is_empty() {
            return Some(OffsetTable { buf, size: 0 });
        }

        let first = usize::try_from(get_i32(buf, 0)?).ok()?;
        if first == 0 || first % WORD != 0 || first > buf.len() {
            return None;
        }

        let table = OffsetTable { buf, size: first / WORD };
        for id in 0..table.size {
            let offset = table.offset(id)?;
            if offset < first || offset > buf.len() {
                return None;
            }
        }
        Some(table)
    }

    /// View of a buffer that already passed `new`; accesses stay bounds-checked
    pub fn trusted(buf: &'a [u8]) -> Self {
        let size = get_i32(buf, 0)
            .and_then(|first| usize::try_from(first).ok())
            .map_or(0, |first| (first / WORD).min(buf.len() / WORD));
        OffsetTable { buf, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn data(&self) -> &'a [u8] {
        self.buf
    }

    pub fn offset(&self, id: usize) -> Option<usize> {
        if id >= self.size {
            return None;
        }
        usize::try_from(get_i32(self.buf, id * WORD)?).ok()
    }

    /// Bytes from the start of record `id` to the end of the table
    pub fn record(&self, id: usize) -> Option<&'a [u8]> {
        self.buf.get(self.offset(id)?..)
    }

    /// Bytes of record `id`, up to the start of the next record
    pub fn record_span(&self, id: usize) -> Option<&'a [u8]> {
        let start = self.offset(id)?;
        let end = if id + 1 < self.size {
            self.offset(id + 1)?
        } else {
            self.buf.len()
        };
        self.buf.get(start..end)
    }

    /// Binary search over record ids; `cmp` orders record `id` against the key
    pub fn search_by<F>(&self, mut cmp: F) -> Option<usize>
    where
        F: FnMut(usize) -> Option<Ordering>,
    {
        let mut lo = 0;
        let mut hi = self.size;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match cmp(mid)? {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Three records holding a single int each
    fn sample_table() -> Vec<u8> {
        let mut buf = vec![0u8; 6 * WORD];
        for id in 0..3 {
            put_i32(&mut buf, id * WORD, ((3 + id) * WORD) as i32);
            put_i32(&mut buf, (3 + id) * WORD, (id as i32 + 1) * 10);
        }
        buf
    }

    #[test]
    fn align_rounds_up_to_words() {
        assert_eq!(align(0), 0);
        assert_eq!(align(1), 4);
        assert_eq!(align(4), 4);
        assert_eq!(align(9), 12);
    }

    #[test]
    fn size_comes_from_first_offset() {
        let buf = sample_table();
        let table = OffsetTable::new(&buf).unwrap();
        assert_eq!(table.size(), 3);
        assert_eq!(get_i32(table.record(2).unwrap(), 0), Some(30));
        assert!(table.record(3).is_none());
    }

    #[test]
    fn empty_buffer_is_an_empty_table() {
        let table = OffsetTable::new(&[]).unwrap();
        assert_eq!(table.size(), 0);
        assert!(table.record(0).is_none());
        assert_eq!(table.search_by(|_| Some(Ordering::Equal)), None);
    }

    #[test]
    fn offsets_outside_the_table_are_rejected() {
        let mut buf = sample_table();
        put_i32(&mut buf, WORD, 1000);
        assert!(OffsetTable::new(&buf).is_none());

        let mut buf = sample_table();
        put_i32(&mut buf, 0, -4);
        assert!(OffsetTable::new(&buf).is_none());
    }

    #[test]
    fn search_finds_records() {
        let buf = sample_table();
        let table = OffsetTable::new(&buf).unwrap();
        let find = |key: i32| {
            table.search_by(|id| Some(get_i32(table.record(id)?, 0)?.cmp(&key)))
        };
        assert_eq!(find(10), Some(0));
        assert_eq!(find(30), Some(2));
        assert_eq!(find(25), None);
    }

    #[test]
    fn cstr_must_be_terminated() {
        let mut buf = vec![0u8; 8];
        let end = put_cstr(&mut buf, 0, "taste");
        assert_eq!(end, 6);
        assert_eq!(get_cstr(&buf, 0), Some("taste"));
        assert_eq!(get_cstr(b"abc", 0), None);
    }
}
