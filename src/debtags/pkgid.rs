use std::cmp::Ordering;
use crate::mmap::table::{align, get_cstr, put_cstr, put_i32, OffsetTable, TableEncoder, WORD};

/// Order in which names are stored, and therefore searched
pub type NameOrder = fn(&str, &str) -> Ordering;

pub fn lexicographic(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}

/// Encodes a sorted name table: an offset array followed by the
/// 0-terminated names. A name's ID is its position in the sort.
pub struct PkgIdGenerator {
    names: Vec<String>,
}

impl PkgIdGenerator {
    /// Package names in plain lexicographic order
    pub fn new<I: IntoIterator<Item = String>>(names: I) -> Self {
        Self::with_order(names, lexicographic)
    }

    pub fn with_order<I: IntoIterator<Item = String>>(names: I, order: NameOrder) -> Self {
        let mut names: Vec<String> = names.into_iter().collect();
        names.sort_by(|a, b| order(a, b));
        names.dedup();
        PkgIdGenerator { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in ID order
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl TableEncoder for PkgIdGenerator {
    fn encoded_size(&self) -> usize {
        let names: usize = self.names.iter().map(|n| n.len() + 1).sum();
        align(self.names.len() * WORD + names)
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut pos = self.names.len() * WORD;
        for (id, name) in self.names.iter().enumerate() {
            put_i32(buf, id * WORD, pos as i32);
            pos = put_cstr(buf, pos, name);
        }
    }
}

/// Reader of a table written by `PkgIdGenerator`
#[derive(Clone, Copy)]
pub struct PkgIdTable<'a> {
    table: OffsetTable<'a>,
    order: NameOrder,
}

impl<'a> PkgIdTable<'a> {
    pub fn new(buf: &'a [u8]) -> Option<Self> {
        Self::with_order(buf, lexicographic)
    }

    /// Validate `buf`, whose names were sorted with `order`
    pub fn with_order(buf: &'a [u8], order: NameOrder) -> Option<Self> {
        let table = OffsetTable::new(buf)?;
        let reader = PkgIdTable { table, order };
        if (0..table.size()).all(|id| reader.by_id(id as u32).is_some()) {
            Some(reader)
        } else {
            None
        }
    }

    pub fn trusted(buf: &'a [u8], order: NameOrder) -> Self {
        PkgIdTable { table: OffsetTable::trusted(buf), order }
    }

    pub fn len(&self) -> usize {
        self.table.size()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Name with ID `id`; the name must end before the next record
    pub fn by_id(&self, id: u32) -> Option<&'a str> {
        get_cstr(self.table.record_span(id as usize)?, 0)
    }

    pub fn by_name(&self, name: &str) -> Option<u32> {
        let order = self.order;
        self.table
            .search_by(|id| Some(order(self.by_id(id as u32)?, name)))
            .map(|id| id as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a str> + use<'a> {
        let table = *self;
        (0..self.len() as u32).filter_map(move |id| table.by_id(id))
    }
}
