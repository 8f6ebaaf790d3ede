use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use roaring::RoaringBitmap;
use tracing::debug;
use crate::coll::fast::FastCollection;
use crate::core::error::{Error, Result};
use crate::core::stats::IndexStats;
use crate::core::types::{file_timestamp, Generation, Timestamp};
use crate::debtags::int_index::IntSetTable;
use crate::debtags::pkgid::{lexicographic, PkgIdTable};
use crate::mmap::master::MasterIndex;
use crate::vocabulary::names::tag_compare;

pub const PKGID_TABLE: usize = 0;
pub const PKG_TAGS_TABLE: usize = 1;
pub const TAG_PKGS_TABLE: usize = 2;
pub const TAG_NAMES_TABLE: usize = 3;

/// Read path over a built debtags index.
///
/// Names are translated to IDs by binary search at the API boundary; the
/// queries themselves run on integer sets.
pub struct Debtags {
    index: MasterIndex,
    tagdb: PathBuf,
}

impl Debtags {
    /// Open the index of the tag database `tagdb`
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(tagdb: P, index: Q) -> Result<Self> {
        let index = MasterIndex::open(index)?;
        let invalid = |n: usize| Error::format(index.path(), format!("table {} is corrupted", n));

        let pkgs = PkgIdTable::new(index.require_table(PKGID_TABLE)?).ok_or_else(|| invalid(PKGID_TABLE))?;
        let tags = PkgIdTable::with_order(index.require_table(TAG_NAMES_TABLE)?, tag_compare)
            .ok_or_else(|| invalid(TAG_NAMES_TABLE))?;
        let pkg_tags = IntSetTable::new(index.require_table(PKG_TAGS_TABLE)?).ok_or_else(|| invalid(PKG_TAGS_TABLE))?;
        let tag_pkgs = IntSetTable::new(index.require_table(TAG_PKGS_TABLE)?).ok_or_else(|| invalid(TAG_PKGS_TABLE))?;

        if pkg_tags.len() != pkgs.len() {
            return Err(invalid(PKG_TAGS_TABLE));
        }
        if tag_pkgs.len() != tags.len() {
            return Err(invalid(TAG_PKGS_TABLE));
        }

        debug!(index = %index.path().display(), packages = pkgs.len(), tags = tags.len(), "opened debtags index");
        Ok(Debtags {
            index,
            tagdb: tagdb.as_ref().to_path_buf(),
        })
    }

    fn table(&self, n: usize) -> &[u8] {
        self.index.table(n).unwrap_or_default()
    }

    fn pkgs(&self) -> PkgIdTable<'_> {
        PkgIdTable::trusted(self.table(PKGID_TABLE), lexicographic)
    }

    fn tags(&self) -> PkgIdTable<'_> {
        PkgIdTable::trusted(self.table(TAG_NAMES_TABLE), tag_compare)
    }

    fn pkg_tags(&self) -> IntSetTable<'_> {
        IntSetTable::trusted(self.table(PKG_TAGS_TABLE))
    }

    fn tag_pkgs(&self) -> IntSetTable<'_> {
        IntSetTable::trusted(self.table(TAG_PKGS_TABLE))
    }

    pub fn generation(&self) -> Generation {
        self.index.generation()
    }

    /// The text tag database this index was built with
    pub fn tagdb_path(&self) -> &Path {
        &self.tagdb
    }

    pub fn index_path(&self) -> &Path {
        self.index.path()
    }

    pub fn package_count(&self) -> usize {
        self.pkgs().len()
    }

    pub fn tag_count(&self) -> usize {
        self.tags().len()
    }

    pub fn is_empty(&self) -> bool {
        self.package_count() == 0
    }

    pub fn item_id(&self, item: &str) -> Option<u32> {
        self.pkgs().by_name(item)
    }

    pub fn item_name(&self, id: u32) -> Option<&str> {
        self.pkgs().by_id(id)
    }

    /// Names without a facet find their `legacy::` tag
    pub fn tag_id(&self, tag: &str) -> Option<u32> {
        self.tags().by_name(tag)
    }

    pub fn tag_name(&self, id: u32) -> Option<&str> {
        self.tags().by_id(id)
    }

    pub fn has_item(&self, item: &str) -> bool {
        self.item_id(item).is_some()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag_id(tag).is_some()
    }

    pub fn tag_ids_of_item(&self, item: u32) -> RoaringBitmap {
        self.pkg_tags().get(item)
    }

    pub fn item_ids_having_tag(&self, tag: u32) -> RoaringBitmap {
        self.tag_pkgs().get(tag)
    }

    /// Intersection of the item sets of `tags`; empty for an empty query
    pub fn item_ids_having_all(&self, tags: &RoaringBitmap) -> RoaringBitmap {
        let mut iter = tags.iter();
        let Some(first) = iter.next() else {
            return RoaringBitmap::new();
        };

        let mut result = self.item_ids_having_tag(first);
        for tag in iter {
            if result.is_empty() {
                break;
            }
            result &= self.item_ids_having_tag(tag);
        }
        result
    }

    fn item_names(&self, ids: &RoaringBitmap) -> BTreeSet<String> {
        let pkgs = self.pkgs();
        ids.iter().filter_map(|id| pkgs.by_id(id)).map(str::to_string).collect()
    }

    fn tag_names(&self, ids: &RoaringBitmap) -> BTreeSet<String> {
        let tags = self.tags();
        ids.iter().filter_map(|id| tags.by_id(id)).map(str::to_string).collect()
    }

    pub fn tags_of_item(&self, item: &str) -> BTreeSet<String> {
        match self.item_id(item) {
            Some(id) => self.tag_names(&self.tag_ids_of_item(id)),
            None => BTreeSet::new(),
        }
    }

    pub fn items_having_tag(&self, tag: &str) -> BTreeSet<String> {
        match self.tag_id(tag) {
            Some(id) => self.item_names(&self.item_ids_having_tag(id)),
            None => BTreeSet::new(),
        }
    }

    /// Items carrying every tag in `tags`; empty when `tags` is empty or
    /// names an unknown tag
    pub fn items_having_all_tags(&self, tags: &BTreeSet<String>) -> BTreeSet<String> {
        let mut ids = RoaringBitmap::new();
        for tag in tags {
            match self.tag_id(tag) {
                Some(id) => {
                    ids.insert(id);
                }
                None => return BTreeSet::new(),
            }
        }
        self.item_names(&self.item_ids_having_all(&ids))
    }

    /// Tags with at least one item, in tag order
    pub fn all_tags(&self) -> impl Iterator<Item = &str> {
        self.tags().iter()
    }

    pub fn all_items(&self) -> impl Iterator<Item = &str> {
        self.pkgs().iter()
    }

    /// `(item, tags)` pairs in item order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        let pkgs = self.pkgs();
        let tags = self.tags();
        let pkg_tags = self.pkg_tags();
        (0..pkgs.len() as u32).filter_map(move |id| {
            let item = pkgs.by_id(id)?;
            let names = pkg_tags.values(id).filter_map(|t| tags.by_id(t)).collect();
            Some((item, names))
        })
    }

    /// Copy the whole index into an in-memory collection
    pub fn to_collection(&self) -> FastCollection {
        let mut coll = FastCollection::new();
        for (item, tags) in self.iter() {
            let tags: BTreeSet<String> = tags.into_iter().map(str::to_string).collect();
            coll.insert_item(item, &tags);
        }
        coll
    }

    /// Modification time of the tag database this index describes
    pub fn timestamp(&self) -> Timestamp {
        file_timestamp(&self.tagdb)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            generation: self.generation(),
            index_bytes: self.index.len(),
            data_bytes: std::fs::metadata(&self.tagdb).map_or(0, |m| m.len() as usize),
            facets: 0,
            tags: self.tag_count(),
            items: self.package_count(),
        }
    }
}
