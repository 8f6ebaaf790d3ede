use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::stats::{CacheStats, IndexStats};
use crate::core::types::{Facet, Generation, Tag};
use crate::mmap::master::MasterIndex;
use crate::mmap::mmap_file::MmapFile;
use crate::mmap::table::{get_cstr, get_i32, OffsetTable, WORD};
use crate::vocabulary::names::{join_tag, tag_compare, LEGACY_FACET};
use crate::vocabulary::record_parser::{Record, RecordParser};

pub const FACET_TABLE: usize = 0;
pub const TAG_TABLE: usize = 1;

pub const DEFAULT_CACHE_SIZE: usize = 256;

// Facet record: ofs, len, first tag, last tag, name
const FACET_NAME_POS: usize = 4 * WORD;
// Tag record: ofs, len, facet id, name
const TAG_NAME_POS: usize = 3 * WORD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum RecordKey {
    Facet(u32),
    Tag(u32),
}

/// First line of the `Description` field
pub fn short_description(record: &Record) -> &str {
    let desc = long_description(record);
    desc.split('\n').next().unwrap_or(desc)
}

/// The whole `Description` field, empty when missing
pub fn long_description(record: &Record) -> &str {
    record.get("Description").map_or("", String::as_str)
}

/// Read-only view of a built vocabulary: the canonical text plus its
/// facet and tag tables.
///
/// `Facet` and `Tag` handles are bound to the generation of the index that
/// issued them; handles from another generation are rejected with `None`.
pub struct Vocabulary {
    index: MasterIndex,
    text: MmapFile,
    facet_count: usize,
    tag_count: usize,
    cache: Mutex<LruCache<RecordKey, Arc<Record>>>,     // Parsed text records
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl Vocabulary {
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(text: P, index: Q) -> Result<Self> {
        Self::open_with_cache(text, index, DEFAULT_CACHE_SIZE)
    }

    pub fn open_with_cache<P: AsRef<Path>, Q: AsRef<Path>>(
        text: P,
        index: Q,
        cache_size: usize,
    ) -> Result<Self> {
        let index = MasterIndex::open(index)?;
        let text = MmapFile::open_read_only(text)?;

        let facet_count = Self::check_table(&index, FACET_TABLE)?;
        let tag_count = Self::check_table(&index, TAG_TABLE)?;
        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        debug!(index = %index.path().display(), facets = facet_count, tags = tag_count, "opened vocabulary");
        Ok(Vocabulary {
            index,
            text,
            facet_count,
            tag_count,
            cache: Mutex::new(LruCache::new(cache_size)),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        })
    }

    fn check_table(index: &MasterIndex, n: usize) -> Result<usize> {
        let table = OffsetTable::new(index.require_table(n)?)
            .ok_or_else(|| Error::format(index.path(), format!("table {} has a corrupted offset array", n)))?;
        Ok(table.size())
    }

    fn facet_table(&self) -> OffsetTable<'_> {
        OffsetTable::trusted(self.index.table(FACET_TABLE).unwrap_or_default())
    }

    fn tag_table(&self) -> OffsetTable<'_> {
        OffsetTable::trusted(self.index.table(TAG_TABLE).unwrap_or_default())
    }

    pub fn generation(&self) -> Generation {
        self.index.generation()
    }

    pub fn facet_count(&self) -> usize {
        self.facet_count
    }

    pub fn tag_count(&self) -> usize {
        self.tag_count
    }

    pub fn is_empty(&self) -> bool {
        self.facet_count == 0
    }

    // Valid ID of a handle issued by this generation
    fn facet_id(&self, facet: &Facet) -> Option<u32> {
        (facet.generation == self.generation() && (facet.id as usize) < self.facet_count)
            .then_some(facet.id)
    }

    fn tag_id(&self, tag: &Tag) -> Option<u32> {
        (tag.generation == self.generation() && (tag.id as usize) < self.tag_count)
            .then_some(tag.id)
    }

    pub fn facet_by_id(&self, id: u32) -> Option<Facet> {
        ((id as usize) < self.facet_count).then(|| Facet { id, generation: self.generation() })
    }

    pub fn tag_by_id(&self, id: u32) -> Option<Tag> {
        ((id as usize) < self.tag_count).then(|| Tag { id, generation: self.generation() })
    }

    pub fn facet_by_name(&self, name: &str) -> Option<Facet> {
        let table = self.facet_table();
        let id = table.search_by(|id| Some(get_cstr(table.record(id)?, FACET_NAME_POS)?.cmp(name)))?;
        self.facet_by_id(id as u32)
    }

    /// Look up a tag by full name; names without a facet are legacy tags
    pub fn tag_by_name(&self, name: &str) -> Option<Tag> {
        if !name.contains("::") {
            return self.tag_by_name(&join_tag(LEGACY_FACET, name));
        }

        let table = self.tag_table();
        let id = table.search_by(|id| {
            Some(tag_compare(get_cstr(table.record(id)?, TAG_NAME_POS)?, name))
        })?;
        self.tag_by_id(id as u32)
    }

    pub fn has_facet(&self, name: &str) -> bool {
        self.facet_by_name(name).is_some()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tag_by_name(name).is_some()
    }

    pub fn facet_name(&self, facet: &Facet) -> Option<&str> {
        let id = self.facet_id(facet)?;
        get_cstr(self.facet_table().record(id as usize)?, FACET_NAME_POS)
    }

    /// Full `facet::tag` name
    pub fn tag_name(&self, tag: &Tag) -> Option<&str> {
        let id = self.tag_id(tag)?;
        get_cstr(self.tag_table().record(id as usize)?, TAG_NAME_POS)
    }

    pub fn tag_short_name(&self, tag: &Tag) -> Option<&str> {
        let name = self.tag_name(tag)?;
        Some(name.split_once("::").map_or(name, |(_, short)| short))
    }

    pub fn facet_of_tag(&self, tag: &Tag) -> Option<Facet> {
        let id = self.tag_id(tag)?;
        let facet = get_i32(self.tag_table().record(id as usize)?, 2 * WORD)?;
        self.facet_by_id(u32::try_from(facet).ok()?)
    }

    /// Tags of `facet`, in ID order
    pub fn tags_of_facet(&self, facet: &Facet) -> Vec<Tag> {
        let Some(range) = self.facet_tag_range(facet) else {
            return Vec::new();
        };
        range.filter_map(|id| self.tag_by_id(id)).collect()
    }

    // firstTag..=lastTag, None for facets without tags
    fn facet_tag_range(&self, facet: &Facet) -> Option<std::ops::RangeInclusive<u32>> {
        let id = self.facet_id(facet)?;
        let record = self.facet_table().record(id as usize)?;
        let first = u32::try_from(get_i32(record, 2 * WORD)?).ok()?;
        let last = u32::try_from(get_i32(record, 3 * WORD)?).ok()?;
        Some(first..=last)
    }

    pub fn facets(&self) -> impl Iterator<Item = Facet> + '_ {
        (0..self.facet_count as u32).map(|id| Facet { id, generation: self.generation() })
    }

    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        (0..self.tag_count as u32).map(|id| Tag { id, generation: self.generation() })
    }

    /// Raw text of a record: the stored offset and length into the text file
    fn record_text(&self, table: OffsetTable<'_>, id: u32) -> Option<&[u8]> {
        let record = table.record(id as usize)?;
        let ofs = usize::try_from(get_i32(record, 0)?).ok()?;
        let len = usize::try_from(get_i32(record, WORD)?).ok()?;
        self.text.slice(ofs, len)
    }

    fn load_record(&self, key: RecordKey) -> Result<Option<Arc<Record>>> {
        if let Some(record) = self.cache.lock().get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(Arc::clone(record)));
        }
        self.cache_misses.fetch_add(1, Ordering::Relaxed);

        let text = match key {
            RecordKey::Facet(id) => self.record_text(self.facet_table(), id),
            RecordKey::Tag(id) => self.record_text(self.tag_table(), id),
        };
        let Some(text) = text else {
            return Err(Error::format(&self.text.path, format!("{:?} points outside the vocabulary", key)));
        };

        let source = self.text.path.display().to_string();
        let record = RecordParser::new(text, &source).next_record()?.unwrap_or_default();
        let record = Arc::new(record);
        self.cache.lock().put(key, Arc::clone(&record));
        Ok(Some(record))
    }

    /// Parsed vocabulary record of `facet`, fields included
    pub fn facet_data(&self, facet: &Facet) -> Result<Option<Arc<Record>>> {
        match self.facet_id(facet) {
            Some(id) => self.load_record(RecordKey::Facet(id)),
            None => Ok(None),
        }
    }

    pub fn tag_data(&self, tag: &Tag) -> Result<Option<Arc<Record>>> {
        match self.tag_id(tag) {
            Some(id) => self.load_record(RecordKey::Tag(id)),
            None => Ok(None),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats::new(
            self.cache_hits.load(Ordering::Relaxed),
            self.cache_misses.load(Ordering::Relaxed),
            self.cache.lock().len(),
        )
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            generation: self.generation(),
            index_bytes: self.index.len(),
            data_bytes: self.text.len,
            facets: self.facet_count,
            tags: self.tag_count,
            items: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::BufWriter;
    use crate::mmap::master::MasterIndexWriter;
    use crate::vocabulary::merger::VocabularyMerger;

    const VOCABULARY: &str = "\
Facet: taste
Description: How it tastes

Tag: taste::sweet
Description: Sweet
 Like sugar.

Tag: taste::salty
Description: Salty

Facet: smell
Description: How it smells

Tag: smell::mold
Description: Mold

Tag: smell::fresh
Description: Fresh

Facet: empty
Description: Facet without tags

Tag: gnome
Description: Tag without facet
";

    fn build(dir: &Path) -> Vocabulary {
        let mut vm = VocabularyMerger::new();
        vm.read(VOCABULARY.as_bytes(), "test.voc").unwrap();

        let text = dir.join("vocabulary");
        let index = dir.join("vocabulary.idx");
        let mut out = BufWriter::new(File::create(&text).unwrap());
        vm.write(&mut out).unwrap();
        drop(out);

        let mut writer = MasterIndexWriter::new();
        writer.append(&vm.facet_indexer().unwrap());
        writer.append(&vm.tag_indexer().unwrap());
        writer.commit(&index).unwrap();

        Vocabulary::open_with_cache(&text, &index, 2).unwrap()
    }

    #[test]
    fn facets_and_tags_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let voc = build(dir.path());

        assert_eq!(voc.facet_count(), 4);
        assert_eq!(voc.tag_count(), 5);

        let smell = voc.facet_by_name("smell").unwrap();
        let taste = voc.facet_by_name("taste").unwrap();
        assert!(smell.id() < taste.id());
        assert!(voc.facet_by_name("sound").is_none());

        let salty = voc.tag_by_name("taste::salty").unwrap();
        assert_eq!(voc.tag_name(&salty), Some("taste::salty"));
        assert_eq!(voc.tag_short_name(&salty), Some("salty"));
        assert_eq!(voc.facet_of_tag(&salty), Some(taste));
        assert!(voc.tag_by_name("taste::bitter").is_none());
    }

    #[test]
    fn legacy_tags_resolve_without_facet() {
        let dir = tempfile::tempdir().unwrap();
        let voc = build(dir.path());

        let gnome = voc.tag_by_name("gnome").unwrap();
        assert_eq!(voc.tag_name(&gnome), Some("legacy::gnome"));
        assert_eq!(voc.facet_name(&voc.facet_of_tag(&gnome).unwrap()), Some("legacy"));
    }

    #[test]
    fn tags_of_facet_use_the_id_range() {
        let dir = tempfile::tempdir().unwrap();
        let voc = build(dir.path());

        let taste = voc.facet_by_name("taste").unwrap();
        let names: Vec<_> = voc
            .tags_of_facet(&taste)
            .iter()
            .filter_map(|t| voc.tag_name(t))
            .collect();
        assert_eq!(names, vec!["taste::salty", "taste::sweet"]);

        let empty = voc.facet_by_name("empty").unwrap();
        assert!(voc.tags_of_facet(&empty).is_empty());
    }

    #[test]
    fn records_are_parsed_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let voc = build(dir.path());

        let sweet = voc.tag_by_name("taste::sweet").unwrap();
        let data = voc.tag_data(&sweet).unwrap().unwrap();
        assert_eq!(data["Tag"], "taste::sweet");
        assert_eq!(short_description(&data), "Sweet");
        assert_eq!(long_description(&data), "Sweet\nLike sugar.");

        voc.tag_data(&sweet).unwrap();
        let stats = voc.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));

        let smell = voc.facet_by_name("smell").unwrap();
        let data = voc.facet_data(&smell).unwrap().unwrap();
        assert_eq!(short_description(&data), "How it smells");
    }

    #[test]
    fn handles_from_another_generation_are_rejected() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let a = build(dir_a.path());
        let b = build(dir_b.path());

        let tag = a.tag_by_name("smell::fresh").unwrap();
        assert!(b.tag_name(&tag).is_none());
        assert!(b.tag_data(&tag).unwrap().is_none());
        assert!(b.facet_of_tag(&tag).is_none());

        assert!(a.tag_by_id(99).is_none());
        assert!(a.facet_by_id(4).is_none());
    }

    #[test]
    fn iteration_covers_every_id() {
        let dir = tempfile::tempdir().unwrap();
        let voc = build(dir.path());

        let names: Vec<_> = voc.tags().filter_map(|t| voc.tag_name(&t).map(str::to_string)).collect();
        assert_eq!(names, vec!["legacy::gnome", "smell::fresh", "smell::mold", "taste::salty", "taste::sweet"]);
        assert_eq!(voc.facets().count(), 4);
        assert_eq!(voc.stats().tags, 5);
    }
}
