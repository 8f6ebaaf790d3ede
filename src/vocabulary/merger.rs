use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{debug, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::mmap::table::{align, put_cstr, put_i32, TableEncoder, WORD};
use crate::vocabulary::names::{join_tag, split_tag};
use crate::vocabulary::record_parser::{Record, RecordParser};

/// Merged data of one tag
#[derive(Debug, Clone, Default)]
pub struct TagData {
    pub name: String,                   // Short name, without the facet
    pub fields: BTreeMap<String, String>,
    pub id: Option<u32>,                // Assigned by write()
    pub ofs: u32,                       // Record position in the written text
    pub len: u32,
}

/// Merged data of one facet and its tags
#[derive(Debug, Clone, Default)]
pub struct FacetData {
    pub name: String,
    pub fields: BTreeMap<String, String>,
    pub tags: BTreeMap<String, TagData>,
    pub id: Option<u32>,
    pub ofs: u32,
    pub len: u32,
}

impl FacetData {
    fn obtain_tag(&mut self, name: &str) -> &mut TagData {
        self.tags.entry(name.to_string()).or_insert_with(|| TagData {
            name: name.to_string(),
            ..TagData::default()
        })
    }
}

/// Merges vocabulary sources and produces the canonical vocabulary text and
/// its facet and tag tables.
///
/// Later reads override fields of earlier ones. IDs and text offsets are
/// only known after `write`.
#[derive(Debug, Default)]
pub struct VocabularyMerger {
    facets: BTreeMap<String, FacetData>,
    tag_count: usize,
    written: bool,
}

impl VocabularyMerger {
    pub fn new() -> Self {
        Self::default()
    }

    fn obtain_facet(&mut self, name: &str) -> &mut FacetData {
        self.facets.entry(name.to_string()).or_insert_with(|| FacetData {
            name: name.to_string(),
            ..FacetData::default()
        })
    }

    fn obtain_tag(&mut self, fullname: &str) -> &mut TagData {
        let (facet, tag) = split_tag(fullname);
        self.obtain_facet(facet).obtain_tag(tag)
    }

    /// Merge every record of `reader`, returning the number of records merged
    pub fn read<R: BufRead>(&mut self, reader: R, source: &str) -> Result<usize> {
        let mut parser = RecordParser::new(reader, source);
        let mut merged = 0;
        self.written = false;

        while let Some(mut record) = parser.next_record()? {
            if let Some(facet) = record.remove("Facet") {
                self.obtain_facet(&facet).fields.extend(record);
            } else if let Some(tag) = record.remove("Tag") {
                self.obtain_tag(&tag).fields.extend(record);
            } else {
                warn!(source, line = parser.line(), "skipping record without Tag or Facet field");
                continue;
            }
            merged += 1;
        }

        debug!(source, records = merged, "merged vocabulary source");
        Ok(merged)
    }

    pub fn read_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        self.read(BufReader::new(file), &path.as_ref().display().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    pub fn tag_count(&self) -> usize {
        self.facets.values().map(|f| f.tags.len()).sum()
    }

    pub fn has_facet(&self, name: &str) -> bool {
        self.facets.contains_key(name)
    }

    pub fn has_tag(&self, fullname: &str) -> bool {
        self.tag(fullname).is_some()
    }

    pub fn facet(&self, name: &str) -> Option<&FacetData> {
        self.facets.get(name)
    }

    pub fn tag(&self, fullname: &str) -> Option<&TagData> {
        let (facet, tag) = split_tag(fullname);
        self.facets.get(facet)?.tags.get(tag)
    }

    /// ID of a tag, available once the merger has been written
    pub fn tag_id(&self, fullname: &str) -> Option<u32> {
        self.tag(fullname)?.id
    }

    pub fn facet_names(&self) -> BTreeSet<String> {
        self.facets.keys().cloned().collect()
    }

    pub fn tag_names(&self) -> BTreeSet<String> {
        self.facets
            .values()
            .flat_map(|f| f.tags.keys().map(move |t| join_tag(&f.name, t)))
            .collect()
    }

    /// Write the canonical vocabulary text, assigning IDs in write order
    pub fn write<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let mut pos: u64 = 0;
        let mut facet_id = 0;
        let mut tag_id = 0;

        for facet in self.facets.values_mut() {
            let mut text = String::new();
            write_deb_style_field(&mut text, "Facet", &facet.name);
            write_fields(&mut text, &facet.fields);
            text.push('\n');
            out.write_all(text.as_bytes())?;

            facet.id = Some(facet_id);
            facet.ofs = pos as u32;
            facet.len = text.len() as u32;
            facet_id += 1;
            pos += text.len() as u64;

            for tag in facet.tags.values_mut() {
                let mut text = String::new();
                write_deb_style_field(&mut text, "Tag", &join_tag(&facet.name, &tag.name));
                write_fields(&mut text, &tag.fields);
                text.push('\n');
                out.write_all(text.as_bytes())?;

                tag.id = Some(tag_id);
                tag.ofs = pos as u32;
                tag.len = text.len() as u32;
                tag_id += 1;
                pos += text.len() as u64;
            }
        }

        self.tag_count = tag_id as usize;
        self.written = true;
        Ok(pos)
    }

    fn check_written(&self) -> Result<()> {
        if !self.written {
            return Err(Error::new(
                ErrorKind::InvalidState,
                "vocabulary tables requested before the vocabulary was written".to_string(),
            ));
        }
        Ok(())
    }

    pub fn facet_indexer(&self) -> Result<FacetIndexer<'_>> {
        self.check_written()?;
        Ok(FacetIndexer { vm: self })
    }

    pub fn tag_indexer(&self) -> Result<TagIndexer<'_>> {
        self.check_written()?;
        Ok(TagIndexer { vm: self })
    }
}

fn write_fields(out: &mut String, fields: &Record) {
    for (name, value) in fields {
        write_deb_style_field(out, name, value);
    }
}

/// Append `name: value`, escaping embedded newlines so the parser reads the
/// same value back. Blank lines become ` .`; trailing ones are dropped, as
/// an empty line would end the record.
pub fn write_deb_style_field(out: &mut String, name: &str, value: &str) {
    out.push_str(name);
    out.push_str(": ");

    let mut lines = value.trim_end_matches(['\n', ' ', '\t']).split('\n');
    if let Some(first) = lines.next() {
        out.push_str(first);
    }
    for line in lines {
        out.push('\n');
        if line.trim().is_empty() {
            out.push_str(" .");
        } else {
            if !line.starts_with([' ', '\t']) {
                out.push(' ');
            }
            out.push_str(line);
        }
    }
    out.push('\n');
}

fn id_or_none(id: Option<u32>) -> i32 {
    id.map_or(-1, |id| id as i32)
}

/// Facet table: `{ ofs, len, first tag, last tag, name\0 }` records
pub struct FacetIndexer<'a> {
    vm: &'a VocabularyMerger,
}

impl TableEncoder for FacetIndexer<'_> {
    fn encoded_size(&self) -> usize {
        let mut size = self.vm.facets.len() * WORD;
        for name in self.vm.facets.keys() {
            size = align(size + 4 * WORD + name.len() + 1);
        }
        align(size)
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut pos = self.vm.facets.len() * WORD;
        for facet in self.vm.facets.values() {
            let id = facet.id.unwrap_or(0) as usize;
            put_i32(buf, id * WORD, pos as i32);

            put_i32(buf, pos, facet.ofs as i32);
            put_i32(buf, pos + WORD, facet.len as i32);
            let first = facet.tags.values().next().and_then(|t| t.id);
            let last = facet.tags.values().next_back().and_then(|t| t.id);
            put_i32(buf, pos + 2 * WORD, id_or_none(first));
            put_i32(buf, pos + 3 * WORD, id_or_none(last));
            pos = align(put_cstr(buf, pos + 4 * WORD, &facet.name));
        }
    }
}

/// Tag table: `{ ofs, len, facet id, fullname\0 }` records
pub struct TagIndexer<'a> {
    vm: &'a VocabularyMerger,
}

impl TableEncoder for TagIndexer<'_> {
    fn encoded_size(&self) -> usize {
        let mut size = self.vm.tag_count * WORD;
        for facet in self.vm.facets.values() {
            for tag in facet.tags.keys() {
                // facet + "::" + tag + '\0'
                size = align(size + 3 * WORD + facet.name.len() + tag.len() + 3);
            }
        }
        align(size)
    }

    fn encode(&self, buf: &mut [u8]) {
        let mut pos = self.vm.tag_count * WORD;
        for facet in self.vm.facets.values() {
            for tag in facet.tags.values() {
                let id = tag.id.unwrap_or(0) as usize;
                put_i32(buf, id * WORD, pos as i32);

                put_i32(buf, pos, tag.ofs as i32);
                put_i32(buf, pos + WORD, tag.len as i32);
                put_i32(buf, pos + 2 * WORD, id_or_none(facet.id));
                pos = align(put_cstr(buf, pos + 3 * WORD, &join_tag(&facet.name, &tag.name)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmap::table::{get_cstr, get_i32, OffsetTable};

    const TASTE_SMELL: &str = "\
Facet: taste
Description: Taste

Tag: taste::sweet
Description: Sweet

Tag: taste::salty
Description: Salty

Facet: smell
Description: Smell

Tag: smell::mold
Description: Mold

Tag: smell::fresh
Description: Fresh
";

    fn merged() -> VocabularyMerger {
        let mut vm = VocabularyMerger::new();
        vm.read(TASTE_SMELL.as_bytes(), "test.voc").unwrap();
        vm
    }

    fn encode(encoder: &dyn TableEncoder) -> Vec<u8> {
        let mut buf = vec![0u8; encoder.encoded_size()];
        encoder.encode(&mut buf);
        buf
    }

    #[test]
    fn ids_follow_sorted_names() {
        let mut vm = merged();
        assert_eq!(vm.tag_id("smell::fresh"), None);
        vm.write(&mut Vec::new()).unwrap();

        assert_eq!(vm.facet("smell").unwrap().id, Some(0));
        assert_eq!(vm.facet("taste").unwrap().id, Some(1));
        assert_eq!(vm.tag_id("smell::fresh"), Some(0));
        assert_eq!(vm.tag_id("smell::mold"), Some(1));
        assert_eq!(vm.tag_id("taste::salty"), Some(2));
        assert_eq!(vm.tag_id("taste::sweet"), Some(3));
        assert_eq!(vm.tag_id("taste::bitter"), None);
    }

    #[test]
    fn later_sources_override_fields() {
        let mut vm = merged();
        vm.read("Tag: taste::sweet\nDescription: Sugary\nStatus: new\n".as_bytes(), "local.voc").unwrap();
        let sweet = vm.tag("taste::sweet").unwrap();
        assert_eq!(sweet.fields["Description"], "Sugary");
        assert_eq!(sweet.fields["Status"], "new");
    }

    #[test]
    fn tags_without_facet_go_to_legacy() {
        let mut vm = VocabularyMerger::new();
        vm.read("Tag: gnome\nDescription: Old tag\n".as_bytes(), "old.voc").unwrap();
        assert!(vm.has_facet("legacy"));
        assert!(vm.has_tag("gnome"));
        assert!(vm.has_tag("legacy::gnome"));
        assert_eq!(vm.tag_names().into_iter().collect::<Vec<_>>(), vec!["legacy::gnome"]);
    }

    #[test]
    fn records_without_name_are_skipped() {
        let mut vm = VocabularyMerger::new();
        let merged = vm.read("Description: orphan\n\nFacet: a\n".as_bytes(), "x.voc").unwrap();
        assert_eq!(merged, 1);
        assert_eq!(vm.facet_names().into_iter().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn written_text_points_at_records() {
        let mut vm = merged();
        let mut out = Vec::new();
        let written = vm.write(&mut out).unwrap();
        assert_eq!(written as usize, out.len());

        let tag = vm.tag("taste::salty").unwrap();
        let text = std::str::from_utf8(&out[tag.ofs as usize..(tag.ofs + tag.len) as usize]).unwrap();
        assert_eq!(text, "Tag: taste::salty\nDescription: Salty\n\n");

        let facet = vm.facet("smell").unwrap();
        assert_eq!(facet.ofs, 0);
        assert!(std::str::from_utf8(&out).unwrap().starts_with("Facet: smell\nDescription: Smell\n\nTag: smell::fresh\n"));
    }

    #[test]
    fn escaped_fields_parse_back() {
        let mut text = String::new();
        write_deb_style_field(&mut text, "Description", "Short\nLong line\n\nParagraph\n indented");
        assert_eq!(text, "Description: Short\n Long line\n .\n Paragraph\n indented\n");

        let record = RecordParser::new(text.as_bytes(), "t").next_record().unwrap().unwrap();
        assert_eq!(record["Description"], "Short\nLong line\n\nParagraph\nindented");
    }

    #[test]
    fn trailing_blank_lines_stay_inside_the_record() {
        let mut vm = VocabularyMerger::new();
        vm.read("Tag: a::b\nDescription: Short\n .\nStatus: ok\n".as_bytes(), "t.voc").unwrap();
        let mut out = Vec::new();
        vm.write(&mut out).unwrap();

        let tag = vm.tag("a::b").unwrap();
        let slice = &out[tag.ofs as usize..(tag.ofs + tag.len) as usize];
        let record = RecordParser::new(slice, "t").next_record().unwrap().unwrap();
        assert_eq!(record["Status"], "ok");
        assert_eq!(record["Description"], "Short");

        let mut text = String::new();
        write_deb_style_field(&mut text, "Description", "x\n \ny\n\n");
        assert_eq!(text, "Description: x\n .\n y\n");
    }

    #[test]
    fn tables_need_a_written_vocabulary() {
        let vm = merged();
        assert_eq!(vm.facet_indexer().err().unwrap().kind, ErrorKind::InvalidState);
        assert!(vm.tag_indexer().is_err());
    }

    #[test]
    fn facet_table_has_contiguous_tag_ranges() {
        let mut vm = merged();
        vm.read("Facet: empty\n".as_bytes(), "more.voc").unwrap();
        vm.write(&mut Vec::new()).unwrap();

        let buf = encode(&vm.facet_indexer().unwrap());
        let table = OffsetTable::new(&buf).unwrap();
        assert_eq!(table.size(), 3);

        let range = |id: usize| {
            let rec = table.record(id).unwrap();
            (get_i32(rec, 8).unwrap(), get_i32(rec, 12).unwrap(), get_cstr(rec, 16).unwrap())
        };
        assert_eq!(range(0), (-1, -1, "empty"));
        assert_eq!(range(1), (0, 1, "smell"));
        assert_eq!(range(2), (2, 3, "taste"));
    }

    #[test]
    fn tag_table_records_facet_ids() {
        let mut vm = merged();
        vm.write(&mut Vec::new()).unwrap();

        let buf = encode(&vm.tag_indexer().unwrap());
        assert_eq!(buf.len() % WORD, 0);
        let table = OffsetTable::new(&buf).unwrap();
        assert_eq!(table.size(), 4);

        let rec = table.record(2).unwrap();
        assert_eq!(get_i32(rec, 8), Some(1));
        assert_eq!(get_cstr(rec, 12), Some("taste::salty"));
    }
}
