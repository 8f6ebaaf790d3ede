use std::collections::HashMap;
use tracing::{debug, info};
use crate::coll::fast::FastCollection;
use crate::coll::text_format::write_collection;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::Timestamp;
use crate::debtags::int_index::IntIndexer;
use crate::debtags::pkgid::PkgIdGenerator;
use crate::debtags::reader::Debtags;
use crate::indexer::{write_data_file, IndexBuilder, Indexer};
use crate::mmap::master::MasterIndexWriter;
use crate::storage::layout::{IndexPaths, StorageLayout};
use crate::storage::source_dir::SourceDir;
use crate::vocabulary::names::{join_tag, tag_compare, LEGACY_FACET};
use crate::vocabulary::reader::Vocabulary;

/// Merges `*.tag` sources into the package-tags text and its package,
/// tag and association tables.
///
/// Tags without a facet are stored as `legacy::name`, the name the
/// vocabulary gives them. With a vocabulary attached, tags it does not
/// define are dropped.
#[derive(Default)]
pub struct DebtagsBuilder<'a> {
    vocabulary: Option<&'a Vocabulary>,
}

impl<'a> DebtagsBuilder<'a> {
    pub fn new() -> Self {
        DebtagsBuilder { vocabulary: None }
    }

    pub fn with_vocabulary(vocabulary: &'a Vocabulary) -> Self {
        DebtagsBuilder { vocabulary: Some(vocabulary) }
    }

    fn drop_unknown_tags(&self, coll: &mut FastCollection) {
        let Some(voc) = self.vocabulary else {
            return;
        };
        let unknown: Vec<String> = coll
            .all_tags()
            .filter(|tag| !voc.has_tag(tag))
            .map(str::to_string)
            .collect();
        for tag in &unknown {
            debug!(tag = %tag, "skipping tag unknown to the vocabulary");
            coll.remove_tag(tag);
        }
    }
}

/// Rename tags without a facet into the legacy one
fn qualify_bare_tags(coll: &mut FastCollection) {
    let bare: Vec<String> = coll
        .all_tags()
        .filter(|tag| !tag.contains("::"))
        .map(str::to_string)
        .collect();
    for tag in &bare {
        let items = coll.items_of(tag);
        coll.insert_tag(&items, &join_tag(LEGACY_FACET, tag));
        coll.remove_tag(tag);
    }
}

impl IndexBuilder for DebtagsBuilder<'_> {
    fn kind(&self) -> &'static str {
        "debtags"
    }

    fn source_timestamp(&self, dir: &SourceDir) -> Timestamp {
        dir.timestamp()
    }

    fn system_paths<'a>(&self, layout: &'a StorageLayout) -> &'a IndexPaths {
        &layout.system_tagdb
    }

    fn user_paths<'a>(&self, layout: &'a StorageLayout) -> &'a IndexPaths {
        &layout.user_tagdb
    }

    fn build(&self, sources: &[&SourceDir], out: &IndexPaths) -> Result<bool> {
        let mut merged = FastCollection::new();
        for dir in sources {
            dir.read_tags(&mut merged)?;
        }
        qualify_bare_tags(&mut merged);
        self.drop_unknown_tags(&mut merged);
        if merged.is_empty() {
            return Ok(false);
        }

        let pkgs = PkgIdGenerator::new(merged.tagged_items().map(str::to_string));
        let tags = PkgIdGenerator::with_order(merged.all_tags().map(str::to_string), tag_compare);
        let tag_ids: HashMap<&str, u32> = tags
            .names()
            .iter()
            .enumerate()
            .map(|(id, name)| (name.as_str(), id as u32))
            .collect();

        let mut ints = IntIndexer::new(pkgs.len(), tags.len());
        for (pkg_id, (_, item_tags)) in merged.iter().enumerate() {
            for tag in item_tags {
                if let Some(&tag_id) = tag_ids.get(tag.as_str()) {
                    ints.insert(pkg_id as u32, tag_id);
                }
            }
        }

        write_data_file(&out.data, |w| {
            write_collection(w, &merged)?;
            Ok(())
        })?;

        let mut master = MasterIndexWriter::new();
        master.append(&pkgs);
        master.append(&ints.pkg_indexer());
        master.append(&ints.tag_indexer());
        master.append(&tags);
        let generation = master.commit(&out.index)?;

        info!(packages = pkgs.len(), tags = tags.len(), %generation, "wrote debtags index");
        Ok(true)
    }
}

pub type DebtagsIndexer<'a> = Indexer<DebtagsBuilder<'a>>;

impl<'a> Indexer<DebtagsBuilder<'a>> {
    pub fn debtags(config: &Config, vocabulary: Option<&'a Vocabulary>) -> Self {
        Indexer::new(config, DebtagsBuilder { vocabulary })
    }
}

/// Rebuild the tag database if needed and open the copy that is up to date
pub fn obtain_working_debtags(config: &Config, vocabulary: Option<&Vocabulary>) -> Result<Option<Debtags>> {
    let mut indexer = DebtagsIndexer::debtags(config, vocabulary);
    match indexer.obtain_working()? {
        Some(paths) => Ok(Some(Debtags::open(&paths.data, &paths.index)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_tags_move_to_the_legacy_facet() {
        let mut coll = FastCollection::new();
        coll.insert_item("gedit", &set(&["gnome", "role::program"]));
        coll.insert_item("kate", &set(&["kde"]));
        qualify_bare_tags(&mut coll);

        assert_eq!(coll.tags_of("gedit"), set(&["legacy::gnome", "role::program"]));
        assert_eq!(coll.tags_of("kate"), set(&["legacy::kde"]));
        assert!(!coll.has_tag("gnome"));
    }

    #[test]
    fn mixed_tag_names_are_all_searchable() {
        let root = tempfile::tempdir().unwrap();
        let sources = root.path().join("sources");
        fs::create_dir_all(&sources).unwrap();
        let mut text = String::new();
        for n in 0..20 {
            text.push_str(&format!("pkg{:02}: works-with-format::f{:02}\n", n, n));
        }
        text.push_str("mime: works-with-mime\neditor: works-with::text, gnome\n");
        fs::write(sources.join("mixed.tag"), text).unwrap();

        let out = IndexPaths::for_data(root.path().join("package-tags"));
        assert!(DebtagsBuilder::new().build(&[&SourceDir::new(&sources)], &out).unwrap());
        let db = Debtags::open(&out.data, &out.index).unwrap();

        assert_eq!(db.tags_of_item("editor"), set(&["legacy::gnome", "works-with::text"]));
        assert_eq!(db.items_having_tag("works-with::text"), set(&["editor"]));
        assert_eq!(db.items_having_tag("works-with-mime"), set(&["mime"]));
        assert_eq!(db.items_having_tag("gnome"), set(&["editor"]));
        for tag in db.all_tags() {
            assert!(db.tag_id(tag).is_some(), "{}", tag);
        }
    }
}
