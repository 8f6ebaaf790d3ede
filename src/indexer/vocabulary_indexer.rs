use tracing::info;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::types::Timestamp;
use crate::indexer::{write_data_file, IndexBuilder, Indexer};
use crate::mmap::master::MasterIndexWriter;
use crate::storage::layout::{IndexPaths, StorageLayout};
use crate::storage::source_dir::SourceDir;
use crate::vocabulary::merger::VocabularyMerger;
use crate::vocabulary::reader::Vocabulary;

/// Merges `*.voc` sources into the canonical vocabulary and its facet and
/// tag tables
#[derive(Debug, Clone, Copy, Default)]
pub struct VocabularyBuilder;

impl IndexBuilder for VocabularyBuilder {
    fn kind(&self) -> &'static str {
        "vocabulary"
    }

    fn source_timestamp(&self, dir: &SourceDir) -> Timestamp {
        dir.vocabulary_timestamp()
    }

    fn system_paths<'a>(&self, layout: &'a StorageLayout) -> &'a IndexPaths {
        &layout.system_vocabulary
    }

    fn user_paths<'a>(&self, layout: &'a StorageLayout) -> &'a IndexPaths {
        &layout.user_vocabulary
    }

    fn build(&self, sources: &[&SourceDir], out: &IndexPaths) -> Result<bool> {
        let mut merger = VocabularyMerger::new();
        for dir in sources {
            dir.read_vocabularies(&mut merger)?;
        }
        if merger.is_empty() {
            return Ok(false);
        }

        let mut bytes = 0;
        write_data_file(&out.data, |w| {
            bytes = merger.write(w)?;
            Ok(())
        })?;

        let mut master = MasterIndexWriter::new();
        master.append(&merger.facet_indexer()?);
        master.append(&merger.tag_indexer()?);
        let generation = master.commit(&out.index)?;

        info!(
            facets = merger.facet_count(),
            tags = merger.tag_count(),
            bytes,
            %generation,
            "wrote vocabulary index"
        );
        Ok(true)
    }
}

pub type VocabularyIndexer = Indexer<VocabularyBuilder>;

impl Indexer<VocabularyBuilder> {
    pub fn vocabulary(config: &Config) -> Self {
        Indexer::new(config, VocabularyBuilder)
    }
}

/// Rebuild the vocabulary if needed and open the copy that is up to date
pub fn obtain_working_vocabulary(config: &Config) -> Result<Option<Vocabulary>> {
    let mut indexer = VocabularyIndexer::vocabulary(config);
    match indexer.obtain_working()? {
        Some(paths) => Ok(Some(Vocabulary::open_with_cache(&paths.data, &paths.index, config.record_cache_size)?)),
        None => Ok(None),
    }
}
