pub mod coll;
pub mod core;
pub mod debtags;
pub mod indexer;
pub mod mmap;
pub mod storage;
pub mod vocabulary;

pub use crate::coll::FastCollection;
pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::types::{Facet, Generation, Tag};
pub use crate::debtags::Debtags;
pub use crate::indexer::{obtain_working_debtags, obtain_working_vocabulary, DebtagsIndexer, VocabularyIndexer};
pub use crate::vocabulary::Vocabulary;

/*
┌──────────────────────────────────── BUILD PATH ─────────────────────────────────────┐
│                                                                                      │
│     .voc files  ──► RecordParser ──► VocabularyMerger ──► vocabulary (text)          │
│                                           │                                          │
│                                           ├─ FacetIndexer ─┐                         │
│                                           └─ TagIndexer ───┴─► vocabulary.idx        │
│                                                                                      │
│     .tag files  ──► TextFormatParser ──► FastCollection ──► package-tags (text)      │
│                                           │                                          │
│                                           ├─ PkgIdGenerator (packages)  table 0      │
│                                           ├─ IntIndexer pkg -> tags     table 1      │
│                                           ├─ IntIndexer tag -> pkgs     table 2      │
│                                           └─ PkgIdGenerator (tags)      table 3      │
│                                                                ─► package-tags.idx   │
│                                                                                      │
│   Indexer<B: IndexBuilder>                                                           │
│   • Timestamps: main/user source, main/user data, main/user index                    │
│   • rebuild_if_needed: system location if writable and no user sources, else user   │
│   • delete_redundant_user_index, up_to_date_paths, obtain_working                    │
│   • FileLock on <index>.lock while deciding and rebuilding                           │
└──────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── READ PATH ──────────────────────────────────────┐
│                                                                                      │
│   MasterIndex (mmap)                                                                 │
│   ┌──────────────────────────────────────────────────────────────┐                  │
│   │ "DTGX" │ version │ generation uuid │ table count │ directory  │                  │
│   │ { offset, len, crc32 } * N                                    │                  │
│   │ table 0 │ table 1 │ ... (word aligned)                        │                  │
│   └──────────────────────────────────────────────────────────────┘                  │
│                                                                                      │
│   Vocabulary                          Debtags                                        │
│   • facet/tag tables (OffsetTable)    • PkgIdTable by name / by id                   │
│   • binary search by tag_compare      • IntSetTable -> RoaringBitmap                 │
│   • text records via MmapFile         • set algebra on integer ids                   │
│   • LRU of parsed records             • names only at the API boundary               │
└──────────────────────────────────────────────────────────────────────────────────────┘
*/
