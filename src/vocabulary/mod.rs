pub mod merger;
pub mod names;
pub mod reader;
pub mod record_parser;

pub use merger::VocabularyMerger;
pub use names::tag_compare;
pub use reader::Vocabulary;
pub use record_parser::{Record, RecordParser};
