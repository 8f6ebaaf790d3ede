pub mod fast;
pub mod text_format;

pub use fast::FastCollection;
pub use text_format::{ItemSet, TagSet, TextFormatParser};
