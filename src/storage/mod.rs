pub mod file_lock;
pub mod layout;
pub mod source_dir;

pub use file_lock::FileLock;
pub use layout::{IndexPaths, StorageLayout};
pub use source_dir::{FileType, SourceDir};
