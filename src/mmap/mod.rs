pub mod master;
pub mod mmap_file;
pub mod table;

pub use master::{MasterIndex, MasterIndexWriter};
pub use mmap_file::MmapFile;
pub use table::{OffsetTable, TableEncoder};
