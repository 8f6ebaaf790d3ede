pub mod int_index;
pub mod pkgid;
pub mod reader;

pub use int_index::{IntIndexer, IntSetTable};
pub use pkgid::{PkgIdGenerator, PkgIdTable};
pub use reader::Debtags;
