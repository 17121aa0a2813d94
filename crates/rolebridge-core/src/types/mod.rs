//! Directory types

mod entry;
mod lookup;

pub use entry::DirectoryEntry;
pub use lookup::Lookup;
