// Shared FAT on-disk definitions

pub mod constants;
pub mod directory;
pub mod timestamps;

pub use directory::{attributes, parse_83_name, short_name, DirectoryEntry};
