// FAT12 boot-volume reader: on-disk structures, cluster chains, streams and path lookup

pub mod fat_common;
pub mod fat12;
pub mod loader;

#[cfg(test)]
pub mod test_helpers;

pub use fat_common::{parse_83_name, short_name, DirectoryEntry};
pub use fat12::{
    BootSector, FatFile, FileHandle, MountOptions, Volume, VolumeInfo, VolumeLayout,
    MAX_FILE_HANDLES,
};
pub use loader::{load_file, load_to_vec, DEFAULT_CHUNK_SIZE};
