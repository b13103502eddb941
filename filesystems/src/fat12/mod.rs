// FAT12 read-only volume access

pub mod boot_sector;
pub mod fat_table;
pub mod file;
pub mod path_resolver;
pub mod volume;

pub use boot_sector::{BootSector, VolumeLayout};
pub use fat_table::{is_end_of_chain, AllocationTable, ClusterChain, ClusterLink};
pub use file::{FatFile, FileHandle, MAX_FILE_HANDLES, ROOT_DIRECTORY_HANDLE};
pub use path_resolver::PathResolver;
pub use volume::{MountOptions, Volume, VolumeInfo, DEFAULT_SCRATCH_BUDGET, VOLUME_STRUCTURES_SIZE};
