// Uniform byte stream over the root directory region or a cluster chain

use bootfs_core::{BlockDevice, BootFsError, SECTOR_SIZE};
use log::{debug, error, trace, warn};
use crate::fat_common::constants::*;
use crate::fat_common::DirectoryEntry;
use super::boot_sector::VolumeLayout;
use super::fat_table::{AllocationTable, ClusterLink};

/// Number of regular files or subdirectories that can be open at once.
pub const MAX_FILE_HANDLES: usize = 10;

/// Handle id reported for the root directory.
pub const ROOT_DIRECTORY_HANDLE: i32 = -1;

/// Names an open stream. The root directory is not a pool slot and is always available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileHandle {
    Root,
    Pooled(usize),
}

impl FileHandle {
    pub fn id(&self) -> i32 {
        match self {
            FileHandle::Root => ROOT_DIRECTORY_HANDLE,
            FileHandle::Pooled(slot) => *slot as i32,
        }
    }
}

/// Caller-visible state of an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatFile {
    pub handle: FileHandle,
    pub is_directory: bool,
    pub position: u32,
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferState {
    /// Buffer holds the sector containing `position`.
    Valid,
    /// `position` is at the end of the buffered sector; the next byte needs an advance.
    Consumed,
    /// Buffer must be re-read for the current sector before use.
    Stale,
}

/// What a stream needs from its volume to fetch sectors.
pub(crate) struct StreamSource<'a, D> {
    pub device: &'a mut D,
    pub layout: &'a VolumeLayout,
    pub fat: &'a AllocationTable,
}

pub(crate) struct FileData {
    pub public: FatFile,
    pub opened: bool,
    pub first_cluster: u32,
    /// For the root directory this is the LBA of the buffered sector.
    pub current_cluster: u32,
    pub current_sector_in_cluster: u32,
    /// Cluster links this stream may still follow; one per table entry, so a looping chain ends.
    links_left: usize,
    buffer: [u8; SECTOR_SIZE],
    state: BufferState,
}

impl FileData {
    pub fn closed(slot: usize) -> Self {
        Self {
            public: FatFile {
                handle: FileHandle::Pooled(slot),
                is_directory: false,
                position: 0,
                size: 0,
            },
            opened: false,
            first_cluster: 0,
            current_cluster: 0,
            current_sector_in_cluster: 0,
            links_left: 0,
            buffer: [0; SECTOR_SIZE],
            state: BufferState::Stale,
        }
    }

    /// Root directory stream over the contiguous region starting at `layout.root_dir_lba`.
    /// The region is not cluster-chained, so its "clusters" are plain LBAs.
    pub fn root<D: BlockDevice>(src: &mut StreamSource<'_, D>) -> Result<Self, BootFsError> {
        let mut root = Self {
            public: FatFile {
                handle: FileHandle::Root,
                is_directory: true,
                position: 0,
                size: src.layout.root_dir_size,
            },
            opened: true,
            first_cluster: src.layout.root_dir_lba,
            current_cluster: src.layout.root_dir_lba,
            current_sector_in_cluster: 0,
            links_left: 0,
            buffer: [0; SECTOR_SIZE],
            state: BufferState::Stale,
        };
        root.fetch(src)?;
        Ok(root)
    }

    /// Point this pool slot at `entry` and load its first sector.
    /// The slot is only marked open once the sector is in.
    pub fn open_entry<D: BlockDevice>(
        &mut self,
        entry: &DirectoryEntry,
        src: &mut StreamSource<'_, D>,
    ) -> Result<(), BootFsError> {
        let first_cluster = entry.first_cluster();
        let has_clusters = first_cluster >= FIRST_DATA_CLUSTER;
        if (has_clusters || entry.is_directory()) && !src.layout.is_data_cluster(first_cluster) {
            error!(
                "FAT: {} starts at cluster {} outside the data area (last cluster {})",
                entry.display_name(),
                first_cluster,
                src.layout.last_cluster()
            );
            return Err(BootFsError::InvalidDirectoryEntry(entry.display_name()));
        }

        self.public.is_directory = entry.is_directory();
        self.public.position = 0;
        self.public.size = entry.size;
        self.first_cluster = first_cluster;
        self.current_cluster = first_cluster;
        self.current_sector_in_cluster = 0;
        self.links_left = src.fat.len() * 2 / 3;
        self.state = BufferState::Stale;

        if !has_clusters {
            if entry.size != 0 {
                warn!(
                    "FAT: {} claims {} bytes but has no clusters",
                    entry.display_name(),
                    entry.size
                );
            }
            self.public.size = 0;
        } else {
            self.fetch(src)?;
        }

        self.opened = true;
        Ok(())
    }

    /// Subdirectories with a zero size field are bounded by their chain instead.
    fn is_unbounded(&self) -> bool {
        self.public.is_directory && self.public.size == 0
    }

    /// Copy up to `out.len()` bytes from the cursor; returns the number copied.
    pub fn read<D: BlockDevice>(&mut self, src: &mut StreamSource<'_, D>, out: &mut [u8]) -> usize {
        let mut wanted = out.len();
        if !self.is_unbounded() {
            wanted = wanted.min((self.public.size - self.public.position) as usize);
        }

        let mut copied = 0;
        while copied < wanted {
            let ready = match self.state {
                BufferState::Valid => true,
                BufferState::Consumed => self.advance(src),
                BufferState::Stale => self.reload(src),
            };
            if !ready {
                break;
            }

            let offset = self.public.position as usize % SECTOR_SIZE;
            let take = (wanted - copied).min(SECTOR_SIZE - offset);
            out[copied..copied + take].copy_from_slice(&self.buffer[offset..offset + take]);
            copied += take;
            self.public.position += take as u32;

            if offset + take == SECTOR_SIZE {
                self.state = BufferState::Consumed;
            }
        }

        copied
    }

    /// Move to the sector after the buffered one and load it. On end of chain the
    /// size is pinned to the cursor, which is how the true end of a stream is found.
    fn advance<D: BlockDevice>(&mut self, src: &mut StreamSource<'_, D>) -> bool {
        if self.public.handle == FileHandle::Root {
            self.current_cluster += 1;
        } else {
            self.current_sector_in_cluster += 1;
            if self.current_sector_in_cluster >= src.layout.sectors_per_cluster {
                if self.links_left == 0 {
                    warn!(
                        "FAT: chain from cluster {} does not terminate, ending stream at byte {}",
                        self.first_cluster, self.public.position
                    );
                    self.end_stream();
                    return false;
                }
                self.links_left -= 1;

                match src.fat.link(self.current_cluster) {
                    ClusterLink::Next(next) if !src.layout.is_data_cluster(next) => {
                        warn!(
                            "FAT: cluster {} links past the data area to {}, ending stream at byte {}",
                            self.current_cluster, next, self.public.position
                        );
                        self.end_stream();
                        return false;
                    }
                    ClusterLink::Next(next) => {
                        trace!("Cluster {} -> {}", self.current_cluster, next);
                        self.current_cluster = next;
                        self.current_sector_in_cluster = 0;
                    }
                    ClusterLink::EndOfChain => {
                        debug!(
                            "End of chain after cluster {} at byte {}",
                            self.current_cluster, self.public.position
                        );
                        self.end_stream();
                        return false;
                    }
                    ClusterLink::Corrupt(value) => {
                        warn!(
                            "FAT: cluster {} links to invalid value {:#05x}, ending stream at byte {}",
                            self.current_cluster, value, self.public.position
                        );
                        self.end_stream();
                        return false;
                    }
                }
            }
        }

        self.reload(src)
    }

    fn end_stream(&mut self) {
        self.current_sector_in_cluster -= 1;
        self.public.size = self.public.position;
    }

    fn reload<D: BlockDevice>(&mut self, src: &mut StreamSource<'_, D>) -> bool {
        match self.fetch(src) {
            Ok(()) => true,
            Err(e) => {
                error!("FAT: read error at byte {}: {}", self.public.position, e);
                false
            }
        }
    }

    fn current_lba(&self, layout: &VolumeLayout) -> Option<u32> {
        if self.public.handle == FileHandle::Root {
            Some(self.current_cluster)
        } else {
            layout
                .cluster_to_lba(self.current_cluster)?
                .checked_add(self.current_sector_in_cluster)
        }
    }

    fn fetch<D: BlockDevice>(&mut self, src: &mut StreamSource<'_, D>) -> Result<(), BootFsError> {
        let lba = match self.current_lba(src.layout) {
            Some(lba) => lba,
            None => {
                self.state = BufferState::Stale;
                return Err(BootFsError::InvalidDirectoryEntry(format!(
                    "cluster {} has no sector address",
                    self.current_cluster
                )));
            }
        };
        match src.device.read_sectors(lba, 1, &mut self.buffer) {
            Ok(()) => {
                self.state = BufferState::Valid;
                Ok(())
            }
            Err(e) => {
                self.state = BufferState::Stale;
                Err(e)
            }
        }
    }

    /// Rewind the root directory in place. The buffer is kept when it already
    /// holds the first sector, otherwise it is re-read lazily.
    pub fn rewind(&mut self) {
        let holds_first = self.current_cluster == self.first_cluster
            && self.current_sector_in_cluster == 0
            && self.state != BufferState::Stale;

        self.public.position = 0;
        self.current_cluster = self.first_cluster;
        self.current_sector_in_cluster = 0;
        self.state = if holds_first {
            BufferState::Valid
        } else {
            BufferState::Stale
        };
    }
}
