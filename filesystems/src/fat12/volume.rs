// FAT12 volume: mount sequence, handle pool and the caller-facing stream operations

use bootfs_core::{BlockDevice, BootFsError, Geometry, SECTOR_SIZE};
use log::{debug, error, info, warn};
use serde::Serialize;
use static_assertions::const_assert;
use crate::fat_common::DirectoryEntry;
use crate::fat_common::constants::DIRECTORY_ENTRY_SIZE;
use super::boot_sector::{BootSector, VolumeLayout};
use super::fat_table::AllocationTable;
use super::file::{FatFile, FileData, FileHandle, StreamSource, MAX_FILE_HANDLES};
use super::path_resolver::PathResolver;

/// Size of the region reserved for volume structures and the allocation table.
pub const DEFAULT_SCRATCH_BUDGET: usize = 0x10000;

/// Bytes taken from the scratch region before the allocation table:
/// the boot sector plus the root stream and every pool slot.
pub const VOLUME_STRUCTURES_SIZE: usize =
    SECTOR_SIZE + (MAX_FILE_HANDLES + 1) * std::mem::size_of::<FileData>();

const_assert!(VOLUME_STRUCTURES_SIZE < DEFAULT_SCRATCH_BUDGET);

/// Mount-time resource limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountOptions {
    pub scratch_budget: usize,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            scratch_budget: DEFAULT_SCRATCH_BUDGET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MountState {
    Unloaded,
    BootSectorLoaded,
    AllocationTableLoaded,
    RootDirectoryLoaded,
    Ready,
    Failed,
}

impl MountState {
    fn advance(&mut self, next: MountState) {
        debug!("Volume: {:?} -> {:?}", self, next);
        *self = next;
    }
}

/// Summary of the mounted volume's derived geometry.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeInfo {
    pub label: String,
    pub system_id: String,
    pub volume_id: u32,
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub total_sectors: u32,
    pub fat_count: u8,
    pub fat_lba: u32,
    pub sectors_per_fat: u32,
    pub root_dir_lba: u32,
    pub root_dir_sectors: u32,
    pub root_entries: u16,
    pub data_lba: u32,
    pub cluster_count: u32,
    pub geometry: Geometry,
}

pub struct Volume<D: BlockDevice> {
    device: D,
    boot_sector: BootSector,
    layout: VolumeLayout,
    fat: AllocationTable,
    root: FileData,
    files: [FileData; MAX_FILE_HANDLES],
    options: MountOptions,
}

impl<D: BlockDevice> Volume<D> {
    pub fn mount(device: D) -> Result<Self, BootFsError> {
        Self::mount_with(device, MountOptions::default())
    }

    pub fn mount_with(mut device: D, options: MountOptions) -> Result<Self, BootFsError> {
        let mut state = MountState::Unloaded;

        match Self::load(&mut device, &options, &mut state) {
            Ok((boot_sector, layout, fat, root)) => {
                state.advance(MountState::Ready);
                info!(
                    "Mounted FAT12 volume '{}': {} clusters of {} bytes, root at LBA {}, data at LBA {}",
                    boot_sector.label(),
                    layout.cluster_count,
                    layout.sectors_per_cluster * layout.bytes_per_sector,
                    layout.root_dir_lba,
                    layout.data_lba
                );
                Ok(Self {
                    device,
                    boot_sector,
                    layout,
                    fat,
                    root,
                    files: std::array::from_fn(FileData::closed),
                    options,
                })
            }
            Err(e) => {
                error!("Volume: mount failed in state {:?}: {}", state, e);
                state.advance(MountState::Failed);
                Err(e)
            }
        }
    }

    fn load(
        device: &mut D,
        options: &MountOptions,
        state: &mut MountState,
    ) -> Result<(BootSector, VolumeLayout, AllocationTable, FileData), BootFsError> {
        let mut sector = [0u8; SECTOR_SIZE];
        device
            .read_sectors(0, 1, &mut sector)
            .inspect_err(|_| error!("FAT: read boot sector failed"))?;
        let boot_sector = BootSector::parse(&sector);
        boot_sector.validate()?;
        state.advance(MountState::BootSectorLoaded);

        let layout = VolumeLayout::from_boot_sector(&boot_sector);
        let required = VOLUME_STRUCTURES_SIZE + layout.fat_size;
        if required >= options.scratch_budget {
            error!(
                "FAT: not enough memory to read FAT! Required {}, only have {}",
                required, options.scratch_budget
            );
            return Err(BootFsError::NotEnoughMemory {
                required,
                available: options.scratch_budget,
            });
        }

        let mut table = vec![0u8; layout.fat_size];
        device
            .read_sectors(layout.fat_lba, boot_sector.sectors_per_fat, &mut table)
            .inspect_err(|_| error!("FAT: read FAT failed"))?;
        let fat = AllocationTable::from_bytes(table);
        state.advance(MountState::AllocationTableLoaded);

        let mut src = StreamSource {
            device,
            layout: &layout,
            fat: &fat,
        };
        let root = FileData::root(&mut src)
            .inspect_err(|_| error!("FAT: read root directory failed"))?;
        state.advance(MountState::RootDirectoryLoaded);

        Ok((boot_sector, layout, fat, root))
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot_sector
    }

    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }

    pub fn allocation_table(&self) -> &AllocationTable {
        &self.fat
    }

    pub fn options(&self) -> &MountOptions {
        &self.options
    }

    pub fn info(&self) -> VolumeInfo {
        let bs = &self.boot_sector;
        VolumeInfo {
            label: bs.label(),
            system_id: bs.system_id(),
            volume_id: bs.volume_id,
            bytes_per_sector: self.layout.bytes_per_sector,
            sectors_per_cluster: self.layout.sectors_per_cluster,
            total_sectors: bs.total_sector_count(),
            fat_count: bs.fat_count,
            fat_lba: self.layout.fat_lba,
            sectors_per_fat: self.layout.sectors_per_fat,
            root_dir_lba: self.layout.root_dir_lba,
            root_dir_sectors: self.layout.root_dir_sectors,
            root_entries: bs.dir_entry_count,
            data_lba: self.layout.data_lba,
            cluster_count: self.layout.cluster_count,
            geometry: self.device.geometry(),
        }
    }

    /// The root directory stream. Always available and never counted against the pool.
    pub fn root(&self) -> &FatFile {
        &self.root.public
    }

    /// Public state of an open handle.
    pub fn file(&self, handle: FileHandle) -> Option<&FatFile> {
        match handle {
            FileHandle::Root => Some(&self.root.public),
            FileHandle::Pooled(slot) => self
                .files
                .get(slot)
                .filter(|f| f.opened)
                .map(|f| &f.public),
        }
    }

    /// Number of pool slots currently checked out.
    pub fn open_handles(&self) -> usize {
        self.files.iter().filter(|f| f.opened).count()
    }

    /// Resolve `path` from the root and open it.
    pub fn open(&mut self, path: &str) -> Result<FileHandle, BootFsError> {
        PathResolver::new(self).open(path)
    }

    /// Open the file or directory a directory entry describes.
    pub fn open_entry(&mut self, entry: &DirectoryEntry) -> Result<FileHandle, BootFsError> {
        if entry.is_directory() && entry.first_cluster() == 0 {
            debug!("FAT: {} refers to the root directory", entry.display_name());
            self.root.rewind();
            return Ok(FileHandle::Root);
        }

        let slot = match self.files.iter().position(|f| !f.opened) {
            Some(slot) => slot,
            None => {
                error!("FAT: out of file handles opening {}", entry.display_name());
                return Err(BootFsError::OutOfHandles);
            }
        };

        let Volume { device, layout, fat, files, .. } = self;
        let mut src = StreamSource {
            device,
            layout: &*layout,
            fat: &*fat,
        };
        files[slot].open_entry(entry, &mut src)?;

        debug!(
            "FAT: opened {} as handle {} (cluster {}, {} bytes)",
            entry.display_name(),
            slot,
            entry.first_cluster(),
            entry.size
        );
        Ok(FileHandle::Pooled(slot))
    }

    /// Read up to `buf.len()` bytes from `handle` into `buf`; returns the number read.
    /// A short count means end of stream or a device failure.
    pub fn read(&mut self, handle: FileHandle, buf: &mut [u8]) -> usize {
        let Volume { device, layout, fat, root, files, .. } = self;
        let data = match handle {
            FileHandle::Root => root,
            FileHandle::Pooled(slot) => match files.get_mut(slot) {
                Some(data) if data.opened => data,
                _ => {
                    warn!("FAT: read from closed handle {}", handle.id());
                    return 0;
                }
            },
        };

        let mut src = StreamSource {
            device,
            layout: &*layout,
            fat: &*fat,
        };
        data.read(&mut src, buf)
    }

    /// Next 32-byte record of a directory stream, or `None` once it is exhausted.
    pub fn read_directory_entry(&mut self, handle: FileHandle) -> Option<DirectoryEntry> {
        let mut raw = [0u8; DIRECTORY_ENTRY_SIZE];
        if self.read(handle, &mut raw) != DIRECTORY_ENTRY_SIZE {
            return None;
        }
        Some(DirectoryEntry::parse(&raw))
    }

    /// Release a pooled handle, or rewind the root directory.
    pub fn close(&mut self, handle: FileHandle) -> Result<(), BootFsError> {
        match handle {
            FileHandle::Root => {
                self.root.rewind();
                Ok(())
            }
            FileHandle::Pooled(slot) => match self.files.get_mut(slot) {
                Some(data) if data.opened => {
                    data.opened = false;
                    Ok(())
                }
                _ => {
                    warn!("FAT: close of handle {} which is not open", slot);
                    Err(BootFsError::InvalidHandle)
                }
            },
        }
    }

    /// Live entries of the directory at `path`.
    pub fn list(&mut self, path: &str) -> Result<Vec<DirectoryEntry>, BootFsError> {
        let handle = if path.trim_matches('/').is_empty() {
            self.root.rewind();
            FileHandle::Root
        } else {
            self.open(path)?
        };

        if !self.file(handle).is_some_and(|f| f.is_directory) {
            self.close(handle)?;
            error!("FAT: {} is not a directory", path);
            return Err(BootFsError::NotADirectory(path.to_string()));
        }

        let mut entries = Vec::new();
        while let Some(entry) = self.read_directory_entry(handle) {
            if entry.is_end() {
                break;
            }
            if entry.is_live() {
                entries.push(entry);
            }
        }

        self.close(handle)?;
        Ok(entries)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }
}
