// FAT12 path resolver
// Walks a `/`-separated path from the root directory, one open stream at a time

use bootfs_core::{BlockDevice, BootFsError};
use log::{debug, error, trace};
use crate::fat_common::{parse_83_name, short_name, DirectoryEntry};
use super::file::FileHandle;
use super::volume::Volume;

pub struct PathResolver<'a, D: BlockDevice> {
    volume: &'a mut Volume<D>,
}

impl<'a, D: BlockDevice> PathResolver<'a, D> {
    pub fn new(volume: &'a mut Volume<D>) -> Self {
        Self { volume }
    }

    /// Open `path`. At most one pooled handle is held at any point of the walk,
    /// and every failure leaves the pool as it was.
    pub fn open(&mut self, path: &str) -> Result<FileHandle, BootFsError> {
        debug!("Resolving FAT12 path: {}", path);

        let mut rest = path.strip_prefix('/').unwrap_or(path);
        let mut current = FileHandle::Root;
        self.volume.close(FileHandle::Root)?;

        while !rest.is_empty() {
            let (segment, is_last) = match rest.find('/') {
                Some(sep) => {
                    let segment = &rest[..sep];
                    rest = &rest[sep + 1..];
                    (segment, false)
                }
                None => {
                    let segment = rest;
                    rest = "";
                    (segment, true)
                }
            };

            let key = short_name(segment);
            trace!("Looking up {:?} in handle {}", parse_83_name(&key), current.id());

            let entry = match self.find_entry(current, &key) {
                Some(entry) => entry,
                None => {
                    self.volume.close(current)?;
                    error!("FAT: {} not found", segment);
                    return Err(BootFsError::NotFound(segment.to_string()));
                }
            };

            self.volume.close(current)?;
            if !is_last && !entry.is_directory() {
                error!("FAT: {} is not a directory", segment);
                return Err(BootFsError::NotADirectory(segment.to_string()));
            }

            current = self.volume.open_entry(&entry)?;
        }

        Ok(current)
    }

    /// Linear scan of the remaining records of `dir` for an exact 11-byte name match.
    fn find_entry(&mut self, dir: FileHandle, key: &[u8; 11]) -> Option<DirectoryEntry> {
        while let Some(entry) = self.volume.read_directory_entry(dir) {
            if entry.is_end() {
                return None;
            }
            if entry.is_live() && entry.name == *key {
                return Some(entry);
            }
        }
        None
    }
}
