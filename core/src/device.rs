use serde::{Deserialize, Serialize};
use log::{debug, trace, warn};
use crate::BootFsError;

/// Size of one sector as seen by every reader in this workspace.
pub const SECTOR_SIZE: usize = 512;

/// Attempts made by `Disk::read_sectors` before giving up (reset between attempts).
pub const READ_ATTEMPTS: u32 = 3;

/// Drive geometry as reported by the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub cylinders: u16,
    pub heads: u16,
    pub sectors_per_track: u16,
}

/// Cylinder/head/sector address. Sectors are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chs {
    pub cylinder: u16,
    pub head: u16,
    pub sector: u16,
}

impl Geometry {
    /// Standard 1.44 MB floppy layout
    pub const FLOPPY_144: Geometry = Geometry {
        cylinders: 80,
        heads: 2,
        sectors_per_track: 18,
    };

    pub fn total_sectors(&self) -> u32 {
        self.cylinders as u32 * self.heads as u32 * self.sectors_per_track as u32
    }

    /// Translate a linear block address into CHS coordinates.
    pub fn lba_to_chs(&self, lba: u32) -> Chs {
        let spt = self.sectors_per_track as u32;
        let heads = self.heads as u32;

        Chs {
            sector: (lba % spt + 1) as u16,
            cylinder: ((lba / spt) / heads) as u16,
            head: ((lba / spt) % heads) as u16,
        }
    }

    /// Inverse of `lba_to_chs`; `None` when the address lies outside this geometry.
    pub fn chs_to_lba(&self, chs: Chs) -> Option<u32> {
        if chs.sector == 0
            || chs.sector > self.sectors_per_track
            || chs.head >= self.heads
            || chs.cylinder >= self.cylinders
        {
            return None;
        }

        let track = chs.cylinder as u32 * self.heads as u32 + chs.head as u32;
        Some(track * self.sectors_per_track as u32 + (chs.sector as u32 - 1))
    }

    fn is_usable(&self) -> bool {
        self.cylinders != 0 && self.heads != 0 && self.sectors_per_track != 0
    }
}

/// Low-level, geometry-addressed drive access (the BIOS disk services on real hardware).
pub trait SectorMedium {
    /// Report the geometry of `drive`.
    fn drive_parameters(&mut self, drive: u8) -> Result<Geometry, BootFsError>;

    /// Read `count` sectors starting at `chs` into the front of `buf`.
    fn read_chs(&mut self, drive: u8, chs: Chs, count: u16, buf: &mut [u8]) -> Result<(), BootFsError>;

    /// Reset the drive controller after a failed transfer.
    fn reset(&mut self, drive: u8) -> Result<(), BootFsError>;
}

/// Linear sector reads, the only thing the filesystem layer needs from a disk.
pub trait BlockDevice {
    fn geometry(&self) -> Geometry;

    /// Read `count` whole sectors starting at `lba`. Either every sector is
    /// transferred or an error is returned; the buffer is unspecified on error.
    fn read_sectors(&mut self, lba: u32, count: u16, buf: &mut [u8]) -> Result<(), BootFsError>;
}

impl<T: BlockDevice + ?Sized> BlockDevice for &mut T {
    fn geometry(&self) -> Geometry {
        (**self).geometry()
    }

    fn read_sectors(&mut self, lba: u32, count: u16, buf: &mut [u8]) -> Result<(), BootFsError> {
        (**self).read_sectors(lba, count, buf)
    }
}

/// A drive with a fixed geometry, translating LBA reads into retried CHS reads.
pub struct Disk<M: SectorMedium> {
    id: u8,
    geometry: Geometry,
    medium: M,
}

impl<M: SectorMedium> Disk<M> {
    /// Query the medium for the geometry of `drive_id`. The geometry is fixed from here on.
    pub fn initialize(mut medium: M, drive_id: u8) -> Result<Self, BootFsError> {
        let geometry = medium.drive_parameters(drive_id)?;
        if !geometry.is_usable() {
            warn!("Drive {:#04x} reported unusable geometry {:?}", drive_id, geometry);
            return Err(BootFsError::DriveParameters(drive_id));
        }

        debug!(
            "Drive {:#04x}: {} cylinders, {} heads, {} sectors/track",
            drive_id, geometry.cylinders, geometry.heads, geometry.sectors_per_track
        );

        Ok(Self {
            id: drive_id,
            geometry,
            medium,
        })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }
}

impl<M: SectorMedium> BlockDevice for Disk<M> {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn read_sectors(&mut self, lba: u32, count: u16, buf: &mut [u8]) -> Result<(), BootFsError> {
        let needed = count as usize * SECTOR_SIZE;
        if buf.len() < needed {
            return Err(BootFsError::BufferTooSmall { needed, got: buf.len() });
        }

        let chs = self.geometry.lba_to_chs(lba);
        trace!("Read LBA {} ({:?}), {} sectors", lba, chs, count);

        for attempt in 1..=READ_ATTEMPTS {
            match self.medium.read_chs(self.id, chs, count, &mut buf[..needed]) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!("Read of LBA {} failed (attempt {}/{}): {}", lba, attempt, READ_ATTEMPTS, e);
                    if let Err(e) = self.medium.reset(self.id) {
                        warn!("Reset of drive {:#04x} failed: {}", self.id, e);
                    }
                }
            }
        }

        Err(BootFsError::ReadFailed {
            lba,
            attempts: READ_ATTEMPTS,
        })
    }
}
