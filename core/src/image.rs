// Disk image medium
// Serves a raw image through CHS addressing so the full Disk path (translation + retry) is exercised

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use log::{debug, trace};
use crate::device::{Chs, Geometry, SectorMedium, SECTOR_SIZE};
use crate::BootFsError;

// BPB geometry fields
const BPB_SEC_PER_TRK: usize = 0x18;
const BPB_NUM_HEADS: usize = 0x1A;

pub struct ImageMedium<R> {
    inner: R,
    geometry: Geometry,
    len: u64,
}

impl ImageMedium<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BootFsError> {
        let path = path.as_ref();
        debug!("Opening disk image {}", path.display());
        Self::new(File::open(path)?)
    }
}

impl<R: Read + Seek> ImageMedium<R> {
    /// Wrap an image, probing geometry from the BPB when it carries one.
    pub fn new(mut inner: R) -> Result<Self, BootFsError> {
        let len = inner.seek(SeekFrom::End(0))?;

        let mut head = [0u8; 0x20];
        let (mut spt, mut heads) = (0, 0);
        if len >= head.len() as u64 {
            inner.seek(SeekFrom::Start(0))?;
            inner.read_exact(&mut head)?;
            spt = u16::from_le_bytes([head[BPB_SEC_PER_TRK], head[BPB_SEC_PER_TRK + 1]]);
            heads = u16::from_le_bytes([head[BPB_NUM_HEADS], head[BPB_NUM_HEADS + 1]]);
        }

        let geometry = if spt == 0 || heads == 0 {
            Geometry::FLOPPY_144
        } else {
            let per_cylinder = spt as u64 * heads as u64;
            let sectors = len / SECTOR_SIZE as u64;
            let cylinders = sectors.div_ceil(per_cylinder).clamp(1, u16::MAX as u64) as u16;
            Geometry {
                cylinders,
                heads,
                sectors_per_track: spt,
            }
        };

        debug!("Image geometry: {:?} ({} bytes)", geometry, len);
        Ok(Self { inner, geometry, len })
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<R: Read + Seek> SectorMedium for ImageMedium<R> {
    fn drive_parameters(&mut self, _drive: u8) -> Result<Geometry, BootFsError> {
        Ok(self.geometry)
    }

    fn read_chs(&mut self, drive: u8, chs: Chs, count: u16, buf: &mut [u8]) -> Result<(), BootFsError> {
        let lba = self.geometry.chs_to_lba(chs).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("{:?} outside drive geometry", chs))
        })?;

        let bytes = count as usize * SECTOR_SIZE;
        let offset = lba as u64 * SECTOR_SIZE as u64;
        trace!("Drive {:#04x}: image read at {:#x}, {} bytes", drive, offset, bytes);

        if offset + bytes as u64 > self.len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("read of {} bytes at {:#x} past end of image", bytes, offset),
            )
            .into());
        }

        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.read_exact(&mut buf[..bytes])?;
        Ok(())
    }

    fn reset(&mut self, _drive: u8) -> Result<(), BootFsError> {
        Ok(())
    }
}
