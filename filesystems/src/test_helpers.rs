// Test helpers: synthetic FAT12 images served through the real Disk/ImageMedium path
#![allow(dead_code)]

use std::io::Cursor;
use bootfs_core::{BlockDevice, BootFsError, Disk, Geometry, ImageMedium};

pub const SECTOR: usize = 512;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_LONG_NAME: u8 = 0x0F;

pub type ImageDisk = Disk<ImageMedium<Cursor<Vec<u8>>>>;

/// Image parameters; the default is a 1.44 MB floppy.
#[derive(Debug, Clone, Copy)]
pub struct FloppyParams {
    pub total_sectors: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub root_entries: u16,
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub heads: u16,
}

impl Default for FloppyParams {
    fn default() -> Self {
        Self {
            total_sectors: 2880,
            sectors_per_cluster: 1,
            reserved_sectors: 1,
            fat_count: 2,
            root_entries: 224,
            sectors_per_fat: 9,
            sectors_per_track: 18,
            heads: 2,
        }
    }
}

pub struct TestImage {
    params: FloppyParams,
    bytes: Vec<u8>,
    root_used: usize,
    next_free: u32,
}

impl TestImage {
    pub fn new(params: FloppyParams) -> Self {
        let mut bytes = vec![0u8; params.total_sectors as usize * SECTOR];

        let bs = &mut bytes[..SECTOR];
        bs[0..3].copy_from_slice(&[0xEB, 0x3C, 0x90]);
        bs[3..11].copy_from_slice(b"BOOTFS  ");
        bs[11..13].copy_from_slice(&(SECTOR as u16).to_le_bytes());
        bs[13] = params.sectors_per_cluster;
        bs[14..16].copy_from_slice(&params.reserved_sectors.to_le_bytes());
        bs[16] = params.fat_count;
        bs[17..19].copy_from_slice(&params.root_entries.to_le_bytes());
        bs[19..21].copy_from_slice(&params.total_sectors.to_le_bytes());
        bs[21] = 0xF0;
        bs[22..24].copy_from_slice(&params.sectors_per_fat.to_le_bytes());
        bs[24..26].copy_from_slice(&params.sectors_per_track.to_le_bytes());
        bs[26..28].copy_from_slice(&params.heads.to_le_bytes());
        bs[38] = 0x29;
        bs[39..43].copy_from_slice(&0x1234_ABCDu32.to_le_bytes());
        bs[43..54].copy_from_slice(b"BOOTFS     ");
        bs[54..62].copy_from_slice(b"FAT12   ");
        bs[510] = 0x55;
        bs[511] = 0xAA;

        let mut image = Self {
            params,
            bytes,
            root_used: 0,
            next_free: 2,
        };
        image.set_fat(0, 0xFF0);
        image.set_fat(1, 0xFFF);
        image
    }

    pub fn floppy() -> Self {
        Self::new(FloppyParams::default())
    }

    pub fn params(&self) -> FloppyParams {
        self.params
    }

    pub fn fat_lba(&self) -> usize {
        self.params.reserved_sectors as usize
    }

    pub fn root_lba(&self) -> usize {
        self.fat_lba() + self.params.sectors_per_fat as usize * self.params.fat_count as usize
    }

    pub fn root_sectors(&self) -> usize {
        (self.params.root_entries as usize * 32).div_ceil(SECTOR)
    }

    pub fn data_lba(&self) -> usize {
        self.root_lba() + self.root_sectors()
    }

    pub fn cluster_bytes(&self) -> usize {
        self.params.sectors_per_cluster as usize * SECTOR
    }

    pub fn cluster_offset(&self, cluster: u32) -> usize {
        (self.data_lba() + (cluster as usize - 2) * self.params.sectors_per_cluster as usize) * SECTOR
    }

    /// Write `value` as the entry for `cluster` in every FAT copy.
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        let fat_bytes = self.params.sectors_per_fat as usize * SECTOR;
        for copy in 0..self.params.fat_count as usize {
            let start = (self.fat_lba() * SECTOR) + copy * fat_bytes;
            set_fat12_entry(&mut self.bytes[start..start + fat_bytes], cluster, value);
        }
    }

    /// Reserve `count` consecutive clusters linked into one chain ending in EOC.
    pub fn allocate(&mut self, count: usize) -> Vec<u32> {
        let chain: Vec<u32> = (0..count as u32).map(|i| self.next_free + i).collect();
        self.next_free += count as u32;
        for pair in chain.windows(2) {
            self.set_fat(pair[0], pair[1]);
        }
        if let Some(&last) = chain.last() {
            self.set_fat(last, 0xFFF);
        }
        chain
    }

    /// Skip clusters so the next allocation is not adjacent to the previous one.
    pub fn skip_clusters(&mut self, count: u32) {
        self.next_free += count;
    }

    /// Spread `data` across the clusters of `chain`, in order.
    pub fn write_chain(&mut self, chain: &[u32], data: &[u8]) {
        let cluster_bytes = self.cluster_bytes();
        for (&cluster, piece) in chain.iter().zip(data.chunks(cluster_bytes)) {
            let offset = self.cluster_offset(cluster);
            self.bytes[offset..offset + piece.len()].copy_from_slice(piece);
        }
    }

    /// Add a regular file; returns its first cluster (0 for an empty file).
    pub fn add_file(&mut self, parent: Option<u32>, name: &[u8; 11], data: &[u8]) -> u32 {
        let chain = self.allocate(data.len().div_ceil(self.cluster_bytes()));
        self.write_chain(&chain, data);
        let first = chain.first().copied().unwrap_or(0);
        self.add_entry(parent, raw_entry(name, ATTR_ARCHIVE, first, data.len() as u32));
        first
    }

    /// Add a subdirectory occupying `clusters` clusters, with `.` and `..` filled in.
    pub fn add_dir(&mut self, parent: Option<u32>, name: &[u8; 11], clusters: usize) -> u32 {
        let chain = self.allocate(clusters.max(1));
        let first = chain[0];
        let offset = self.cluster_offset(first);
        self.bytes[offset..offset + 32].copy_from_slice(&raw_entry(b".          ", ATTR_DIRECTORY, first, 0));
        self.bytes[offset + 32..offset + 64]
            .copy_from_slice(&raw_entry(b"..         ", ATTR_DIRECTORY, parent.unwrap_or(0), 0));
        self.add_entry(parent, raw_entry(name, ATTR_DIRECTORY, first, 0));
        first
    }

    /// Place a raw record in the root directory or in the first free slot of a subdirectory chain.
    pub fn add_entry(&mut self, parent: Option<u32>, raw: [u8; 32]) {
        match parent {
            None => {
                assert!(self.root_used < self.params.root_entries as usize, "root directory full");
                let offset = self.root_lba() * SECTOR + self.root_used * 32;
                self.bytes[offset..offset + 32].copy_from_slice(&raw);
                self.root_used += 1;
            }
            Some(dir) => {
                let mut cluster = dir;
                loop {
                    let offset = self.cluster_offset(cluster);
                    let slots = self.cluster_bytes() / 32;
                    if let Some(slot) = (0..slots).find(|&i| self.bytes[offset + i * 32] == 0) {
                        let at = offset + slot * 32;
                        self.bytes[at..at + 32].copy_from_slice(&raw);
                        return;
                    }
                    let next = self.fat_entry(cluster);
                    assert!(next < 0xFF8, "directory {} full", dir);
                    cluster = next;
                }
            }
        }
    }

    pub fn fat_entry(&self, cluster: u32) -> u32 {
        let start = self.fat_lba() * SECTOR;
        let index = start + cluster as usize * 3 / 2;
        let word = u16::from_le_bytes([self.bytes[index], self.bytes[index + 1]]) as u32;
        if cluster % 2 == 0 { word & 0xFFF } else { word >> 4 }
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn into_disk(self) -> ImageDisk {
        image_disk(self.into_bytes())
    }
}

pub fn image_disk(bytes: Vec<u8>) -> ImageDisk {
    let medium = ImageMedium::new(Cursor::new(bytes)).expect("image medium");
    Disk::initialize(medium, 0).expect("disk geometry")
}

/// 32-byte directory record with the fields tests care about.
pub fn raw_entry(name: &[u8; 11], attributes: u8, cluster: u32, size: u32) -> [u8; 32] {
    let mut raw = [0u8; 32];
    raw[..11].copy_from_slice(name);
    raw[11] = attributes;
    raw[20..22].copy_from_slice(&((cluster >> 16) as u16).to_le_bytes());
    raw[26..28].copy_from_slice(&(cluster as u16).to_le_bytes());
    raw[28..32].copy_from_slice(&size.to_le_bytes());
    raw
}

/// Pack a 12-bit entry into a FAT image.
pub fn set_fat12_entry(fat: &mut [u8], cluster: u32, value: u32) {
    let index = cluster as usize * 3 / 2;
    let value = (value & 0xFFF) as u16;
    let word = u16::from_le_bytes([fat[index], fat[index + 1]]);
    let word = if cluster % 2 == 0 {
        (word & 0xF000) | value
    } else {
        (word & 0x000F) | (value << 4)
    };
    fat[index..index + 2].copy_from_slice(&word.to_le_bytes());
}

/// Deterministic, non-repeating-per-sector file contents.
pub fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed).wrapping_add((i / SECTOR) as u8))
        .collect()
}

/// Wraps a device, counting sector reads and failing reads of chosen LBAs.
pub struct CountingDevice<D> {
    pub inner: D,
    pub reads: usize,
    pub failing_lbas: Vec<u32>,
}

impl<D: BlockDevice> CountingDevice<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
            reads: 0,
            failing_lbas: Vec::new(),
        }
    }
}

impl<D: BlockDevice> BlockDevice for CountingDevice<D> {
    fn geometry(&self) -> Geometry {
        self.inner.geometry()
    }

    fn read_sectors(&mut self, lba: u32, count: u16, buf: &mut [u8]) -> Result<(), BootFsError> {
        self.reads += 1;
        if self.failing_lbas.contains(&lba) {
            return Err(BootFsError::ReadFailed { lba, attempts: 3 });
        }
        self.inner.read_sectors(lba, count, buf)
    }
}
