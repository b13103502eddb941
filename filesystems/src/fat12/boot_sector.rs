// FAT12 boot sector and the volume layout derived from it

use byteorder::{ByteOrder, LittleEndian};
use bootfs_core::{BootFsError, SECTOR_SIZE};
use log::warn;
use crate::fat_common::constants::*;

/// BIOS parameter block plus extended boot record, as read from block 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootSector {
    pub jump_boot: [u8; 3],
    pub oem_name: [u8; 8],
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub dir_entry_count: u16,
    pub total_sectors: u16,
    pub media_descriptor: u8,
    pub sectors_per_fat: u16,
    pub sectors_per_track: u16,
    pub heads: u16,
    pub hidden_sectors: u32,
    pub large_sector_count: u32,

    pub drive_number: u8,
    pub signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub system_id: [u8; 8],

    /// 0x55AA present at the end of the sector
    pub has_boot_signature: bool,
}

impl BootSector {
    pub fn parse(sector: &[u8; SECTOR_SIZE]) -> Self {
        let mut jump_boot = [0u8; 3];
        jump_boot.copy_from_slice(&sector[BS_JMP_BOOT..BS_JMP_BOOT + 3]);
        let mut oem_name = [0u8; 8];
        oem_name.copy_from_slice(&sector[BS_OEM_NAME..BS_OEM_NAME + 8]);
        let mut volume_label = [0u8; 11];
        volume_label.copy_from_slice(&sector[BS_VOL_LAB..BS_VOL_LAB + 11]);
        let mut system_id = [0u8; 8];
        system_id.copy_from_slice(&sector[BS_FIL_SYS_TYPE..BS_EBR_END]);

        Self {
            jump_boot,
            oem_name,
            bytes_per_sector: LittleEndian::read_u16(&sector[BPB_BYTES_PER_SEC..]),
            sectors_per_cluster: sector[BPB_SEC_PER_CLUS],
            reserved_sectors: LittleEndian::read_u16(&sector[BPB_RSVD_SEC_CNT..]),
            fat_count: sector[BPB_NUM_FATS],
            dir_entry_count: LittleEndian::read_u16(&sector[BPB_ROOT_ENT_CNT..]),
            total_sectors: LittleEndian::read_u16(&sector[BPB_TOT_SEC16..]),
            media_descriptor: sector[BPB_MEDIA],
            sectors_per_fat: LittleEndian::read_u16(&sector[BPB_FAT_SZ16..]),
            sectors_per_track: LittleEndian::read_u16(&sector[BPB_SEC_PER_TRK..]),
            heads: LittleEndian::read_u16(&sector[BPB_NUM_HEADS..]),
            hidden_sectors: LittleEndian::read_u32(&sector[BPB_HIDD_SEC..]),
            large_sector_count: LittleEndian::read_u32(&sector[BPB_TOT_SEC32..]),
            drive_number: sector[BS_DRV_NUM],
            signature: sector[BS_BOOT_SIG],
            volume_id: LittleEndian::read_u32(&sector[BS_VOL_ID..]),
            volume_label,
            system_id,
            has_boot_signature: sector[BOOT_SIGNATURE_OFFSET..BOOT_SIGNATURE_OFFSET + 2] == BOOT_SIGNATURE,
        }
    }

    /// Reject parameters the reader cannot work with.
    pub fn validate(&self) -> Result<(), BootFsError> {
        if self.bytes_per_sector as usize != SECTOR_SIZE {
            return Err(BootFsError::InvalidBootSector(format!(
                "unsupported bytes per sector: {}", self.bytes_per_sector
            )));
        }
        if self.sectors_per_cluster == 0 {
            return Err(BootFsError::InvalidBootSector("sectors per cluster is 0".to_string()));
        }
        if self.fat_count == 0 {
            return Err(BootFsError::InvalidBootSector("number of FATs is 0".to_string()));
        }
        if self.sectors_per_fat == 0 {
            return Err(BootFsError::InvalidBootSector("sectors per FAT is 0".to_string()));
        }
        if self.dir_entry_count == 0 {
            return Err(BootFsError::InvalidBootSector("root directory has no entries".to_string()));
        }
        if !self.has_boot_signature {
            warn!("Boot sector has no 0x55AA signature, mounting anyway");
        }
        if !self.has_standard_media() {
            warn!("Boot sector has nonstandard media descriptor {:#04x}", self.media_descriptor);
        }
        Ok(())
    }

    pub fn has_standard_media(&self) -> bool {
        self.media_descriptor == MEDIA_FLOPPY || self.media_descriptor >= MEDIA_FIXED
    }

    pub fn total_sector_count(&self) -> u32 {
        if self.total_sectors != 0 {
            self.total_sectors as u32
        } else {
            self.large_sector_count
        }
    }

    pub fn label(&self) -> String {
        String::from_utf8_lossy(&self.volume_label).trim_end().to_string()
    }

    pub fn system_id(&self) -> String {
        String::from_utf8_lossy(&self.system_id).trim_end().to_string()
    }
}

/// Sector addresses derived once from the boot sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeLayout {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub fat_lba: u32,
    pub sectors_per_fat: u32,
    pub fat_size: usize,
    pub root_dir_lba: u32,
    pub root_dir_size: u32,
    pub root_dir_sectors: u32,
    pub data_lba: u32,
    pub cluster_count: u32,
}

impl VolumeLayout {
    pub fn from_boot_sector(bs: &BootSector) -> Self {
        let bytes_per_sector = bs.bytes_per_sector as u32;
        let sectors_per_cluster = bs.sectors_per_cluster as u32;
        let fat_lba = bs.reserved_sectors as u32;
        let sectors_per_fat = bs.sectors_per_fat as u32;

        let root_dir_lba = fat_lba + sectors_per_fat * bs.fat_count as u32;
        let root_dir_size = bs.dir_entry_count as u32 * DIRECTORY_ENTRY_SIZE as u32;
        let root_dir_sectors = root_dir_size.div_ceil(bytes_per_sector);
        let data_lba = root_dir_lba + root_dir_sectors;

        let cluster_count = bs.total_sector_count().saturating_sub(data_lba) / sectors_per_cluster;

        Self {
            bytes_per_sector,
            sectors_per_cluster,
            fat_lba,
            sectors_per_fat,
            fat_size: bytes_per_sector as usize * sectors_per_fat as usize,
            root_dir_lba,
            root_dir_size,
            root_dir_sectors,
            data_lba,
            cluster_count,
        }
    }

    /// Highest cluster number that lies inside the data area.
    pub fn last_cluster(&self) -> u32 {
        self.cluster_count + FIRST_DATA_CLUSTER - 1
    }

    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        (FIRST_DATA_CLUSTER..=self.last_cluster()).contains(&cluster)
    }

    /// First sector of a data cluster; `None` for the reserved clusters 0 and 1
    /// or when the address does not fit in 32 bits.
    pub fn cluster_to_lba(&self, cluster: u32) -> Option<u32> {
        cluster
            .checked_sub(FIRST_DATA_CLUSTER)?
            .checked_mul(self.sectors_per_cluster)?
            .checked_add(self.data_lba)
    }
}
