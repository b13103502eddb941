// FAT12 on-disk constants

use static_assertions::const_assert_eq;

// Boot sector offsets
pub const BS_JMP_BOOT: usize = 0x00;
pub const BS_OEM_NAME: usize = 0x03;
pub const BPB_BYTES_PER_SEC: usize = 0x0B;
pub const BPB_SEC_PER_CLUS: usize = 0x0D;
pub const BPB_RSVD_SEC_CNT: usize = 0x0E;
pub const BPB_NUM_FATS: usize = 0x10;
pub const BPB_ROOT_ENT_CNT: usize = 0x11;
pub const BPB_TOT_SEC16: usize = 0x13;
pub const BPB_MEDIA: usize = 0x15;
pub const BPB_FAT_SZ16: usize = 0x16;
pub const BPB_SEC_PER_TRK: usize = 0x18;
pub const BPB_NUM_HEADS: usize = 0x1A;
pub const BPB_HIDD_SEC: usize = 0x1C;
pub const BPB_TOT_SEC32: usize = 0x20;

// Extended boot record (follows the BPB at 36)
pub const BS_DRV_NUM: usize = 0x24;
pub const BS_BOOT_SIG: usize = 0x26;
pub const BS_VOL_ID: usize = 0x27;
pub const BS_VOL_LAB: usize = 0x2B;
pub const BS_FIL_SYS_TYPE: usize = 0x36;
pub const BS_EBR_END: usize = 0x3E;

const_assert_eq!(BS_FIL_SYS_TYPE + 8, BS_EBR_END);

// Boot sector signature
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;

// FAT12 entry values
pub const FAT12_ENTRY_MASK: u32 = 0x0FFF;
pub const FAT12_BAD: u32 = 0x0FF7;   // Bad cluster marker
pub const FAT12_EOC: u32 = 0x0FF8;   // Anything at or above is end of chain
pub const FAT12_EOC_MARK: u32 = 0x0FFF;
pub const FIRST_DATA_CLUSTER: u32 = 2;

// Directory entries
pub const DIRECTORY_ENTRY_SIZE: usize = 32;
pub const DIR_NAME_LEN: usize = 11;
pub const ENTRY_END: u8 = 0x00;      // No further entries in this directory
pub const ENTRY_DELETED: u8 = 0xE5;
pub const ENTRY_KANJI_E5: u8 = 0x05; // First byte 0xE5 stored as 0x05

pub const DIR_ATTR: usize = 0x0B;
pub const DIR_NT_RES: usize = 0x0C;
pub const DIR_CRT_TIME_TENTH: usize = 0x0D;
pub const DIR_CRT_TIME: usize = 0x0E;
pub const DIR_CRT_DATE: usize = 0x10;
pub const DIR_LST_ACC_DATE: usize = 0x12;
pub const DIR_FST_CLUS_HI: usize = 0x14;
pub const DIR_WRT_TIME: usize = 0x16;
pub const DIR_WRT_DATE: usize = 0x18;
pub const DIR_FST_CLUS_LO: usize = 0x1A;
pub const DIR_FILE_SIZE: usize = 0x1C;

const_assert_eq!(DIR_FILE_SIZE + 4, DIRECTORY_ENTRY_SIZE);
const_assert_eq!(DIR_ATTR, DIR_NAME_LEN);

// Media descriptors: 0xF0 for removable media, 0xF8..=0xFF for the rest
pub const MEDIA_FIXED: u8 = 0xF8;
pub const MEDIA_FLOPPY: u8 = 0xF0;
