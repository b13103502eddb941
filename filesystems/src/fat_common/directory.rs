// FAT directory entries and 8.3 short names

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDateTime;
use super::constants::*;
use super::timestamps::fat_datetime;

/// Directory entry attributes
pub mod attributes {
    pub const ATTR_READ_ONLY: u8 = 0x01;
    pub const ATTR_HIDDEN: u8 = 0x02;
    pub const ATTR_SYSTEM: u8 = 0x04;
    pub const ATTR_VOLUME_ID: u8 = 0x08;
    pub const ATTR_DIRECTORY: u8 = 0x10;
    pub const ATTR_ARCHIVE: u8 = 0x20;
    pub const ATTR_LONG_NAME: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;
    pub const ATTR_LONG_NAME_MASK: u8 = ATTR_LONG_NAME | ATTR_DIRECTORY | ATTR_ARCHIVE;
}

use attributes::*;

/// One 32-byte directory record, decoded field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: [u8; DIR_NAME_LEN],
    pub attributes: u8,
    pub reserved: u8,
    pub created_time_tenths: u8,
    pub created_time: u16,
    pub created_date: u16,
    pub accessed_date: u16,
    pub first_cluster_high: u16,
    pub modified_time: u16,
    pub modified_date: u16,
    pub first_cluster_low: u16,
    pub size: u32,
}

impl DirectoryEntry {
    /// Decode a record; all multi-byte fields are little-endian.
    pub fn parse(raw: &[u8; DIRECTORY_ENTRY_SIZE]) -> Self {
        let mut name = [0u8; DIR_NAME_LEN];
        name.copy_from_slice(&raw[..DIR_NAME_LEN]);

        Self {
            name,
            attributes: raw[DIR_ATTR],
            reserved: raw[DIR_NT_RES],
            created_time_tenths: raw[DIR_CRT_TIME_TENTH],
            created_time: LittleEndian::read_u16(&raw[DIR_CRT_TIME..]),
            created_date: LittleEndian::read_u16(&raw[DIR_CRT_DATE..]),
            accessed_date: LittleEndian::read_u16(&raw[DIR_LST_ACC_DATE..]),
            first_cluster_high: LittleEndian::read_u16(&raw[DIR_FST_CLUS_HI..]),
            modified_time: LittleEndian::read_u16(&raw[DIR_WRT_TIME..]),
            modified_date: LittleEndian::read_u16(&raw[DIR_WRT_DATE..]),
            first_cluster_low: LittleEndian::read_u16(&raw[DIR_FST_CLUS_LO..]),
            size: LittleEndian::read_u32(&raw[DIR_FILE_SIZE..]),
        }
    }

    pub fn first_cluster(&self) -> u32 {
        ((self.first_cluster_high as u32) << 16) | self.first_cluster_low as u32
    }

    pub fn is_directory(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    pub fn is_volume_id(&self) -> bool {
        self.attributes & ATTR_VOLUME_ID != 0
    }

    pub fn is_long_name(&self) -> bool {
        self.attributes & ATTR_LONG_NAME_MASK == ATTR_LONG_NAME
    }

    /// End-of-directory marker: nothing after this record is in use.
    pub fn is_end(&self) -> bool {
        self.name[0] == ENTRY_END
    }

    pub fn is_deleted(&self) -> bool {
        self.name[0] == ENTRY_DELETED
    }

    /// A record naming a file or subdirectory.
    pub fn is_live(&self) -> bool {
        !self.is_end() && !self.is_deleted() && !self.is_long_name() && !self.is_volume_id()
    }

    pub fn display_name(&self) -> String {
        parse_83_name(&self.name)
    }

    /// Last-write timestamp, `None` when the stored date is not a calendar date.
    pub fn modified(&self) -> Option<NaiveDateTime> {
        fat_datetime(self.modified_date, self.modified_time)
    }
}

/// Convert a path segment into the space-padded, uppercase 8.3 key stored on disk.
///
/// Characters before the first `.` fill the name (truncated to 8), characters after
/// it fill the extension (truncated to 3). `.` and `..` map to the dot entries.
pub fn short_name(segment: &str) -> [u8; DIR_NAME_LEN] {
    let mut key = [b' '; DIR_NAME_LEN];

    if segment == "." || segment == ".." {
        key[..segment.len()].copy_from_slice(segment.as_bytes());
        return key;
    }

    let (base, ext) = match segment.find('.') {
        Some(dot) => (&segment[..dot], &segment[dot + 1..]),
        None => (segment, ""),
    };

    for (slot, byte) in key[..8].iter_mut().zip(base.bytes()) {
        *slot = byte.to_ascii_uppercase();
    }
    for (slot, byte) in key[8..].iter_mut().zip(ext.bytes()) {
        *slot = byte.to_ascii_uppercase();
    }
    if key[0] == ENTRY_DELETED {
        key[0] = ENTRY_KANJI_E5;
    }

    key
}

/// Turn a stored 8.3 name back into `NAME.EXT`.
pub fn parse_83_name(name: &[u8; DIR_NAME_LEN]) -> String {
    let mut result = String::new();

    for (i, &byte) in name[..8].iter().enumerate() {
        if byte == b' ' || byte == 0x00 {
            break;
        }
        if i == 0 && byte == ENTRY_KANJI_E5 {
            result.push(0xE5 as char);
        } else {
            result.push(byte as char);
        }
    }

    let ext: String = name[8..]
        .iter()
        .take_while(|&&b| b != b' ' && b != 0x00)
        .map(|&b| b as char)
        .collect();
    if !ext.is_empty() {
        result.push('.');
        result.push_str(&ext);
    }

    result
}
