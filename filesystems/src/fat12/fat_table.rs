// FAT12 allocation table and cluster-chain resolution

use byteorder::{ByteOrder, LittleEndian};
use log::warn;
use crate::fat_common::constants::*;

/// What a table entry says about the cluster after the one it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterLink {
    Next(u32),
    EndOfChain,
    /// Free, reserved, or bad-cluster value inside a chain
    Corrupt(u32),
}

/// The first copy of the allocation table, loaded whole.
#[derive(Debug, Clone)]
pub struct AllocationTable {
    bytes: Vec<u8>,
}

impl AllocationTable {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Raw 12-bit entry for `cluster`.
    ///
    /// Entries are packed two per three bytes: the entry for cluster `n` sits in the
    /// little-endian word at byte `n * 3 / 2`, in the low 12 bits for even `n` and
    /// the high 12 bits for odd `n`. Offsets past the table read as end of chain.
    pub fn next_cluster(&self, cluster: u32) -> u32 {
        let index = cluster as usize * 3 / 2;
        if index + 1 >= self.bytes.len() {
            warn!("FAT: cluster {} lies outside the allocation table", cluster);
            return FAT12_EOC_MARK;
        }

        let word = LittleEndian::read_u16(&self.bytes[index..]) as u32;
        if cluster % 2 == 0 {
            word & FAT12_ENTRY_MASK
        } else {
            word >> 4
        }
    }

    pub fn link(&self, cluster: u32) -> ClusterLink {
        match self.next_cluster(cluster) {
            next if is_end_of_chain(next) => ClusterLink::EndOfChain,
            next if next < FIRST_DATA_CLUSTER || next == FAT12_BAD => ClusterLink::Corrupt(next),
            next => ClusterLink::Next(next),
        }
    }

    /// Walk the chain from `start`, yielding `start` first.
    pub fn chain(&self, start: u32) -> ClusterChain<'_> {
        ClusterChain {
            table: self,
            current: (start >= FIRST_DATA_CLUSTER).then_some(start),
            remaining: self.bytes.len() * 2 / 3,
        }
    }
}

pub fn is_end_of_chain(value: u32) -> bool {
    value >= FAT12_EOC
}

/// Iterator over one chain. Bounded by the number of entries in the table so a
/// looping chain cannot spin forever.
pub struct ClusterChain<'a> {
    table: &'a AllocationTable,
    current: Option<u32>,
    remaining: usize,
}

impl Iterator for ClusterChain<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let cluster = self.current?;
        if self.remaining == 0 {
            warn!("FAT: chain through cluster {} does not terminate", cluster);
            self.current = None;
            return None;
        }
        self.remaining -= 1;

        self.current = match self.table.link(cluster) {
            ClusterLink::Next(next) => Some(next),
            ClusterLink::EndOfChain => None,
            ClusterLink::Corrupt(value) => {
                warn!("FAT: cluster {} links to invalid value {:#05x}", cluster, value);
                None
            }
        };
        Some(cluster)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::set_fat12_entry;

    fn table_with(entries: &[(u32, u32)]) -> AllocationTable {
        let mut bytes = vec![0u8; 512];
        for &(cluster, value) in entries {
            set_fat12_entry(&mut bytes, cluster, value);
        }
        AllocationTable::from_bytes(bytes)
    }

    #[test]
    fn test_even_cluster_uses_low_bits() {
        let mut bytes = vec![0u8; 16];
        // cluster 2 -> offset 3, word 0xBA0C
        bytes[3] = 0x0C;
        bytes[4] = 0xBA;
        let table = AllocationTable::from_bytes(bytes);

        assert_eq!(table.next_cluster(2), 0xA0C);
    }

    #[test]
    fn test_odd_cluster_uses_high_bits() {
        let mut bytes = vec![0u8; 16];
        // cluster 3 -> offset 4, word 0xBA0C
        bytes[4] = 0x0C;
        bytes[5] = 0xBA;
        let table = AllocationTable::from_bytes(bytes);

        assert_eq!(table.next_cluster(3), 0xBA0);
    }

    #[test]
    fn test_neighbouring_entries_do_not_bleed() {
        let table = table_with(&[(4, 0xFFF), (5, 0x123), (6, 0x000), (7, 0xABC)]);

        assert_eq!(table.next_cluster(4), 0xFFF);
        assert_eq!(table.next_cluster(5), 0x123);
        assert_eq!(table.next_cluster(6), 0x000);
        assert_eq!(table.next_cluster(7), 0xABC);
    }

    #[test]
    fn test_walk_written_chain() {
        let table = table_with(&[(2, 3), (3, 7), (7, 4), (4, 0xFF8)]);

        let chain: Vec<u32> = table.chain(2).collect();
        assert_eq!(chain, vec![2, 3, 7, 4]);
        assert!(is_end_of_chain(table.next_cluster(4)));
        assert_eq!(table.link(4), ClusterLink::EndOfChain);
    }

    #[test]
    fn test_end_of_chain_range() {
        assert!(!is_end_of_chain(0xFF7));
        for value in 0xFF8..=0xFFF {
            assert!(is_end_of_chain(value));
        }
    }

    #[test]
    fn test_corrupt_links() {
        let table = table_with(&[(2, 0), (3, 1), (4, 0xFF7)]);

        assert_eq!(table.link(2), ClusterLink::Corrupt(0));
        assert_eq!(table.link(3), ClusterLink::Corrupt(1));
        assert_eq!(table.link(4), ClusterLink::Corrupt(0xFF7));
        assert_eq!(table.chain(4).collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_out_of_range_reads_as_end() {
        let table = AllocationTable::from_bytes(vec![0u8; 6]);
        assert_eq!(table.next_cluster(4), FAT12_EOC_MARK);
    }

    #[test]
    fn test_cyclic_chain_terminates() {
        let table = table_with(&[(2, 3), (3, 2)]);
        let chain: Vec<u32> = table.chain(2).collect();
        assert_eq!(chain.len(), 512 * 2 / 3);
    }
}
