//! Byte-granular region map for a section under exploration.
//!
//! Every in-scope VMA is either mapped (it carries a flag set describing what
//! was recovered there) or sits in the unmapped bag. The bag is a dense
//! vector paired with a position index so strategies can sample it by index
//! in O(1) and removal on first mapping is O(1) as well.

use std::collections::HashMap;

use crate::Address;

/// Region flags recorded per VMA. Flags OR-combine; a block start is usually
/// also an instruction start and a code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionFlags(u32);

impl RegionFlags {
    pub const UNMAPPED: RegionFlags = RegionFlags(0);
    pub const CODE: RegionFlags = RegionFlags(1 << 0);
    pub const DATA: RegionFlags = RegionFlags(1 << 1);
    pub const BB_START: RegionFlags = RegionFlags(1 << 2);
    pub const INS_START: RegionFlags = RegionFlags(1 << 3);

    pub fn contains(self, other: RegionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_unmapped(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for RegionFlags {
    type Output = RegionFlags;
    fn bitor(self, rhs: RegionFlags) -> RegionFlags {
        RegionFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for RegionFlags {
    fn bitor_assign(&mut self, rhs: RegionFlags) {
        self.0 |= rhs.0;
    }
}

/// Map from VMA to region flags, plus the bag of not-yet-claimed addresses.
///
/// Invariant: a tracked address is in `addrmap` or in the bag, never both.
/// Assigning any non-`UNMAPPED` flag pulls the address out of the bag.
#[derive(Debug, Default)]
pub struct AddressMap {
    addrmap: HashMap<Address, RegionFlags>,
    unmapped: Vec<Address>,
    unmapped_lookup: HashMap<Address, usize>,
}

impl AddressMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `addr` as unmapped. Idempotent; an address that is
    /// already mapped or bagged is left alone.
    pub fn insert(&mut self, addr: Address) {
        if !self.contains(addr) {
            self.unmapped.push(addr);
            self.unmapped_lookup.insert(addr, self.unmapped.len() - 1);
        }
    }

    /// True iff `addr` is tracked at all (mapped or unmapped).
    pub fn contains(&self, addr: Address) -> bool {
        self.addrmap.contains_key(&addr) || self.unmapped_lookup.contains_key(&addr)
    }

    /// Flags recorded at `addr`. Callers must gate with [`contains`];
    /// untracked addresses read as `UNMAPPED`.
    ///
    /// [`contains`]: AddressMap::contains
    pub fn addr_type(&self, addr: Address) -> RegionFlags {
        debug_assert!(self.contains(addr));
        self.addrmap
            .get(&addr)
            .copied()
            .unwrap_or(RegionFlags::UNMAPPED)
    }

    /// Replace the flags at `addr`. Precondition: `contains(addr)`.
    pub fn set_addr_type(&mut self, addr: Address, flags: RegionFlags) {
        debug_assert!(self.contains(addr));
        if !self.contains(addr) {
            return;
        }
        if flags != RegionFlags::UNMAPPED {
            self.erase_unmapped(addr);
        }
        self.addrmap.insert(addr, flags);
    }

    /// OR `flag` into the flags at `addr`. Precondition: `contains(addr)`.
    pub fn add_addr_flag(&mut self, addr: Address, flag: RegionFlags) {
        debug_assert!(self.contains(addr));
        if !self.contains(addr) {
            return;
        }
        if flag != RegionFlags::UNMAPPED {
            self.erase_unmapped(addr);
        }
        *self.addrmap.entry(addr).or_insert(RegionFlags::UNMAPPED) |= flag;
    }

    /// Stop tracking `addr` entirely.
    pub fn erase(&mut self, addr: Address) {
        self.addrmap.remove(&addr);
        self.erase_unmapped(addr);
    }

    /// Number of addresses still in the unmapped bag.
    pub fn unmapped_count(&self) -> usize {
        self.unmapped.len()
    }

    /// Random access into the unmapped bag. The bag is unordered; positions
    /// shift as addresses are claimed.
    pub fn get_unmapped(&self, i: usize) -> Address {
        self.unmapped[i]
    }

    fn erase_unmapped(&mut self, addr: Address) {
        if let Some(i) = self.unmapped_lookup.remove(&addr) {
            let removed = self.unmapped.swap_remove(i);
            debug_assert_eq!(removed, addr);
            if let Some(&moved) = self.unmapped.get(i) {
                self.unmapped_lookup.insert(moved, i);
            }
        }
    }
}
