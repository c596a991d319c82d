//! Replay-side address virtualization
//!
//! Pointers recorded at capture time are meaningless in the replaying
//! process. `AddressTable` owns the replay storage for every captured memory
//! range and maps original addresses onto it. Blobs have no capture-time
//! address, so their replay copies are keyed by [`crate::value::Blob::id`].
//! Values only carry the original address or blob id (and, for blobs, a
//! `bound` flag); the table is the single owner of the translation state.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
struct Region {
    len: u64,
    storage: Box<[u8]>,
}

impl Region {
    fn zeroed(len: usize) -> Self {
        // Keep at least one byte so the region has a distinct, non-dangling address
        Self {
            len: len as u64,
            storage: vec![0u8; len.max(1)].into_boxed_slice(),
        }
    }

    fn copy_of(data: &[u8]) -> Self {
        let mut region = Self::zeroed(data.len());
        region.storage[..data.len()].copy_from_slice(data);
        region
    }

    fn base(&self) -> u64 {
        self.storage.as_ptr() as u64
    }

    fn contains(&self, start: u64, address: u64) -> bool {
        let offset = address.wrapping_sub(start);
        address >= start && (offset < self.len || (self.len == 0 && offset == 0))
    }
}

/// Original → replay address translation table for one replay session
#[derive(Debug, Default)]
pub struct AddressTable {
    regions: BTreeMap<u64, Region>,
    blobs: HashMap<u64, Region>,
    identity: BTreeMap<u64, u64>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate zeroed replay storage for the captured range `[original, original + len)`
    ///
    /// Returns the replay address of the start of the range. A region already
    /// registered at `original` is replaced.
    pub fn add_region(&mut self, original: u64, len: usize) -> u64 {
        let region = Region::zeroed(len);
        let base = region.base();
        if self.regions.insert(original, region).is_some() {
            tracing::debug!(original = format_args!("{original:#x}"), "replaced region");
        }
        base
    }

    /// Drop the region registered at `original`
    pub fn remove_region(&mut self, original: u64) -> bool {
        self.regions.remove(&original).is_some()
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Replay storage of the region registered at `original`
    pub fn region_bytes(&self, original: u64) -> Option<&[u8]> {
        self.regions
            .get(&original)
            .map(|r| &r.storage[..r.len as usize])
    }

    /// Mutable replay storage of the region registered at `original`
    pub fn region_bytes_mut(&mut self, original: u64) -> Option<&mut [u8]> {
        self.regions
            .get_mut(&original)
            .map(|r| &mut r.storage[..r.len as usize])
    }

    /// Translate an original address without establishing anything new
    ///
    /// Returns `None` when the address is neither inside a region nor
    /// previously bound.
    pub fn translate(&self, original: u64) -> Option<u64> {
        if let Some((start, region)) = self.regions.range(..=original).next_back() {
            if region.contains(*start, original) {
                return Some(region.base() + (original - start));
            }
        }
        self.identity.get(&original).copied()
    }

    /// Replay address of a bound blob
    pub fn blob_address(&self, blob_id: u64) -> Option<u64> {
        self.blobs.get(&blob_id).map(Region::base)
    }

    /// Replay copy of a bound blob
    pub fn blob_bytes(&self, blob_id: u64) -> Option<&[u8]> {
        self.blobs
            .get(&blob_id)
            .map(|r| &r.storage[..r.len as usize])
    }

    /// Free the replay copy of a blob once nothing refers to it any more
    pub fn release_blob(&mut self, blob_id: u64) -> bool {
        self.blobs.remove(&blob_id).is_some()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// Map a captured blob, copying its bytes into replay storage on first use
    pub(crate) fn bind_blob(&mut self, blob_id: u64, data: &[u8]) -> u64 {
        self.blobs
            .entry(blob_id)
            .or_insert_with(|| Region::copy_of(data))
            .base()
    }

    /// Map a raw captured pointer
    ///
    /// Pointers outside every known region are passed through unchanged, and
    /// that identity mapping is remembered.
    pub(crate) fn bind_pointer(&mut self, original: u64) -> u64 {
        if original == 0 {
            return 0;
        }
        if let Some(address) = self.translate(original) {
            return address;
        }
        tracing::warn!(
            address = format_args!("{original:#x}"),
            "pointer outside any known region, passing through"
        );
        self.identity.insert(original, original);
        original
    }
}
