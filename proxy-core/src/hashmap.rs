//! # Robin-Hood Hash Map
//!
//! An open-addressed hash map keyed by byte strings, using Robin-Hood
//! displacement to bound worst-case probe length and backward-shift
//! deletion to avoid tombstones. Ported from the djb2-hashed, PSL-tracking
//! design in `examples/original_source/hashmap.c`, generalized from
//! `void *value` to a type parameter `V` per that file's own "parametrize by
//! value type" suggestion.
//!
//! The full (non-modulo) hash is stored alongside each key so that a probe
//! can reject a mismatch without touching the key bytes.

use crate::error::{Error, Result};

/// Maximum number of bins, matching the original's `UINT_MAX` ceiling.
const MAX_BINS: usize = u32::MAX as usize;
/// Largest single growth step, in bins, per resize.
const MAX_GROWTH_STEP: usize = 1_048_576;

enum Bin<V> {
    Empty,
    Occupied(Occupied<V>),
}

struct Occupied<V> {
    hash: u64,
    key: Vec<u8>,
    value: V,
    psl: usize,
}

/// An open-addressed, Robin-Hood-displaced hash map from byte strings to `V`.
pub struct RobinHoodMap<V> {
    bins: Vec<Bin<V>>,
    size: usize,
    length: usize,
    minsize: usize,
}

impl<V> RobinHoodMap<V> {
    /// Creates a map with at least `minsize` bins; `minsize` is also the
    /// floor below which the map will never shrink.
    pub fn new(minsize: usize) -> Self {
        let minsize = minsize.max(1);
        let mut map = RobinHoodMap {
            bins: Vec::new(),
            size: 0,
            length: 0,
            minsize,
        };
        map.resize(minsize).expect("initial allocation");
        map
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.length
    }

    /// True when the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current number of bins (for diagnostics/tests, not part of the
    /// conceptual API).
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Returns the `(hash, key, psl)` of the entry occupying bin `index`, if
    /// any. Exposed so tests outside this module can check table-wide
    /// invariants (e.g. that every entry's probe sequence length correctly
    /// accounts for its displacement from its ideal bin) without reimplementing
    /// the probing logic.
    pub fn bin_at(&self, index: usize) -> Option<(u64, &[u8], usize)> {
        match &self.bins[index] {
            Bin::Empty => None,
            Bin::Occupied(bin) => Some((bin.hash, bin.key.as_slice(), bin.psl)),
        }
    }

    /// Looks up `key`, returning a reference to its value if present.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let hash = djb2(key);
        let mut idx = (hash as usize) % self.size;
        let mut n = 0usize;
        loop {
            match &self.bins[idx] {
                Bin::Empty => return None,
                Bin::Occupied(bin) => {
                    if bin.hash == hash && bin.key == key {
                        return Some(&bin.value);
                    }
                    if n > bin.psl {
                        return None;
                    }
                }
            }
            n += 1;
            idx = (idx + 1) % self.size;
        }
    }

    /// Inserts `key` -> `value`. If `key` already exists, its value is
    /// overwritten (unlike the cache layer above, which treats a duplicate
    /// insert as a no-op). May trigger a grow-resize first if the map is
    /// above ~85% full.
    pub fn insert(&mut self, key: &[u8], value: V) -> Result<()> {
        if self.length > approx_85_percent(self.size) {
            let grow_limit = self.size.saturating_add(MAX_GROWTH_STEP);
            let new_size = self.size.saturating_mul(2).min(grow_limit).max(self.size + 1);
            self.resize(new_size)?;
        }
        self.insert_no_resize(key, value);
        Ok(())
    }

    /// Removes `key`, returning its value if it was present. May trigger a
    /// shrink-resize afterward if the map falls below ~40% full (and above
    /// `minsize`).
    pub fn remove(&mut self, key: &[u8]) -> Option<V> {
        let hash = djb2(key);
        let mut idx = (hash as usize) % self.size;
        let mut n = 0usize;
        loop {
            match &self.bins[idx] {
                Bin::Empty => return None,
                Bin::Occupied(bin) => {
                    if bin.hash == hash && bin.key == key {
                        break;
                    }
                    if n > bin.psl {
                        return None;
                    }
                }
            }
            n += 1;
            idx = (idx + 1) % self.size;
        }

        let removed = match std::mem::replace(&mut self.bins[idx], Bin::Empty) {
            Bin::Occupied(bin) => bin.value,
            Bin::Empty => unreachable!("matched Occupied above"),
        };
        self.length -= 1;

        // Backward-shift: pull subsequent displaced entries back one slot,
        // decrementing their PSL, until we hit an empty bin or one already
        // at its ideal position.
        let mut cur = idx;
        loop {
            let next = (cur + 1) % self.size;
            let can_shift = matches!(&self.bins[next], Bin::Occupied(bin) if bin.psl > 0);
            if !can_shift {
                break;
            }
            if let Bin::Occupied(bin) = &mut self.bins[next] {
                bin.psl -= 1;
            }
            self.bins.swap(cur, next);
            cur = next;
        }

        let threshold = approx_40_percent(self.size);
        if self.length > self.minsize && self.length < threshold {
            let new_size = (self.size / 2).max(self.minsize);
            // A failed shrink is not fatal: the map stays correct, just
            // larger than strictly necessary.
            let _ = self.resize(new_size);
        }

        Some(removed)
    }

    fn insert_no_resize(&mut self, key: &[u8], value: V) {
        let hash = djb2(key);
        let mut entry = Occupied {
            hash,
            key: key.to_vec(),
            value,
            psl: 0,
        };
        let mut idx = (hash as usize) % self.size;
        loop {
            match &mut self.bins[idx] {
                Bin::Empty => {
                    self.bins[idx] = Bin::Occupied(entry);
                    self.length += 1;
                    return;
                }
                Bin::Occupied(bin) => {
                    if bin.hash == entry.hash && bin.key == entry.key {
                        bin.value = entry.value;
                        return;
                    }
                    // Strict `>` so the incumbent keeps its slot on ties.
                    if entry.psl > bin.psl {
                        std::mem::swap(bin, &mut entry);
                    }
                }
            }
            entry.psl += 1;
            idx = (idx + 1) % self.size;
        }
    }

    fn resize(&mut self, new_size: usize) -> Result<()> {
        if new_size > MAX_BINS {
            return Err(Error::HashMapTooLarge);
        }
        let new_size = new_size.max(1);
        let old_bins = std::mem::replace(
            &mut self.bins,
            std::iter::repeat_with(|| Bin::Empty).take(new_size).collect(),
        );
        self.size = new_size;
        self.length = 0;

        for bin in old_bins {
            if let Bin::Occupied(occ) = bin {
                self.insert_no_resize(&occ.key, occ.value);
            }
        }
        Ok(())
    }
}

/// djb2 hash, widened to 64 bits. Seed 5381, `hash = hash * 33 + byte`.
/// Wrapping arithmetic matches the original's reliance on `size_t` overflow.
fn djb2(key: &[u8]) -> u64 {
    let mut hash: u64 = 5381;
    for &byte in key {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

fn approx_85_percent(x: usize) -> usize {
    ((x as u128 * 870) >> 10) as usize
}

fn approx_40_percent(x: usize) -> usize {
    ((x as u128 * 409) >> 10) as usize
}
