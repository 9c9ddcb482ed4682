//! Growing bloom filter used to check uniqueness of generated field values
//! against millions of pre-existing rows without holding them all in
//! memory. Hand-rolled (no bloom-filter crate appears anywhere in the
//! retrieved corpus), in the teacher's habit of hand-rolling small,
//! well-specified algorithms over `std` alone (cf. `rng.rs`'s const
//! FNV-1a seed derivation).
//!
//! A single sub-filter has a fixed capacity and false-positive rate; once
//! it fills past capacity a new, larger sub-filter is chained on top
//! (capacity x4, error rate x0.9), so the whole structure keeps accepting
//! inserts indefinitely while the error rate of newer sub-filters
//! tightens to offset the growing false-positive surface.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

struct SubFilter {
    bits: Vec<u64>,
    num_bits: usize,
    num_hashes: u32,
    capacity: usize,
    inserted: usize,
}

impl SubFilter {
    fn new(capacity: usize, error_rate: f64) -> Self {
        let capacity = capacity.max(1);
        let error_rate = error_rate.clamp(1e-6, 0.5);
        let ln2 = std::f64::consts::LN_2;
        let num_bits = (-(capacity as f64) * error_rate.ln() / (ln2 * ln2)).ceil() as usize;
        let num_bits = num_bits.max(64);
        let num_hashes = ((num_bits as f64 / capacity as f64) * ln2).round().max(1.0) as u32;
        let words = num_bits.div_ceil(64);
        SubFilter {
            bits: vec![0u64; words],
            num_bits,
            num_hashes,
            capacity,
            inserted: 0,
        }
    }

    fn hashes(&self, item: &[u8]) -> (u64, u64) {
        let mut h1 = DefaultHasher::new();
        item.hash(&mut h1);
        let a = h1.finish();

        let mut h2 = DefaultHasher::new();
        0xdead_beef_u64.hash(&mut h2);
        item.hash(&mut h2);
        let b = h2.finish() | 1; // ensure odd so double hashing visits all slots for power-of-two moduli

        (a, b)
    }

    fn slot(&self, h1: u64, h2: u64, i: u32) -> usize {
        (h1.wrapping_add((i as u64).wrapping_mul(h2)) as usize) % self.num_bits
    }

    fn insert(&mut self, item: &[u8]) {
        let (h1, h2) = self.hashes(item);
        for i in 0..self.num_hashes {
            let slot = self.slot(h1, h2, i);
            self.bits[slot / 64] |= 1 << (slot % 64);
        }
        self.inserted += 1;
    }

    fn contains(&self, item: &[u8]) -> bool {
        let (h1, h2) = self.hashes(item);
        (0..self.num_hashes).all(|i| {
            let slot = self.slot(h1, h2, i);
            self.bits[slot / 64] & (1 << (slot % 64)) != 0
        })
    }

    fn is_full(&self) -> bool {
        self.inserted >= self.capacity
    }
}

/// A chain of growing sub-filters. `contains` checks every sub-filter;
/// `insert` always writes to the newest one, growing the chain when it
/// fills.
pub struct BloomFilter {
    capacity: usize,
    error_rate: f64,
    filters: Vec<SubFilter>,
}

impl BloomFilter {
    pub fn new(initial_capacity: usize, initial_error_rate: f64) -> Self {
        BloomFilter {
            capacity: initial_capacity,
            error_rate: initial_error_rate,
            filters: vec![SubFilter::new(initial_capacity, initial_error_rate)],
        }
    }

    pub fn contains(&self, item: impl Hash) -> bool {
        let bytes = hash_to_bytes(&item);
        self.filters.iter().any(|f| f.contains(&bytes))
    }

    pub fn insert(&mut self, item: impl Hash) {
        let bytes = hash_to_bytes(&item);
        if self.filters.last().map(|f| f.is_full()).unwrap_or(true) {
            self.capacity *= 4;
            self.error_rate *= 0.9;
            self.filters.push(SubFilter::new(self.capacity, self.error_rate));
        }
        self.filters.last_mut().unwrap().insert(&bytes);
    }

    /// Inserts `item` and reports whether it was already (probably)
    /// present, mirroring the check-then-insert pattern the generator
    /// catalog's `unique` wrapper performs on every candidate value.
    pub fn check_and_insert(&mut self, item: impl Hash) -> bool {
        let already_present = self.contains(&item);
        self.insert(item);
        already_present
    }
}

fn hash_to_bytes(item: &impl Hash) -> Vec<u8> {
    let mut hasher = DefaultHasher::new();
    item.hash(&mut hasher);
    hasher.finish().to_le_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_false_negative() {
        let mut bloom = BloomFilter::new(16, 0.01);
        for i in 0..1000i64 {
            bloom.insert(i);
        }
        for i in 0..1000i64 {
            assert!(bloom.contains(i), "missing {i}");
        }
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut bloom = BloomFilter::new(4, 0.1);
        for i in 0..100i64 {
            bloom.insert(i);
        }
        assert!(bloom.filters.len() > 1);
        for i in 0..100i64 {
            assert!(bloom.contains(i));
        }
    }

    #[test]
    fn check_and_insert_reports_existing() {
        let mut bloom = BloomFilter::new(16, 0.01);
        assert!(!bloom.check_and_insert("alice@example.com"));
        assert!(bloom.check_and_insert("alice@example.com"));
    }
}
