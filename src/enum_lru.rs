//! Optional string-enum dictionary.
//!
//! When enabled, repeated string values are replaced by small indexes into a
//! shared table. A string earns its index only after `min_freq` sightings; the
//! sighting that admits it is still written literally, which is what lets the
//! decoder admit the same string at the same point in the stream. Once the
//! table is full the least-recently-used entry is evicted and its slot index
//! is reused by the next admission. Recency is updated on every encoder-side
//! `add` and every decoder-side `get`, so both sides age entries identically.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Smallest allowed enum table size.
pub const MIN_LRU_SIZE: usize = 32;
/// Largest allowed enum table size; indexes must fit the 2-byte reference form.
pub const MAX_LRU_SIZE: usize = 65536;

/// Configuration for the string-enum dictionary, negotiated on the wire by the
/// enum-config marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumConfig {
    lru_size: usize,
    min_freq: u32,
}

impl EnumConfig {
    /// Build a config. `lru_size` must be a power of two in
    /// [`MIN_LRU_SIZE`]`..=`[`MAX_LRU_SIZE`]; `min_freq` must be in `1..=256`.
    pub fn new(lru_size: usize, min_freq: u32) -> Result<Self> {
        if !lru_size.is_power_of_two() || !(MIN_LRU_SIZE..=MAX_LRU_SIZE).contains(&lru_size) {
            return Err(Error::BadEncode(format!(
                "enum lru_size must be a power of two in {}..={}, got {}",
                MIN_LRU_SIZE, MAX_LRU_SIZE, lru_size
            )));
        }
        if !(1..=256).contains(&min_freq) {
            return Err(Error::BadEncode(format!(
                "enum min_freq must be in 1..=256, got {}",
                min_freq
            )));
        }
        Ok(Self { lru_size, min_freq })
    }

    pub fn lru_size(&self) -> usize {
        self.lru_size
    }

    pub fn min_freq(&self) -> u32 {
        self.min_freq
    }

    /// The size nibble of the on-wire parameter byte: `log2(lru_size) - 5`.
    pub(crate) fn size_param(&self) -> u8 {
        (self.lru_size.trailing_zeros() - 5) as u8
    }

    /// Rebuild a config from the on-wire parameter bytes.
    pub(crate) fn from_wire(param: u8, min_freq_param: u8) -> Result<Self> {
        if param >> 4 != 0 {
            return Err(Error::InvalidEnumConfig(param));
        }
        let size_bits = param & 0x0f;
        if size_bits > 11 {
            return Err(Error::InvalidEnumConfig(param));
        }
        Ok(Self {
            lru_size: 1 << (5 + size_bits),
            min_freq: min_freq_param as u32 + 1,
        })
    }
}

const NIL: usize = usize::MAX;

struct Slot {
    key: String,
    prev: usize,
    next: usize,
}

/// The shared string table. Encoder and decoder each hold one, built from the
/// same config, and feed it the same sequence of occurrences.
pub(crate) struct EnumLruMapping {
    capacity: usize,
    min_freq: u32,
    index_of: HashMap<String, usize>,
    pending: HashMap<String, u32>,
    slots: Vec<Slot>,
    head: usize,
    tail: usize,
}

impl EnumLruMapping {
    pub fn new(config: EnumConfig) -> Self {
        Self {
            capacity: config.lru_size(),
            min_freq: config.min_freq(),
            index_of: HashMap::new(),
            pending: HashMap::new(),
            slots: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Record one occurrence of `text`. Returns its index if it was admitted
    /// by an earlier occurrence; otherwise counts it toward admission and
    /// returns `None`, meaning the caller must emit the string literally.
    pub fn add(&mut self, text: &str) -> Option<usize> {
        if let Some(&index) = self.index_of.get(text) {
            self.touch(index);
            return Some(index);
        }
        let count = self.pending.entry(text.to_owned()).or_insert(0);
        *count += 1;
        if *count >= self.min_freq {
            self.pending.remove(text);
            self.admit(text);
        }
        None
    }

    /// Resolve a decoded reference. Touches the entry so decoder-side recency
    /// tracks the encoder's.
    pub fn get(&mut self, index: usize) -> Result<&str> {
        if index >= self.slots.len() {
            return Err(Error::BadEncode(format!(
                "enum index {} not in dictionary",
                index
            )));
        }
        self.touch(index);
        Ok(&self.slots[index].key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    fn admit(&mut self, text: &str) {
        let index = if self.slots.len() < self.capacity {
            self.slots.push(Slot {
                key: text.to_owned(),
                prev: NIL,
                next: NIL,
            });
            self.slots.len() - 1
        } else {
            let index = self.tail;
            self.unlink(index);
            let evicted = std::mem::replace(&mut self.slots[index].key, text.to_owned());
            self.index_of.remove(&evicted);
            index
        };
        self.push_front(index);
        self.index_of.insert(text.to_owned(), index);
    }

    fn touch(&mut self, index: usize) {
        if self.head == index {
            return;
        }
        self.unlink(index);
        self.push_front(index);
    }

    fn unlink(&mut self, index: usize) {
        let Slot { prev, next, .. } = self.slots[index];
        if prev != NIL {
            self.slots[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn push_front(&mut self, index: usize) {
        self.slots[index].prev = NIL;
        self.slots[index].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = index;
        } else {
            self.tail = index;
        }
        self.head = index;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_validation() {
        assert!(EnumConfig::new(32, 1).is_ok());
        assert!(EnumConfig::new(65536, 256).is_ok());
        assert!(EnumConfig::new(16, 1).is_err());
        assert!(EnumConfig::new(48, 1).is_err());
        assert!(EnumConfig::new(131072, 1).is_err());
        assert!(EnumConfig::new(32, 0).is_err());
        assert!(EnumConfig::new(32, 257).is_err());
    }

    #[test]
    fn config_wire_params() {
        let config = EnumConfig::new(32, 1).unwrap();
        assert_eq!(config.size_param(), 0);
        let config = EnumConfig::new(256, 4).unwrap();
        assert_eq!(config.size_param(), 3);
        assert_eq!(EnumConfig::from_wire(3, 3).unwrap(), config);
        assert!(matches!(
            EnumConfig::from_wire(0x10, 0),
            Err(Error::InvalidEnumConfig(_))
        ));
        assert!(matches!(
            EnumConfig::from_wire(12, 0),
            Err(Error::InvalidEnumConfig(_))
        ));
    }

    #[test]
    fn admission_gate() {
        let mut lru = EnumLruMapping::new(EnumConfig::new(32, 3).unwrap());
        assert_eq!(lru.add("en"), None);
        assert_eq!(lru.add("en"), None);
        assert_eq!(lru.add("en"), None); // third sighting admits, still literal
        assert_eq!(lru.add("en"), Some(0));
        assert_eq!(lru.add("en"), Some(0));
    }

    #[test]
    fn dense_admission_order() {
        let mut lru = EnumLruMapping::new(EnumConfig::new(32, 1).unwrap());
        lru.add("alpha");
        lru.add("beta");
        lru.add("gamma");
        assert_eq!(lru.add("alpha"), Some(0));
        assert_eq!(lru.add("beta"), Some(1));
        assert_eq!(lru.add("gamma"), Some(2));
    }

    #[test]
    fn eviction_reuses_slot() {
        let mut lru = EnumLruMapping::new(EnumConfig::new(32, 1).unwrap());
        for i in 0..32 {
            lru.add(&format!("s{}", i));
        }
        assert_eq!(lru.len(), 32);
        // "s0" is the least recently used; the newcomer takes its slot
        lru.add("newcomer");
        assert_eq!(lru.len(), 32);
        assert_eq!(lru.add("newcomer"), Some(0));
        // the evicted string lost both its index and its frequency history
        assert_eq!(lru.add("s0"), None);
        assert_eq!(lru.add("s0"), Some(1)); // re-admitted into the next LRU slot ("s1")
    }

    #[test]
    fn get_touches_recency() {
        let mut lru = EnumLruMapping::new(EnumConfig::new(32, 1).unwrap());
        for i in 0..32 {
            lru.add(&format!("s{}", i));
        }
        // reference "s0" the way a decoder would, making "s1" the oldest
        assert_eq!(lru.get(0).unwrap(), "s0");
        lru.add("newcomer");
        assert_eq!(lru.add("newcomer"), Some(1));
        assert_eq!(lru.add("s0"), Some(0));
    }

    #[test]
    fn get_out_of_range() {
        let mut lru = EnumLruMapping::new(EnumConfig::new(32, 1).unwrap());
        assert!(matches!(lru.get(0), Err(Error::BadEncode(_))));
    }
}
