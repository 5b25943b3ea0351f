//! C3: the active-test table. Holds Bob- and Charlie-role records (an
//! Alice-role record is kept separately by the coordinator as
//! `current_test`, since a node drives at most one local test at a time)
//! keyed by nonce, bounded, with eviction driven by the `RemoveTest` timer
//! rather than by this table itself.
use std::collections::HashMap;

use crate::nonce::Nonce;
use crate::record::TestRecord;

#[derive(Debug)]
pub struct ActiveTests {
    cap: usize,
    records: HashMap<Nonce, TestRecord>,
}

impl ActiveTests {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            records: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.cap
    }

    pub fn get(&self, nonce: Nonce) -> Option<&TestRecord> {
        self.records.get(&nonce)
    }

    /// Inserts or overwrites the record for `record.nonce`. Refuses a
    /// genuinely new nonce once the table is at capacity; an update to an
    /// already-tracked nonce always succeeds.
    pub fn insert(&mut self, record: TestRecord) -> bool {
        if !self.records.contains_key(&record.nonce) && self.is_full() {
            return false;
        }
        self.records.insert(record.nonce, record);
        true
    }

    pub fn remove(&mut self, nonce: Nonce) -> Option<TestRecord> {
        self.records.remove(&nonce)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::LocalTime;

    #[test]
    fn refuses_new_entries_past_capacity() {
        let mut table = ActiveTests::new(1);
        let now = LocalTime::default();

        assert!(table.insert(TestRecord::new_bob(1, now)));
        assert!(!table.insert(TestRecord::new_bob(2, now)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn updating_an_existing_nonce_is_never_refused() {
        let mut table = ActiveTests::new(1);
        let now = LocalTime::default();
        table.insert(TestRecord::new_bob(1, now));

        let mut updated = TestRecord::new_bob(1, now);
        updated.packets_relayed = 3;
        assert!(table.insert(updated));
        assert_eq!(table.get(1).unwrap().packets_relayed, 3);
    }

    #[test]
    fn remove_drops_the_record() {
        let mut table = ActiveTests::new(4);
        let now = LocalTime::default();
        table.insert(TestRecord::new_charlie(9, now));

        assert!(table.remove(9).is_some());
        assert!(table.get(9).is_none());
        assert!(table.remove(9).is_none());
    }

    /// However many inserts arrive, the table never grows past its
    /// configured capacity.
    #[test]
    fn never_exceeds_capacity() {
        fn property(cap: u8, nonces: Vec<u32>) -> bool {
            let cap = cap as usize % 32;
            let mut table = ActiveTests::new(cap);
            let now = LocalTime::default();
            for nonce in nonces {
                table.insert(TestRecord::new_bob(nonce, now));
                if table.len() > cap {
                    return false;
                }
            }
            true
        }
        quickcheck::QuickCheck::new()
            .gen(quickcheck::Gen::new(32))
            .quickcheck(property as fn(u8, Vec<u32>) -> bool);
    }
}
