//! Recent-nonce ring. Remembers the last `cap` nonces this node has
//! seen, FIFO, so a straggler belonging to a test we've already finished
//! with can be recognised and dropped quietly instead of starting a new
//! one.
use std::collections::VecDeque;

use crate::nonce::Nonce;

#[derive(Debug)]
pub struct RecentNonces {
    cap: usize,
    nonces: VecDeque<Nonce>,
}

impl RecentNonces {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            nonces: VecDeque::with_capacity(cap),
        }
    }

    pub fn push(&mut self, nonce: Nonce) {
        if self.cap == 0 {
            return;
        }
        if self.nonces.len() >= self.cap {
            self.nonces.pop_front();
        }
        self.nonces.push_back(nonce);
    }

    pub fn contains(&self, nonce: Nonce) -> bool {
        self.nonces.contains(&nonce)
    }

    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn remembers_recent_nonces() {
        let mut ring = RecentNonces::new(2);
        assert!(!ring.contains(1));

        ring.push(1);
        ring.push(2);
        assert!(ring.contains(1));
        assert!(ring.contains(2));
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut ring = RecentNonces::new(2);
        ring.push(1);
        ring.push(2);
        ring.push(3);

        assert!(!ring.contains(1));
        assert!(ring.contains(2));
        assert!(ring.contains(3));
        assert_eq!(ring.len(), 2);
    }

    /// However many nonces are pushed, the ring never grows past its
    /// configured capacity.
    #[test]
    fn never_exceeds_capacity() {
        fn property(cap: u8, nonces: Vec<u32>) -> bool {
            let cap = cap as usize % 64;
            let mut ring = RecentNonces::new(cap);
            for nonce in nonces {
                ring.push(nonce);
                if ring.len() > cap {
                    return false;
                }
            }
            true
        }
        quickcheck::QuickCheck::new()
            .gen(quickcheck::Gen::new(64))
            .quickcheck(property as fn(u8, Vec<u32>) -> bool);
    }
}
