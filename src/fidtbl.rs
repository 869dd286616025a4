//! Client-side fid table: a fixed-capacity, open-addressed map from a
//! wire `fid[4]` to the [`crate::fcall::Fid`] state the session tracks
//! for it (its last-seen `qid`, sequential offset, and `iounit`).
//!
//! The slot for a fid is `fid % capacity`, probed linearly on collision.
//! Fid `0` is reserved and never assigned, so a slot is free exactly
//! when its stored fid is `0` — a freshly zeroed table reads as empty
//! without a separate occupancy bitmap.

use rand::Rng;

use crate::error::{Error, Result};
use crate::fcall::{Fid, Qid, ROOTFID};

/// Fixed-capacity, open-addressed table of in-flight fids.
pub struct FidTable {
    slots: Vec<Option<Fid>>,
    capacity: usize,
}

impl FidTable {
    pub fn new(capacity: usize) -> Self {
        FidTable {
            slots: vec![None; capacity],
            capacity,
        }
    }

    fn index_of(&self, fid: u32) -> usize {
        fid as usize % self.capacity
    }

    /// Insert a freshly attached/walked/created fid.
    ///
    /// Probes linearly from `fid % capacity` for an empty slot, wrapping
    /// around the table once. Fails with [`Error::TableFull`] if every
    /// slot is occupied.
    pub fn add(&mut self, fid: u32, qid: Qid, iounit: u32) -> Result<Fid> {
        let start = self.index_of(fid);
        for probe in 0..self.capacity {
            let i = (start + probe) % self.capacity;
            if self.slots[i].is_none() {
                let entry = Fid {
                    fid,
                    qid,
                    off: 0,
                    iounit,
                };
                self.slots[i] = Some(entry);
                return Ok(entry);
            }
        }
        Err(Error::TableFull)
    }

    /// Look up the current state of `fid`.
    ///
    /// Probes the full `0..capacity` cycle rather than stopping at the
    /// first empty slot: `remove` leaves no tombstone, so a deleted slot
    /// partway through another fid's probe chain must not hide that
    /// still-live fid further along the chain.
    pub fn get(&self, fid: u32) -> Result<Fid> {
        let start = self.index_of(fid);
        for probe in 0..self.capacity {
            let i = (start + probe) % self.capacity;
            if let Some(entry) = self.slots[i] {
                if entry.fid == fid {
                    return Ok(entry);
                }
            }
        }
        Err(Error::BadFid)
    }

    /// Overwrite the stored state for `fid` (used after `open`/`read`/
    /// `write` update `qid`, `off`, or `iounit`).
    ///
    /// Probes the full `0..capacity` cycle; see [`FidTable::get`].
    pub fn update(&mut self, updated: Fid) -> Result<()> {
        let start = self.index_of(updated.fid);
        for probe in 0..self.capacity {
            let i = (start + probe) % self.capacity;
            if let Some(entry) = self.slots[i] {
                if entry.fid == updated.fid {
                    self.slots[i] = Some(updated);
                    return Ok(());
                }
            }
        }
        Err(Error::BadFid)
    }

    /// Remove `fid` from the table (`clunk`/`remove`). Refuses to delete
    /// [`ROOTFID`]: the root fid is owned by the session for the
    /// lifetime of the attach, not by individual callers.
    ///
    /// Probes the full `0..capacity` cycle; see [`FidTable::get`].
    pub fn remove(&mut self, fid: u32) -> Result<Fid> {
        if fid == ROOTFID {
            return Err(Error::BadFid);
        }
        let start = self.index_of(fid);
        for probe in 0..self.capacity {
            let i = (start + probe) % self.capacity;
            if let Some(entry) = self.slots[i] {
                if entry.fid == fid {
                    self.slots[i] = None;
                    return Ok(entry);
                }
            }
        }
        Err(Error::BadFid)
    }

    /// Draw a fresh, currently-unused fid at random, retrying up to
    /// `capacity` times before giving up with [`Error::TableFull`].
    ///
    /// Mirrors `newfid()`'s retry loop; `0` and [`ROOTFID`] are never
    /// drawn since they are reserved.
    pub fn fresh_fid<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<u32> {
        for _ in 0..self.capacity {
            let candidate = rng.random_range(1..=u32::MAX);
            if candidate == ROOTFID {
                continue;
            }
            if self.get(candidate).is_err() {
                return Ok(candidate);
            }
        }
        Err(Error::TableFull)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fcall::QidType;

    fn qid(path: u64) -> Qid {
        Qid {
            typ: QidType::FILE,
            version: 0,
            path,
        }
    }

    #[test]
    fn add_then_get_round_trips() {
        let mut tbl = FidTable::new(8);
        tbl.add(5, qid(1), 8192).unwrap();
        let entry = tbl.get(5).unwrap();
        assert_eq!(entry.id(), 5);
        assert_eq!(entry.qid(), qid(1));
    }

    #[test]
    fn get_missing_fid_is_bad_fid() {
        let tbl = FidTable::new(8);
        assert!(matches!(tbl.get(5), Err(Error::BadFid)));
    }

    #[test]
    fn collision_probes_linearly() {
        let mut tbl = FidTable::new(4);
        tbl.add(1, qid(1), 0).unwrap();
        // 5 % 4 == 1, collides with fid 1's slot, must probe forward.
        tbl.add(5, qid(2), 0).unwrap();
        assert_eq!(tbl.get(1).unwrap().qid(), qid(1));
        assert_eq!(tbl.get(5).unwrap().qid(), qid(2));
    }

    #[test]
    fn table_full_when_every_slot_occupied() {
        let mut tbl = FidTable::new(2);
        tbl.add(1, qid(1), 0).unwrap();
        tbl.add(2, qid(2), 0).unwrap();
        assert!(matches!(tbl.add(3, qid(3), 0), Err(Error::TableFull)));
    }

    #[test]
    fn remove_frees_the_slot_for_reuse() {
        let mut tbl = FidTable::new(2);
        tbl.add(1, qid(1), 0).unwrap();
        tbl.remove(1).unwrap();
        assert!(tbl.get(1).is_err());
        tbl.add(1, qid(9), 0).unwrap();
        assert_eq!(tbl.get(1).unwrap().qid(), qid(9));
    }

    #[test]
    fn get_finds_fid_past_a_removed_slot_in_its_probe_chain() {
        let mut tbl = FidTable::new(4);
        tbl.add(1, qid(1), 0).unwrap();
        // 5 % 4 == 1, collides with fid 1's slot and probes forward to
        // the next one.
        tbl.add(5, qid(2), 0).unwrap();
        tbl.remove(1).unwrap();
        assert_eq!(tbl.get(5).unwrap().qid(), qid(2));
    }

    #[test]
    fn remove_refuses_rootfid() {
        let mut tbl = FidTable::new(4);
        tbl.add(ROOTFID, qid(1), 0).unwrap();
        assert!(matches!(tbl.remove(ROOTFID), Err(Error::BadFid)));
        assert!(tbl.get(ROOTFID).is_ok());
    }

    #[test]
    fn update_overwrites_existing_entry() {
        let mut tbl = FidTable::new(4);
        let entry = tbl.add(3, qid(1), 100).unwrap();
        let mut updated = entry;
        updated.off = 42;
        tbl.update(updated).unwrap();
        assert_eq!(tbl.get(3).unwrap().offset(), 42);
    }

    #[test]
    fn fresh_fid_avoids_occupied_slots_and_rootfid() {
        use rand::SeedableRng;

        let mut tbl = FidTable::new(16);
        tbl.add(ROOTFID, qid(1), 0).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let candidate = tbl.fresh_fid(&mut rng).unwrap();
        assert_ne!(candidate, ROOTFID);
        assert!(tbl.get(candidate).is_err());
    }
}
