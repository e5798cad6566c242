use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::{Rating, RatingStore, Result};

/// In-memory [`RatingStore`] with one mutex per laptop.
///
/// The map lock is only taken to look up (or create) a laptop's slot; the
/// read-modify-write itself runs under that slot's mutex, so updates to
/// different laptops do not contend. Poisoned locks are recovered, as in
/// [`MemLaptopStore`](crate::engine::MemLaptopStore).
#[derive(Default)]
pub struct MemRatingStore {
    data: RwLock<HashMap<String, Arc<Mutex<Rating>>>>,
}

impl MemRatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, laptop_id: &str) -> Arc<Mutex<Rating>> {
        {
            let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = data.get(laptop_id) {
                return slot.clone();
            }
        }

        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.entry(laptop_id.to_string()).or_default().clone()
    }
}

impl RatingStore for MemRatingStore {
    fn add(&self, laptop_id: &str, score: f64) -> Result<Rating> {
        let slot = self.slot(laptop_id);
        let mut rating = slot.lock().unwrap_or_else(PoisonError::into_inner);
        rating.count += 1;
        rating.sum += score;
        Ok(*rating)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_add_accumulates() {
        let store = MemRatingStore::new();
        let scores = [8.0, 7.5, 10.0];
        let averages = [8.0, 7.75, 8.5];
        for (i, score) in scores.iter().enumerate() {
            let rating = store.add("l1", *score).unwrap();
            assert_eq!(rating.count, i as u32 + 1);
            assert!((rating.average().unwrap() - averages[i]).abs() < 1e-9);
        }

        assert_eq!(store.add("l2", 4.0).unwrap(), Rating { count: 1, sum: 4.0 });
    }

    #[test]
    fn test_concurrent_adds_are_serialized() {
        let store = Arc::new(MemRatingStore::new());
        let n = 10;
        let score = 5.0;

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.add("laptop", score).unwrap())
            })
            .collect();

        let mut counts = HashSet::new();
        for handle in handles {
            let rating = handle.join().unwrap();
            assert!((rating.sum - rating.count as f64 * score).abs() < 1e-9);
            counts.insert(rating.count);
        }

        assert_eq!(counts, (1..=n).collect::<HashSet<u32>>());
    }

    #[test]
    fn test_laptops_are_rated_independently() {
        let store = MemRatingStore::new();
        store.add("a", 1.0).unwrap();
        store.add("a", 3.0).unwrap();
        let b = store.add("b", 10.0).unwrap();

        assert_eq!(b, Rating { count: 1, sum: 10.0 });
        assert_eq!(store.add("a", 5.0).unwrap().average(), Some(3.0));
    }

    #[test]
    fn test_poisoned_slot_is_recovered() {
        let store = Arc::new(MemRatingStore::new());
        store.add("a", 2.0).unwrap();

        let slot = store.slot("a");
        let _ = thread::spawn(move || {
            let _guard = slot.lock().unwrap();
            panic!("poison the slot");
        })
        .join();

        assert_eq!(store.add("a", 4.0).unwrap(), Rating { count: 2, sum: 6.0 });
    }
}
