use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::pb::{Filter, Laptop};
use crate::{Error, LaptopStore, Result};

/// In-memory [`LaptopStore`].
///
/// Searches walk a snapshot of the keys taken when the scan starts, so laptops
/// saved during a scan are not visited. The map lock is only held to read a
/// single entry, never while emitting. Every map update is a single insert, so
/// a poisoned lock still guards a consistent map and is recovered.
pub struct MemLaptopStore {
    data: RwLock<HashMap<String, Laptop>>,
    search_delay: Duration,
}

impl MemLaptopStore {
    pub fn new() -> Self {
        Self::with_search_delay(Duration::ZERO)
    }

    /// Creates a store that sleeps `search_delay` before examining each entry
    /// during a search, to simulate expensive matching.
    pub fn with_search_delay(search_delay: Duration) -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            search_delay,
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> Vec<String> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.keys().cloned().collect()
    }
}

impl Default for MemLaptopStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LaptopStore for MemLaptopStore {
    fn save(&self, laptop: &Laptop) -> Result<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        if data.contains_key(&laptop.id) {
            return Err(Error::AlreadyExists);
        }
        data.insert(laptop.id.clone(), laptop.clone());
        Ok(())
    }

    fn find(&self, id: &str) -> Option<Laptop> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        data.get(id).cloned()
    }

    fn search(
        &self,
        token: &CancellationToken,
        filter: &Filter,
        emit: &mut dyn FnMut(Laptop) -> Result<()>,
    ) -> Result<()> {
        for id in self.keys() {
            if !self.search_delay.is_zero() {
                std::thread::sleep(self.search_delay);
            }
            if token.is_cancelled() {
                info!("context is cancelled");
                return Err(Error::Cancelled);
            }

            let Some(laptop) = self.find(&id) else {
                continue;
            };
            if is_qualified(filter, &laptop) {
                debug!("laptop {} matches the filter", id);
                emit(laptop)?;
            }
        }
        Ok(())
    }
}

/// Checks a laptop against every clause of the filter.
///
/// The CPU clause compares the laptop's minimum frequency, not its maximum.
pub fn is_qualified(filter: &Filter, laptop: &Laptop) -> bool {
    if let Some(max_price) = filter.max_price_usd {
        if laptop.price_usd > max_price {
            return false;
        }
    }

    let cpu = laptop.cpu.clone().unwrap_or_default();
    if cpu.number_cores < filter.min_cpu_cores {
        return false;
    }
    if cpu.min_ghz < filter.min_cpu_ghz {
        return false;
    }

    let ram_bits = laptop.ram.as_ref().map_or(0, |m| m.to_bits());
    let min_ram_bits = filter.min_ram.as_ref().map_or(0, |m| m.to_bits());
    ram_bits >= min_ram_bits
}
