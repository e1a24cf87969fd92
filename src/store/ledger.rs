//! In-process inventory ledger.
//!
//! Owns the pooled availability counter for each equipment id. Counters are
//! guarded by one mutex per equipment, so reserves against different
//! equipment never contend while reserves against the same equipment
//! serialize. The outer map lock is only taken to look up or insert entries.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Debug)]
struct LedgerEntry {
    available: i32,
    total: i32,
}

/// Proof of a successful reserve. Consumed by [`InventoryLedger::release`],
/// so a single token cannot release twice.
#[derive(Debug)]
pub struct ReservationToken {
    equipment_id: Uuid,
    quantity: i32,
}

impl ReservationToken {
    pub fn equipment_id(&self) -> Uuid {
        self.equipment_id
    }

    pub fn quantity(&self) -> i32 {
        self.quantity
    }
}

#[derive(Debug, Default)]
pub struct InventoryLedger {
    entries: RwLock<HashMap<Uuid, Arc<Mutex<LedgerEntry>>>>,
}

impl InventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, equipment_id: Uuid) -> AppResult<Arc<Mutex<LedgerEntry>>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AppError::Internal("ledger lock poisoned".to_string()))?;
        entries
            .get(&equipment_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Equipment {} not found", equipment_id)))
    }

    /// Start tracking availability for a new equipment id
    pub fn register(&self, equipment_id: Uuid, total_quantity: i32) -> AppResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| AppError::Internal("ledger lock poisoned".to_string()))?;
        entries.entry(equipment_id).or_insert_with(|| {
            Arc::new(Mutex::new(LedgerEntry {
                available: total_quantity,
                total: total_quantity,
            }))
        });
        Ok(())
    }

    /// Atomically check-and-decrement the pooled counter. Fails without side
    /// effect when fewer than `quantity` units are available.
    pub fn reserve(&self, equipment_id: Uuid, quantity: i32) -> AppResult<ReservationToken> {
        let entry = self.entry(equipment_id)?;
        let mut entry = entry
            .lock()
            .map_err(|_| AppError::Internal("ledger lock poisoned".to_string()))?;

        if quantity > entry.available {
            return Err(AppError::OutOfStock(format!(
                "Requested {} units, only {} available",
                quantity, entry.available
            )));
        }

        entry.available -= quantity;
        Ok(ReservationToken {
            equipment_id,
            quantity,
        })
    }

    /// Release a reservation, consuming its token
    pub fn release(&self, token: ReservationToken) -> AppResult<i32> {
        self.release_quantity(token.equipment_id, token.quantity)
    }

    /// Increment availability by `quantity`, capped at the total so a stray
    /// double release cannot push the counter past capacity.
    pub fn release_quantity(&self, equipment_id: Uuid, quantity: i32) -> AppResult<i32> {
        let entry = self.entry(equipment_id)?;
        let mut entry = entry
            .lock()
            .map_err(|_| AppError::Internal("ledger lock poisoned".to_string()))?;

        entry.available = (entry.available + quantity).min(entry.total);
        Ok(entry.available)
    }

    /// Current availability
    pub fn query(&self, equipment_id: Uuid) -> AppResult<i32> {
        let entry = self.entry(equipment_id)?;
        let entry = entry
            .lock()
            .map_err(|_| AppError::Internal("ledger lock poisoned".to_string()))?;
        Ok(entry.available)
    }

    /// Change the total capacity, shifting availability by the same delta
    /// clamped to `[0, new_total]`. Returns `(available, total)`.
    pub fn resize(&self, equipment_id: Uuid, new_total: i32) -> AppResult<(i32, i32)> {
        let entry = self.entry(equipment_id)?;
        let mut entry = entry
            .lock()
            .map_err(|_| AppError::Internal("ledger lock poisoned".to_string()))?;

        let delta = new_total - entry.total;
        entry.total = new_total;
        entry.available = (entry.available + delta).clamp(0, new_total);
        Ok((entry.available, entry.total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_then_release_round_trips() {
        let ledger = InventoryLedger::new();
        let id = Uuid::new_v4();
        ledger.register(id, 5).unwrap();

        let token = ledger.reserve(id, 3).unwrap();
        assert_eq!(ledger.query(id).unwrap(), 2);

        ledger.release(token).unwrap();
        assert_eq!(ledger.query(id).unwrap(), 5);
    }

    #[test]
    fn release_is_capped_at_total() {
        let ledger = InventoryLedger::new();
        let id = Uuid::new_v4();
        ledger.register(id, 2).unwrap();

        ledger.reserve(id, 2).unwrap();
        assert_eq!(ledger.release_quantity(id, 2).unwrap(), 2);
        // second release of the same quantity is a no-op beyond the first
        assert_eq!(ledger.release_quantity(id, 2).unwrap(), 2);
    }

    #[test]
    fn oversubscription_fails_without_side_effect() {
        let ledger = InventoryLedger::new();
        let id = Uuid::new_v4();
        ledger.register(id, 1).unwrap();

        assert!(matches!(
            ledger.reserve(id, 2),
            Err(AppError::OutOfStock(_))
        ));
        assert_eq!(ledger.query(id).unwrap(), 1);
    }

    #[test]
    fn concurrent_reserves_never_oversubscribe() {
        let ledger = Arc::new(InventoryLedger::new());
        let id = Uuid::new_v4();
        ledger.register(id, 8).unwrap();

        let handles: Vec<_> = (0..9)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.reserve(id, 1).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();

        assert_eq!(successes, 8);
        assert_eq!(ledger.query(id).unwrap(), 0);
    }

    #[test]
    fn resize_clamps_availability() {
        let ledger = InventoryLedger::new();
        let id = Uuid::new_v4();
        ledger.register(id, 5).unwrap();
        ledger.reserve(id, 4).unwrap();

        // shrink below outstanding reservations: available clamps to zero
        assert_eq!(ledger.resize(id, 2).unwrap(), (0, 2));
        // grow again: the delta is credited back
        assert_eq!(ledger.resize(id, 6).unwrap(), (4, 6));
    }

    #[test]
    fn unknown_equipment_is_not_found() {
        let ledger = InventoryLedger::new();
        assert!(matches!(
            ledger.reserve(Uuid::new_v4(), 1),
            Err(AppError::NotFound(_))
        ));
    }
}
