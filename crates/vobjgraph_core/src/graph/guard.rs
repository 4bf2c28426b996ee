//! Cycle and budget guard shared by traversal and deep clone.
//!
//! # Invariants
//! - An id is admitted at most once; later sightings report `Seen`.
//! - Admitted ids never exceed the budget.
//! - Slot numbers are dense and follow admission order.

use crate::model::real_object::RealId;
use std::collections::HashMap;

/// Result of offering an id to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; the id now owns this slot.
    Fresh(usize),
    /// Already admitted earlier at this slot.
    Seen(usize),
    /// Not admitted because the budget is used up.
    Rejected,
}

/// Visited table with a hard node budget.
///
/// Both walks own their guard exclusively, so a single writer is guaranteed
/// by `&mut self`.
#[derive(Debug, Clone)]
pub struct VisitGuard {
    slots: HashMap<RealId, usize>,
    order: Vec<RealId>,
    budget: usize,
    rejected: usize,
}

impl VisitGuard {
    /// Creates a guard admitting at most `budget` ids (minimum 1).
    pub fn new(budget: usize) -> Self {
        let budget = budget.max(1);
        Self {
            slots: HashMap::new(),
            order: Vec::new(),
            budget,
            rejected: 0,
        }
    }

    pub fn admit(&mut self, id: RealId) -> Admission {
        if let Some(slot) = self.slots.get(&id) {
            return Admission::Seen(*slot);
        }
        if self.order.len() >= self.budget {
            self.rejected += 1;
            return Admission::Rejected;
        }
        let slot = self.order.len();
        self.slots.insert(id, slot);
        self.order.push(id);
        Admission::Fresh(slot)
    }

    pub fn slot_of(&self, id: RealId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    pub fn contains(&self, id: RealId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Admitted ids in admission order.
    pub fn admitted(&self) -> &[RealId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Whether any admission was refused for budget reasons.
    pub fn is_truncated(&self) -> bool {
        self.rejected > 0
    }
}
