// ==========================================
// Allocation repository
// ==========================================
// Data access for the allocations table. No business rules here: the
// single-active invariant lives in the schema (partial unique index) and
// the precondition checks live in the engine.
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::{AllocationRepository, NewAllocation};
pub(crate) use core::{conclude_row, delete_row, has_open_row, insert_row, reopen_row, set_status_row};
