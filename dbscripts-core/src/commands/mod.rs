//! Command implementations: list, reorder, consolidate, orphans,
//! unreachable, check.

pub mod check;
pub mod consolidate;
pub mod list;
pub mod orphans;
pub mod reorder;
pub mod unreachable;
