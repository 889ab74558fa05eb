//! Flush planning
//!
//! `plan_flush` turns the persistence context into an ordered `FlushPlan`;
//! an executor (see `graft-store`) applies it inside one transaction and
//! `complete_flush` then resynchronizes the context.

pub mod plan;
pub mod planner;

pub use crate::orphan::OrphanDelete;
pub use plan::{FlushPlan, LinkRow, RowWrite};
pub use planner::{complete_flush, plan_flush};
