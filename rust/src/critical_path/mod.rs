//! Critical path calculation.
//!
//! A forward pass over the topologically ordered, cycle-free part of the graph
//! gives early dates; a backward pass from the project end gives late dates.
//! Tasks whose early and late starts coincide form the critical path.

mod calculation;
mod types;

pub use calculation::calculate_critical_path;
pub use types::{get_critical_task_ids, CriticalPathEntry, CriticalPathResult};
