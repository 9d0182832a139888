//! Time-driven reconciliation jobs. Each `run_once` is a stateless batch poll; the caller owns
//! the cadence. A run stops at the first per-item failure and the next run picks up the rest.

mod auto_approve;
mod view_lock;

pub use auto_approve::{AutoApproveJob, AUTO_APPROVE_AFTER_HOURS, AUTO_APPROVE_REASON};
pub use view_lock::{ViewLockJob, DEFAULT_PLATFORM_FEE_RATE, VIEW_LOCK_REASON};

pub const DEFAULT_WORKER_BATCH_SIZE: usize = 100;
pub(crate) const SYSTEM_ACTOR: &str = "system";

pub(crate) fn resolve_batch_size(batch_size: usize) -> usize {
    if batch_size == 0 {
        DEFAULT_WORKER_BATCH_SIZE
    } else {
        batch_size
    }
}
