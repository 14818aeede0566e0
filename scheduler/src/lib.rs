//! Background workers
//!
//! Two long-running tasks share the entity table: the inventory refresher
//! (full-record writer, owns slot rendering) and the health prober (health
//! writer). Each runs a `select!` loop with the same priorities: stop, the
//! debounce tick that picks up settings changes, an on-demand request, and
//! the interval timer.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};

pub mod prober;
pub mod refresher;

pub use prober::{HealthProbe, ProbeHandle};
pub use refresher::{InventoryRefresher, RefresherHandle};

/// How often pending settings notifications are picked up
pub const DEBOUNCE_TICK: Duration = Duration::from_millis(800);

/// Deadline for the next timer fire, `None` when the timer is disabled
fn arm(period: Option<Duration>) -> Option<Instant> {
    period.map(|period| Instant::now() + period)
}

/// Wait for `deadline`; never completes when there is none
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
