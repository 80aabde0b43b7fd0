// kernel/src/task/reaper.rs
//! Background task that sweeps CANCELED tasks off the registry.

use crate::serial_println;
use crate::task::blocker;
use crate::task::task_structs::TaskState;
use crate::task::{atomic, registry};

const DEFAULT_INTERVAL_TICKS: i64 = 100;

fn reaper_interval_ticks() -> i64 {
    match crate::config::get("task.reaper_interval_ticks") {
        Some(value) => value.try_as_integer().unwrap_or(DEFAULT_INTERVAL_TICKS),
        None => DEFAULT_INTERVAL_TICKS,
    }
}

/// Entry point run on the dedicated reaper task: sleep for a policy
/// interval, then destroy every CANCELED task, forever.
pub fn reaper_main(_arg: u64) -> ! {
    loop {
        blocker::sleep(reaper_interval_ticks());
        sweep();
    }
}

/// One sweep: under an atomic section, destroy every task in CANCELED.
/// Structural atomicity only - `registry::destroy` itself drops the atomic
/// section before releasing resources (locks, frees) that may take a while.
fn sweep() {
    let canceled = {
        let _atomic = atomic::enter();
        registry::ids_in_state(TaskState::Canceled)
    };

    for id in canceled {
        if let Err(e) = registry::destroy(id) {
            serial_println!("DEBUG: reaper - failed to destroy {:?}: {:?}", id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn sweep_reclaims_canceled_tasks_and_leaves_others() {
        let canceled_id = { let _atomic = atomic::enter(); registry::create("sweep-canceled", false, None).unwrap() };
        registry::cancel(canceled_id, 7).unwrap();
        let running_id = registry::register_bootstrap("sweep-survivor");

        sweep();

        assert!(registry::by_id(canceled_id).is_none());
        assert!(registry::by_id(running_id).is_some());

        registry::cancel(running_id, 0).unwrap();
        registry::destroy(running_id).unwrap();
    }

    #[test_case]
    fn reaper_interval_falls_back_to_default_when_unconfigured() {
        // `config::set_defaults` already registers this key during boot, so
        // this only guards the fallback path if it's ever missing.
        assert!(reaper_interval_ticks() > 0);
    }
}
