// kernel/src/task/scheduler.rs
//! Ready queue and the scheduler-facing half of the state-machine contract:
//! `did_create_idle_task`, `did_create_running_task`, `did_change_task_state`,
//! `running`/`running_id`, `yield_now`, plus the tick hook that polls
//! blocked tasks (`poll_blocked`).
//!
//! Task-state transitions themselves (`go`, `cancel`, `destroy`, ...) live in
//! `task::registry`; this module only ever reads state and drives context
//! switches.

use alloc::collections::VecDeque;
use lazy_static::lazy_static;
use spin::Mutex;

use crate::serial_println;
use crate::task::context_switch;
use crate::task::task_structs::{TaskId, TaskState};
use crate::task::{blocker, registry};

lazy_static! {
    /// Tasks that are RUNNING and waiting for their turn (the currently
    /// executing task is not in this queue).
    static ref READY_QUEUE: Mutex<VecDeque<TaskId>> = Mutex::new(VecDeque::new());
    static ref CURRENT: Mutex<Option<TaskId>> = Mutex::new(None);
    static ref IDLE_TASK: Mutex<Option<TaskId>> = Mutex::new(None);
}

/// The task id currently executing, if the scheduler has started.
pub fn running_id() -> Option<TaskId> {
    *CURRENT.lock()
}

/// Bootstraps the scheduler around the already-running execution context the
/// kernel booted on, then creates the idle and reaper tasks. Called once from
/// `task::init`.
pub fn init() {
    serial_println!("Scheduler: Starting initialization");

    let bootstrap_id = registry::register_bootstrap("kernel");
    *CURRENT.lock() = Some(bootstrap_id);
    serial_println!("Scheduler: Registered bootstrap task {:?}", bootstrap_id);
}

/// Records that `id` was just created as the idle (HANG) task.
pub fn did_create_idle_task(id: TaskId) {
    *IDLE_TASK.lock() = Some(id);
}

/// Records that `id` just transitioned into RUNNING and is ready to be
/// scheduled - pushes it onto the ready queue.
pub fn did_create_running_task(id: TaskId) {
    READY_QUEUE.lock().push_back(id);
}

/// Informs the scheduler of an authoritative state transition. This layer
/// only logs/bookkeeps; the task layer has already decided the transition is
/// valid.
pub fn did_change_task_state(id: TaskId, old: TaskState, new: TaskState) {
    serial_println!("Scheduler: task {:?} {:?} -> {:?}", id, old, new);
    if matches!(new, TaskState::Canceled | TaskState::Blocked | TaskState::Hang) {
        READY_QUEUE.lock().retain(|&t| t != id);
    }
}

/// Called from the timer interrupt on every tick: polls every BLOCKED task's
/// blocker, waking those whose predicate fired or whose timeout elapsed.
pub fn poll_blocked(now_tick: u64) {
    for id in registry::ids_in_state(TaskState::Blocked) {
        let ready = registry::with_task(id, |task| {
            let b = match task.blocker() {
                Some(b) => b,
                None => return None,
            };
            if b.can_unblock(task) {
                Some(blocker::BlockerResult::Unblocked)
            } else if b.timeout().is_elapsed(now_tick) {
                Some(blocker::BlockerResult::Timeout)
            } else {
                None
            }
        }).flatten();

        let Some(result) = ready else { continue };

        let _atomic = crate::task::atomic::enter();
        registry::with_task_mut(id, |task| {
            if let Some(mut b) = task.take_blocker() {
                b.on_unblock(task);
                b.set_result(result);
                task.set_blocker(Some(b));
            }
        });
        did_change_task_state(id, TaskState::Blocked, TaskState::Running);
        registry::with_task_mut(id, |task| task.set_state(TaskState::Running));
        did_create_running_task(id);
    }
}

/// Voluntarily gives up the CPU, letting the next ready task run. Returns
/// once this task is scheduled again.
pub fn yield_now() {
    schedule();
}

/// Picks the next ready task and context-switches to it. If no task is
/// ready, falls back to the idle task; if there isn't one yet (still early
/// in boot), just returns to the caller.
pub fn schedule() {
    static IN_PROGRESS: Mutex<()> = Mutex::new(());
    let Some(_guard) = IN_PROGRESS.try_lock() else {
        serial_println!("Scheduler: schedule() re-entered, skipping");
        return;
    };

    let current = match running_id() {
        Some(id) => id,
        None => return, // scheduler not initialized yet
    };

    let next = READY_QUEUE.lock().pop_front().or_else(|| *IDLE_TASK.lock());
    let Some(next) = next else {
        return; // nothing runnable at all (very early boot)
    };
    if next == current {
        return;
    }

    // Re-queue the outgoing task if it's still meant to run later.
    let still_running = registry::with_task(current, |t| t.state() == TaskState::Running).unwrap_or(false);
    if still_running {
        READY_QUEUE.lock().push_back(current);
    }

    *CURRENT.lock() = Some(next);

    // SAFETY: both ids are registered tasks; their contexts stay valid for
    // the duration of the switch because neither is destroyed while RUNNING
    // or BLOCKED (only CANCELED tasks are reclaimed, by the reaper, which
    // never runs concurrently with this switch thanks to the atomic section
    // around state transitions).
    let from_ptr = registry::with_task_mut(current, |t| t.context_mut() as *mut _);
    let to_ptr = registry::with_task(next, |t| t.context() as *const _);

    match (from_ptr, to_ptr) {
        (Some(from_ptr), Some(to_ptr)) => unsafe {
            context_switch::switch_context(from_ptr, to_ptr);
        },
        _ => {
            serial_println!("Scheduler: BUG - missing context for switch, aborting");
        }
    }
}
