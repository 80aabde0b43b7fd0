// kernel/src/task/mod.rs
//! Task and shared-memory subsystem: task lifecycle and state machine,
//! the blocker/suspend framework, reference-counted shared memory, per-task
//! cwd, and the background reaper.

pub mod atomic;
pub mod blocker;
pub mod context_switch;
pub mod cwd;
pub mod error;
pub mod path;
pub mod reaper;
pub mod registry;
pub mod scheduler;
pub mod shared_memory;
pub mod task_structs;

pub use error::TaskResult;
pub use task_structs::{Handle, HandleTable, Task, TaskContext, TaskId, TaskState};

use crate::serial_println;

fn idle_task_entry(_arg: u64) -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

/// Brings up the task subsystem: registers the bootstrap task (the context
/// the kernel is already executing on), then creates the idle task (HANG,
/// scheduled only when nothing else is runnable) and the reaper task, in
/// that order.
pub fn init() {
    scheduler::init();

    let idle_id = {
        let _atomic = atomic::enter();
        registry::create("idle", false, None).expect("failed to create idle task")
    };
    registry::with_task_mut(idle_id, |task| {
        task.set_entry(x86_64::VirtAddr::new(idle_task_entry as u64));
    });
    registry::go(idle_id).expect("failed to dispatch idle task");
    registry::set_hang(idle_id).expect("failed to mark idle task HANG");
    serial_println!("Task: idle task {:?} ready", idle_id);

    let reaper_id = registry::spawn("reaper", reaper::reaper_main, 0, false)
        .expect("failed to spawn reaper task");
    registry::go(reaper_id).expect("failed to dispatch reaper task");
    serial_println!("Task: reaper task {:?} ready", reaper_id);

    serial_println!("Task: subsystem initialized, {} task(s) registered", registry::count());
}
