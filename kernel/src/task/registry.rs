// kernel/src/task/registry.rs
//! Global table of live tasks. Append on create, remove on destroy; iterated
//! by the reaper and scheduler.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use lazy_static::lazy_static;
use spin::Mutex;
use x86_64::VirtAddr;

use crate::errors::{KernelError, TaskError};
use crate::serial_println;
use crate::task::error::TaskResult;
use crate::task::task_structs::{Task, TaskId, TaskState, MAX_ARGC};

lazy_static! {
    static ref TASKS: Mutex<BTreeMap<TaskId, Task>> = Mutex::new(BTreeMap::new());
}

/// Cheap read-only copy of the handful of fields callers need without
/// borrowing the registry's lock across other work.
pub struct TaskSnapshot {
    state: TaskState,
    exit_value: i32,
}

impl TaskSnapshot {
    pub fn state(&self) -> TaskState { self.state }
    pub fn exit_value(&self) -> i32 { self.exit_value }
}

/// Looks up a task and runs `f` against an immutable reference while the
/// registry lock is held.
pub fn with_task<R>(id: TaskId, f: impl FnOnce(&Task) -> R) -> Option<R> {
    TASKS.lock().get(&id).map(f)
}

/// Looks up a task and runs `f` against a mutable reference while the
/// registry lock is held.
pub fn with_task_mut<R>(id: TaskId, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
    TASKS.lock().get_mut(&id).map(f)
}

/// Snapshot of `state`/`exit_value` for `id`, or `None` if it isn't registered.
pub fn by_id(id: TaskId) -> Option<TaskSnapshot> {
    with_task(id, |t| TaskSnapshot { state: t.state(), exit_value: t.exit_value() })
}

/// Number of tasks currently registered (any state).
pub fn count() -> usize {
    TASKS.lock().len()
}

/// Ids of every registered task whose state matches `state`, for the reaper.
pub fn ids_in_state(state: TaskState) -> Vec<TaskId> {
    TASKS.lock().iter().filter(|(_, t)| t.state() == state).map(|(id, _)| *id).collect()
}

/// Creates a new task and appends it to the registry in state NONE. Must be
/// called inside an atomic section (asserted).
///
/// `parent` is the cwd to inherit; pass `None` to start at `/`.
pub fn create(name: &str, user: bool, parent_cwd: Option<&str>) -> TaskResult<TaskId> {
    debug_assert!(crate::task::atomic::is_atomic(), "task::registry::create called outside an atomic section");

    let id = TaskId::new();
    let cwd = parent_cwd.unwrap_or("/");
    let task = Task::new(id, name, user, cwd)
        .map_err(|_| KernelError::TaskError(TaskError::TaskCreationFailed))?;

    TASKS.lock().insert(id, task);
    serial_println!("DEBUG: task::registry::create - created task {} ({:?})", name, id);
    Ok(id)
}

/// Registers the special bootstrap task representing the already-running
/// execution context the kernel booted on. Used once, by `task::init`.
pub fn register_bootstrap(name: &str) -> TaskId {
    let id = TaskId::new();
    TASKS.lock().insert(id, Task::bootstrap(id, name));
    id
}

/// `create`, then installs `entry` and pushes `arg` as the task's sole
/// initial argument.
///
/// The SysV x86_64 ABI passes the first two integer arguments in `rdi`/`rsi`,
/// not on the stack - `go()` restores the whole saved context including
/// those registers, so installing the argument there (rather than pushing a
/// word the entry function would never look at) is what actually hands it
/// to `entry` as a first parameter.
pub fn spawn(name: &str, entry: fn(u64), arg: u64, user: bool) -> TaskResult<TaskId> {
    let _atomic = crate::task::atomic::enter();
    let parent_cwd = crate::task::scheduler::running_id()
        .and_then(|p| with_task(p, |t| t.cwd_lock().lock().clone()));
    let id = create(name, user, parent_cwd.as_deref())?;

    with_task_mut(id, |task| {
        task.set_entry(VirtAddr::new(entry as u64));
        task.context_mut().rdi = arg;
    });
    Ok(id)
}

/// Like `spawn`, but pushes each `argv` string and an array of pointers to
/// them onto the task's stack, bounded by `MAX_ARGC` (extras discarded), and
/// hands `entry` `(argc, argv)` via `rdi`/`rsi`.
pub fn spawn_with_argv(name: &str, entry: fn(u64, u64), argv: &[&str], user: bool) -> TaskResult<TaskId> {
    let _atomic = crate::task::atomic::enter();
    let parent_cwd = crate::task::scheduler::running_id()
        .and_then(|p| with_task(p, |t| t.cwd_lock().lock().clone()));
    let id = create(name, user, parent_cwd.as_deref())?;

    let argv = &argv[..argv.len().min(MAX_ARGC)];

    with_task_mut(id, |task| {
        task.set_entry(VirtAddr::new(entry as u64));
        let mut sp = task.stack_top();
        let mut pointers = Vec::with_capacity(argv.len());

        // Push each string's bytes (NUL-terminated), tracking where it landed.
        for s in argv.iter().rev() {
            let bytes = s.as_bytes();
            sp = VirtAddr::new(sp.as_u64() - (bytes.len() as u64 + 1));
            unsafe {
                let dst = sp.as_mut_ptr::<u8>();
                core::ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
                *dst.add(bytes.len()) = 0;
            }
            pointers.push(sp.as_u64());
        }
        pointers.reverse();

        // Align down to 8 bytes before the pointer array.
        sp = VirtAddr::new(sp.as_u64() & !7);
        for &ptr in pointers.iter().rev() {
            sp = unsafe { task.stack_push_u64(sp, ptr) };
        }
        let argv_ref = sp;

        task.context_mut().rsp = sp.as_u64();
        task.context_mut().rdi = pointers.len() as u64; // argc
        task.context_mut().rsi = argv_ref.as_u64();      // argv
    });
    Ok(id)
}

/// Finalizes the task's initial interrupt-return frame and transitions
/// NONE -> RUNNING. After this the scheduler may pick the task.
pub fn go(id: TaskId) -> TaskResult<()> {
    let _atomic = crate::task::atomic::enter();

    with_task_mut(id, |task| {
        debug_assert_eq!(task.state(), TaskState::None, "go() called on a task already dispatched");
        if let Some(entry) = task.entry() {
            task.context_mut().rip = entry.as_u64();
        }
        task.context_mut().rflags = 0x202;
    }).ok_or(KernelError::TaskError(TaskError::NoSuchTask))?;

    crate::task::scheduler::did_change_task_state(id, TaskState::None, TaskState::Running);
    with_task_mut(id, |task| task.set_state(TaskState::Running));
    crate::task::scheduler::did_create_running_task(id);
    Ok(())
}

/// Transitions a RUNNING task to HANG - reserved for the idle task.
pub fn set_hang(id: TaskId) -> TaskResult<()> {
    let _atomic = crate::task::atomic::enter();
    crate::task::scheduler::did_change_task_state(id, TaskState::Running, TaskState::Hang);
    with_task_mut(id, |task| task.set_state(TaskState::Hang))
        .ok_or(KernelError::TaskError(TaskError::NoSuchTask))?;
    crate::task::scheduler::did_create_idle_task(id);
    Ok(())
}

/// Reclaims a CANCELED task: removes it from the registry, then outside the
/// atomic section frees its resources.
pub fn destroy(id: TaskId) -> TaskResult<()> {
    let task = {
        let _atomic = crate::task::atomic::enter();
        let old_state = with_task(id, |t| t.state()).ok_or(KernelError::TaskError(TaskError::NoSuchTask))?;
        debug_assert_eq!(old_state, TaskState::Canceled, "destroy() called on a task that hasn't been cancelled");
        crate::task::scheduler::did_change_task_state(id, old_state, TaskState::None);
        TASKS.lock().remove(&id).ok_or(KernelError::TaskError(TaskError::NoSuchTask))?
    };

    // Outside the atomic section: release resources that may themselves take locks.
    let is_user = task.is_user();
    let space = task.address_space();
    let mut task = task;
    for mapping in core::mem::take(task.memory_mappings_mut()) {
        crate::task::shared_memory::destroy_mapping(mapping);
    }
    for handle in task.handle_table().lock().close_all() {
        drop(handle); // closes files / drops shared-memory handle refs.
    }
    drop(task.cwd_lock().lock()); // release, nothing to free (owned String drops with task)

    if is_user {
        // A genuinely isolated per-task address space would be torn down
        // here; this kernel only ever hands out the shared kernel space
        // (see DESIGN.md), so there is nothing further to release.
        let _ = space;
    }

    serial_println!("DEBUG: task::registry::destroy - reclaimed task {:?}", id);
    Ok(())
}

/// Marks a RUNNING (or BLOCKED) task CANCELED and records its exit value.
/// Does not free resources - the reaper does that via `destroy`.
pub fn cancel(id: TaskId, exit_value: i32) -> TaskResult<()> {
    let _atomic = crate::task::atomic::enter();
    let old_state = with_task(id, |t| t.state()).ok_or(KernelError::TaskError(TaskError::NoSuchTask))?;
    crate::task::scheduler::did_change_task_state(id, old_state, TaskState::Canceled);
    with_task_mut(id, |task| {
        task.set_state(TaskState::Canceled);
        task.set_exit_value(exit_value);
    });
    Ok(())
}

/// Cancels the currently-running task with `exit_value` and yields to the
/// scheduler. Never returns: the scheduler will never pick this task again
/// once it has observed the CANCELED transition.
pub fn exit(exit_value: i32) -> ! {
    let current = crate::task::scheduler::running_id().expect("exit() called with no running task");
    cancel(current, exit_value).expect("exit() failed to cancel the running task");
    crate::task::scheduler::yield_now();
    unreachable!("exit() resumed after yielding a CANCELED task");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn create_registers_task_in_none_state() {
        let id = { let _atomic = crate::task::atomic::enter(); create("probe-create", false, None).unwrap() };
        assert_eq!(by_id(id).unwrap().state(), TaskState::None);
        let _ = destroy_for_test(id);
    }

    #[test_case]
    fn cancel_then_destroy_removes_task_from_registry() {
        let id = { let _atomic = crate::task::atomic::enter(); create("probe-cancel", false, None).unwrap() };
        cancel(id, 42).unwrap();
        assert_eq!(by_id(id).unwrap().state(), TaskState::Canceled);
        assert_eq!(by_id(id).unwrap().exit_value(), 42);
        destroy(id).unwrap();
        assert!(by_id(id).is_none());
    }

    #[test_case]
    fn by_id_of_unknown_task_is_none() {
        let bogus = TaskId::new();
        assert!(by_id(bogus).is_none());
    }

    /// Best-effort cleanup for tests that create a task but don't drive it
    /// through cancel/destroy themselves.
    fn destroy_for_test(id: TaskId) -> Result<(), KernelError> {
        cancel(id, 0)?;
        destroy(id)
    }
}
