// kernel/src/task/task_structs.rs
//! Core task types: identity, state, CPU context, handle table and the `Task`
//! object itself.

use alloc::boxed::Box;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Mutex;
use x86_64::VirtAddr;

use crate::memory::AddressSpace;
use crate::task::blocker::Blocker;
use crate::task::shared_memory::MemoryMapping;

/// Process-wide unique task identifier, assigned monotonically and never
/// reused within a boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Reserved id for the idle task, always the first one created.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Task lifecycle state. See the state machine in the task module docs:
/// `NONE -> RUNNING -> {BLOCKED, CANCELED, HANG} -> NONE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not yet dispatched, or fully destroyed. Safe to free.
    None,
    Running,
    Blocked,
    /// Eligible to run only when nothing else is runnable (the idle task).
    Hang,
    /// Terminated; awaiting reaping.
    Canceled,
}

/// Architecture register snapshot used to resume a task. `#[repr(C)]` so the
/// raw-offset assembly in `context_switch.rs` can address fields directly.
#[derive(Debug, Clone)]
#[repr(C)]
pub struct TaskContext {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rsp: u64,
    pub rip: u64,
    pub rflags: u64,
}

impl TaskContext {
    /// Creates a new, mostly-zeroed context. `rip`/`rsp` must be valid; the
    /// rest is filled in by `go()` via `InterruptStackFrame`-style push.
    pub fn new(rip: VirtAddr, rsp: VirtAddr) -> Self {
        TaskContext {
            rax: 0, rbx: 0, rcx: 0, rdx: 0, rsi: 0, rdi: 0, rbp: rsp.as_u64(),
            r8: 0, r9: 0, r10: 0, r11: 0, r12: 0, r13: 0, r14: 0, r15: 0,
            rsp: rsp.as_u64(),
            rip: rip.as_u64(),
            rflags: 0x202, // IF=1, bit 1 always set.
        }
    }
}

pub const DEFAULT_KERNEL_STACK_SIZE: usize = 4096 * 4; // 16 KiB
pub const MAX_HANDLES: usize = 64;
pub const MAX_ARGC: usize = 16;

/// An externally-managed resource a task can refer to by small integer.
pub enum Handle {
    /// An open file (mirrors `fs::fd::FileDescriptor`, generalized to live in
    /// the per-task table instead of the process-wide one).
    File(crate::fs::vfs::FileHandle),
    /// A mapped shared memory object, referenced by its mapping's base address.
    SharedMemory(VirtAddr),
}

/// Fixed-size, per-task table mapping small integers to handles. Guarded by
/// its own lock (never held across a scheduler yield), matching `fs::fd::FdTable`
/// generalized beyond files.
pub struct HandleTable {
    slots: [Option<Handle>; MAX_HANDLES],
}

impl HandleTable {
    pub fn new() -> Self {
        // Option<Handle> isn't Copy, build via Default + array init.
        const NONE: Option<Handle> = None;
        HandleTable { slots: [NONE; MAX_HANDLES] }
    }

    pub fn install(&mut self, handle: Handle) -> Result<usize, crate::errors::KernelError> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(handle);
                return Ok(i);
            }
        }
        Err(crate::errors::KernelError::TaskError(crate::errors::TaskError::HandleTableFull))
    }

    pub fn get(&self, index: usize) -> Option<&Handle> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Handle> {
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn close(&mut self, index: usize) -> Result<Handle, crate::errors::KernelError> {
        let slot = self.slots.get_mut(index)
            .ok_or(crate::errors::KernelError::TaskError(crate::errors::TaskError::InvalidHandle))?;
        slot.take().ok_or(crate::errors::KernelError::TaskError(crate::errors::TaskError::InvalidHandle))
    }

    /// Drains every installed handle, for use during task destruction.
    pub fn close_all(&mut self) -> Vec<Handle> {
        self.slots.iter_mut().filter_map(|slot| slot.take()).collect()
    }
}

/// A single unit of execution. Fields mirror the data model: identity,
/// scheduling state, address space, stack/context, and the per-task resource
/// tables (handles, cwd, shared-memory mappings, blocker, exit value).
pub struct Task {
    id: TaskId,
    name: String,
    state: TaskState,
    address_space: AddressSpace,
    user: bool,
    entry: Option<VirtAddr>,
    kernel_stack: Box<[u8]>,
    context: TaskContext,
    handle_table: Mutex<HandleTable>,
    cwd: Mutex<String>,
    memory_mappings: Vec<MemoryMapping>,
    blocker: Option<Box<dyn Blocker>>,
    exit_value: i32,
}

impl Task {
    /// Allocates a zeroed stack and snapshots an initial (not-yet-runnable)
    /// context. Does not install an entry point or transition past NONE -
    /// that's `go()`'s job. Caller (registry::create) is responsible for the
    /// atomic-section precondition.
    pub fn new(id: TaskId, name: &str, user: bool, parent_cwd: &str) -> Result<Self, &'static str> {
        let mut stack_mem = Vec::new();
        if stack_mem.try_reserve_exact(DEFAULT_KERNEL_STACK_SIZE).is_err() {
            return Err("Failed to reserve memory for kernel stack");
        }
        stack_mem.resize(DEFAULT_KERNEL_STACK_SIZE, 0);
        let kernel_stack = stack_mem.into_boxed_slice();
        let stack_top = VirtAddr::from_ptr(kernel_stack.as_ptr()) + kernel_stack.len() as u64;

        Ok(Task {
            id,
            name: name.to_string(),
            state: TaskState::None,
            address_space: crate::memory::kernel_space(),
            user,
            entry: None,
            kernel_stack,
            context: TaskContext::new(stack_top, stack_top),
            handle_table: Mutex::new(HandleTable::new()),
            cwd: Mutex::new(parent_cwd.to_string()),
            memory_mappings: Vec::new(),
            blocker: None,
            exit_value: 0,
        })
    }

    /// Creates the special task representing the already-running bootstrap
    /// execution context; its real register state is captured on the first
    /// context switch away from it.
    pub fn bootstrap(id: TaskId, name: &str) -> Self {
        let dummy = VirtAddr::new(0);
        Task {
            id,
            name: name.to_string(),
            state: TaskState::Running,
            address_space: crate::memory::kernel_space(),
            user: false,
            entry: None,
            kernel_stack: Box::new([0u8; 8]),
            context: TaskContext::new(dummy, dummy),
            handle_table: Mutex::new(HandleTable::new()),
            cwd: Mutex::new("/".to_string()),
            memory_mappings: Vec::new(),
            blocker: None,
            exit_value: 0,
        }
    }

    pub fn id(&self) -> TaskId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn state(&self) -> TaskState { self.state }
    pub fn set_state(&mut self, new: TaskState) { self.state = new; }
    pub fn is_user(&self) -> bool { self.user }
    pub fn address_space(&self) -> AddressSpace { self.address_space }

    pub fn entry(&self) -> Option<VirtAddr> { self.entry }
    pub fn set_entry(&mut self, entry: VirtAddr) { self.entry = Some(entry); }

    pub fn stack_top(&self) -> VirtAddr {
        VirtAddr::from_ptr(self.kernel_stack.as_ptr()) + self.kernel_stack.len() as u64
    }
    pub fn stack_base(&self) -> VirtAddr {
        VirtAddr::from_ptr(self.kernel_stack.as_ptr())
    }

    pub fn context(&self) -> &TaskContext { &self.context }
    pub fn context_mut(&mut self) -> &mut TaskContext { &mut self.context }

    pub fn handle_table(&self) -> &Mutex<HandleTable> { &self.handle_table }
    pub fn cwd_lock(&self) -> &Mutex<String> { &self.cwd }

    pub fn memory_mappings(&self) -> &[MemoryMapping] { &self.memory_mappings }
    pub fn memory_mappings_mut(&mut self) -> &mut Vec<MemoryMapping> { &mut self.memory_mappings }

    pub fn blocker(&self) -> Option<&dyn Blocker> { self.blocker.as_deref() }
    pub fn set_blocker(&mut self, blocker: Option<Box<dyn Blocker>>) { self.blocker = blocker; }
    pub fn take_blocker(&mut self) -> Option<Box<dyn Blocker>> { self.blocker.take() }

    pub fn exit_value(&self) -> i32 { self.exit_value }
    pub fn set_exit_value(&mut self, v: i32) { self.exit_value = v; }

    /// Pushes a raw value onto this task's stack, growing downward, and
    /// returns the new stack pointer. Used by `spawn`/`spawn_with_argv` to
    /// hand the entry point its initial argument(s) before `go()`.
    pub unsafe fn stack_push_u64(&mut self, sp: VirtAddr, value: u64) -> VirtAddr {
        let new_sp = VirtAddr::new(sp.as_u64() - 8);
        debug_assert!(new_sp >= self.stack_base(), "stack overflow while pushing argument");
        let ptr = new_sp.as_mut_ptr::<u64>();
        ptr.write(value);
        new_sp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn task_ids_are_unique_and_increasing() {
        let a = TaskId::new();
        let b = TaskId::new();
        assert!(b.as_u64() > a.as_u64());
    }

    #[test_case]
    fn handle_table_reuses_closed_slots() {
        let mut table = HandleTable::new();
        let first = table.install(Handle::SharedMemory(VirtAddr::new(0x1000))).unwrap();
        table.close(first).unwrap();
        let second = table.install(Handle::SharedMemory(VirtAddr::new(0x2000))).unwrap();
        assert_eq!(first, second);
    }

    #[test_case]
    fn handle_table_reports_full_when_exhausted() {
        let mut table = HandleTable::new();
        for i in 0..MAX_HANDLES {
            table.install(Handle::SharedMemory(VirtAddr::new(i as u64 * 0x1000))).unwrap();
        }
        assert!(table.install(Handle::SharedMemory(VirtAddr::new(0xdead_0000))).is_err());
    }

    #[test_case]
    fn closing_unused_slot_is_an_error() {
        let mut table = HandleTable::new();
        assert!(table.close(0).is_err());
    }

    #[test_case]
    fn new_task_starts_in_none_state_with_no_entry() {
        let task = Task::new(TaskId::new(), "probe", false, "/").unwrap();
        assert_eq!(task.state(), TaskState::None);
        assert!(task.entry().is_none());
        assert_eq!(task.exit_value(), 0);
    }
}
