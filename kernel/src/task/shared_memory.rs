// kernel/src/task/shared_memory.rs
//! Reference-counted, physical-backed shared memory objects and the virtual
//! mappings tasks use to access them.

use alloc::collections::BTreeMap;
use core::sync::atomic::{AtomicU64, Ordering};
use lazy_static::lazy_static;
use spin::Mutex;
use x86_64::{PhysAddr, VirtAddr};

use crate::errors::{KernelError, TaskError};
use crate::memory::{self, PAGE_SIZE};
use crate::serial_println;
use crate::task::error::TaskResult;
use crate::task::task_structs::TaskId;

fn round_up_to_page(size: usize) -> usize {
    ((size + PAGE_SIZE as usize - 1) / PAGE_SIZE as usize) * PAGE_SIZE as usize
}

/// A unique, monotonically-assigned shared memory object id - the
/// cross-task capability handed out by `get_handle` and consumed by `include`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemoryObjectId(u64);

/// Reference-counted physical-backed object. Created with refcount 1;
/// every mapping increments it; destroyed (and its frames freed) when the
/// count reaches zero.
pub struct MemoryObject {
    id: MemoryObjectId,
    refcount: AtomicU64,
    physical_base: PhysAddr,
    size: usize,
}

impl MemoryObject {
    pub fn id(&self) -> MemoryObjectId { self.id }
    pub fn size(&self) -> usize { self.size }
    pub fn physical_base(&self) -> PhysAddr { self.physical_base }
}

lazy_static! {
    /// The shared-memory registry: the single global lock that protects
    /// registry membership and any refcount decrement that crosses zero.
    static ref OBJECTS: Mutex<BTreeMap<MemoryObjectId, MemoryObject>> = Mutex::new(BTreeMap::new());
}

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// A mapping of a `MemoryObject` into one task's address space. Lifetime is
/// bound to its task (destroyed on task destroy) or to an explicit free.
pub struct MemoryMapping {
    object: MemoryObjectId,
    address: VirtAddr,
    size: usize,
}

impl MemoryMapping {
    pub fn address(&self) -> VirtAddr { self.address }
    pub fn size(&self) -> usize { self.size }
    pub fn object(&self) -> MemoryObjectId { self.object }
}

/// Rounds `size` up to a page, reserves that many contiguous physical pages,
/// and registers a fresh object with refcount 1.
fn memory_object_create(size: usize) -> Result<MemoryObjectId, KernelError> {
    let size = round_up_to_page(size.max(1));
    let n_pages = size / PAGE_SIZE as usize;
    let base = memory::physical_alloc(n_pages).ok_or(KernelError::OutOfMemory)?;

    let id = MemoryObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed));
    let object = MemoryObject { id, refcount: AtomicU64::new(1), physical_base: base, size };
    OBJECTS.lock().insert(id, object);
    Ok(id)
}

/// Increments an object's refcount. Used when handing out an extra reference
/// (e.g. from `by_id`) before the caller installs a mapping.
fn object_ref(id: MemoryObjectId) {
    if let Some(obj) = OBJECTS.lock().get(&id) {
        obj.refcount.fetch_add(1, Ordering::SeqCst);
    }
}

/// Decrements an object's refcount; the decrement that drives it to zero
/// removes it from the registry and frees its frames, all under the
/// registry lock so a concurrent `by_id` cannot resurrect it.
fn object_deref(id: MemoryObjectId) {
    let mut objects = OBJECTS.lock();
    let Some(obj) = objects.get(&id) else { return };
    if obj.refcount.fetch_sub(1, Ordering::SeqCst) == 1 {
        let obj = objects.remove(&id).expect("object present under lock");
        memory::physical_free(obj.physical_base, obj.size / PAGE_SIZE as usize);
        serial_println!("DEBUG: shared_memory - object {:?} destroyed", id);
    }
}

/// Looks up an object by id and hands the caller an extra reference,
/// atomically under the registry lock.
fn memory_object_by_id(id: MemoryObjectId) -> Option<()> {
    let objects = OBJECTS.lock();
    let obj = objects.get(&id)?;
    obj.refcount.fetch_add(1, Ordering::SeqCst);
    Some(())
}

fn task_memory_mapping_create(task_id: TaskId, object_id: MemoryObjectId, address: VirtAddr) -> Result<(), KernelError> {
    let (phys, size) = {
        let objects = OBJECTS.lock();
        let obj = objects.get(&object_id).ok_or(KernelError::TaskError(TaskError::BadAddress))?;
        (obj.physical_base, obj.size)
    };

    memory::virtual_alloc(memory::kernel_space(), address, phys, size / PAGE_SIZE as usize, true)?;

    crate::task::registry::with_task_mut(task_id, |task| {
        task.memory_mappings_mut().push(MemoryMapping { object: object_id, address, size });
    }).ok_or(KernelError::TaskError(TaskError::NoSuchTask))?;

    Ok(())
}

/// Unmaps the virtual range, derefs the object, and removes the mapping from
/// whichever task owned it. Called both for an explicit `free` and during
/// task destruction (where the mapping has already been removed from the
/// task's list by the caller).
pub fn destroy_mapping(mapping: MemoryMapping) {
    memory::virtual_free(memory::kernel_space(), mapping.address, mapping.size / PAGE_SIZE as usize);
    object_deref(mapping.object);
}

/// Creates a shared object, maps it into `task_id`, and drops the creator's
/// implicit reference so the new mapping is the object's sole owner.
pub fn shared_memory_alloc(task_id: TaskId, size: usize, address: VirtAddr) -> TaskResult<(usize, MemoryObjectId)> {
    let object_id = memory_object_create(size)?;
    let mapping_size = OBJECTS.lock().get(&object_id).map(|o| o.size).unwrap_or(size);
    task_memory_mapping_create(task_id, object_id, address)?;
    object_deref(object_id); // mapping now holds the sole reference.
    Ok((mapping_size, object_id))
}

/// Finds the mapping at `address` in `task_id` (exact match) and destroys it.
/// `BadAddress` if no such mapping exists.
pub fn shared_memory_free(task_id: TaskId, address: VirtAddr) -> TaskResult<()> {
    let mapping = crate::task::registry::with_task_mut(task_id, |task| {
        let mappings = task.memory_mappings_mut();
        let index = mappings.iter().position(|m| m.address == address)?;
        Some(mappings.remove(index))
    }).ok_or(KernelError::TaskError(TaskError::NoSuchTask))?;

    let mapping = mapping.ok_or(KernelError::TaskError(TaskError::BadAddress))?;
    destroy_mapping(mapping);
    Ok(())
}

/// Looks up `id`, maps it into `task_id`, and drops the extra reference
/// obtained from the lookup (the new mapping keeps its own).
pub fn shared_memory_include(task_id: TaskId, id: MemoryObjectId, address: VirtAddr) -> TaskResult<usize> {
    memory_object_by_id(id).ok_or(KernelError::TaskError(TaskError::BadAddress))?;
    let size = OBJECTS.lock().get(&id).map(|o| o.size).ok_or(KernelError::TaskError(TaskError::BadAddress))?;
    task_memory_mapping_create(task_id, id, address)?;
    object_deref(id); // drop the lookup's extra reference.
    Ok(size)
}

/// Finds the mapping at `address` in `task_id` and returns its object id -
/// the cross-task capability another task can pass to `include`.
pub fn shared_memory_get_handle(task_id: TaskId, address: VirtAddr) -> TaskResult<MemoryObjectId> {
    crate::task::registry::with_task(task_id, |task| {
        task.memory_mappings().iter().find(|m| m.address == address).map(|m| m.object())
    })
    .flatten()
    .ok_or(KernelError::TaskError(TaskError::BadAddress))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_case]
    fn round_up_to_page_is_exact_on_page_boundaries() {
        assert_eq!(round_up_to_page(PAGE_SIZE as usize), PAGE_SIZE as usize);
        assert_eq!(round_up_to_page(1), PAGE_SIZE as usize);
        assert_eq!(round_up_to_page(PAGE_SIZE as usize + 1), 2 * PAGE_SIZE as usize);
    }

    #[test_case]
    fn object_create_and_deref_to_zero_frees_and_forgets_it() {
        let id = memory_object_create(1).expect("allocation should succeed");
        assert!(OBJECTS.lock().contains_key(&id));
        object_deref(id);
        assert!(!OBJECTS.lock().contains_key(&id));
    }

    #[test_case]
    fn by_id_adds_a_reference_that_must_be_dropped_separately() {
        let id = memory_object_create(1).expect("allocation should succeed");
        memory_object_by_id(id).expect("object should still be registered");
        // Two references now outstanding (creation + lookup); one deref
        // must leave the object alive.
        object_deref(id);
        assert!(OBJECTS.lock().contains_key(&id));
        object_deref(id);
        assert!(!OBJECTS.lock().contains_key(&id));
    }
}
