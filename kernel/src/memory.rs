// kernel/src/memory.rs
use x86_64::{
    structures::paging::{PageTable, PhysFrame, Size4KiB, FrameAllocator, OffsetPageTable},
    VirtAddr,
    PhysAddr,
};
use bootloader::bootinfo::{MemoryRegion, MemoryRegionType};
use crate::serial_println;
use alloc::vec::Vec;
use spin::Mutex;
use lazy_static::lazy_static;

pub const PAGE_SIZE: u64 = 4096;

/// Initialize a new OffsetPageTable.
///
/// This function is unsafe because the caller must guarantee that the
/// complete physical memory is mapped to virtual memory at the passed
/// `physical_memory_offset`. Also, this function must be only called once
/// to avoid aliasing `&mut` references (which is undefined behavior).
pub unsafe fn init_page_table(physical_memory_offset: VirtAddr) -> OffsetPageTable<'static> {
    serial_println!("DEBUG: memory: Reading level 4 page table");
    let level_4_table_frame = active_level_4_table(physical_memory_offset);
    serial_println!("DEBUG: memory: Creating OffsetPageTable");
    
    let _phys_to_virt = |frame: PhysFrame| -> *mut PageTable {
        let phys = frame.start_address().as_u64();
        let virt = VirtAddr::new(phys + physical_memory_offset.as_u64());
        virt.as_mut_ptr()
    };
    
    let page_table = OffsetPageTable::new(level_4_table_frame, physical_memory_offset);
    serial_println!("DEBUG: memory: OffsetPageTable created successfully");
    page_table
}

/// Returns a mutable reference to the active level 4 table frame.
///
/// This function is unsafe because the caller must guarantee that the
/// complete physical memory is mapped to virtual memory at the passed
/// `physical_memory_offset`. Also, this function must be only called once
/// to avoid aliasing `&mut` references (which is undefined behavior).
unsafe fn active_level_4_table(physical_memory_offset: VirtAddr)
    -> &'static mut PageTable
{
    use x86_64::registers::control::Cr3;

    serial_println!("DEBUG: memory: Reading CR3 register");
    let (level_4_table_frame, _) = Cr3::read();

    let phys = level_4_table_frame.start_address();
    serial_println!("DEBUG: memory: L4 table at physical address: {:?}", phys);
    
    let virt = physical_memory_offset + phys.as_u64();
    serial_println!("DEBUG: memory: L4 table mapped to virtual address: {:?}", virt);
    
    let page_table_ptr: *mut PageTable = virt.as_mut_ptr();
    serial_println!("DEBUG: memory: L4 table pointer created");

    &mut *page_table_ptr // unsafe
}

/// A FrameAllocator that returns usable frames from the bootloader's memory map.
pub struct BootInfoFrameAllocator {
    memory_map: &'static [MemoryRegion],
    next: usize,
}

impl BootInfoFrameAllocator {
    /// Create a FrameAllocator from the passed memory map.
    ///
    /// This function is unsafe because the caller must guarantee that the passed
    /// memory map is valid. The main requirement is that all frames that are marked
    /// as `USABLE` in it are really unused.
    pub unsafe fn init(memory_map: &'static [MemoryRegion]) -> Self {
        serial_println!("DEBUG: memory: Initializing BootInfoFrameAllocator");
        serial_println!("DEBUG: memory: Memory map contains {} regions", memory_map.len());
        
        // Count usable regions for debugging
        let usable_count = memory_map.iter()
            .filter(|r| r.region_type == MemoryRegionType::Usable)
            .count();
        serial_println!("DEBUG: memory: Found {} usable memory regions", usable_count);
        
        BootInfoFrameAllocator {
            memory_map,
            next: 0,
        }
    }

    /// Returns an iterator over the usable frames according to the memory map.
    fn usable_frames(&self) -> impl Iterator<Item = PhysFrame> {
        // get usable regions from memory map
        let regions = self.memory_map.iter();
        let usable_regions = regions
            .filter(|r| r.region_type == MemoryRegionType::Usable);
        // map each region to its address range
        let addr_ranges = usable_regions
            .map(|r| r.range.start_addr()..r.range.end_addr());
        // transform to an iterator of frame start addresses
        let frame_addresses = addr_ranges.flat_map(|r| r.step_by(4096));
        // create `PhysFrame` types from the start addresses
        frame_addresses.map(|addr| PhysFrame::containing_address(PhysAddr::new(addr)))
    }
}

unsafe impl FrameAllocator<Size4KiB> for BootInfoFrameAllocator {
    fn allocate_frame(&mut self) -> Option<PhysFrame> {
        let frame = self.usable_frames().nth(self.next);
        if let Some(f) = frame {
            serial_println!("DEBUG: memory: Allocated frame at physical address: {:?}", f.start_address());
        } else {
            serial_println!("DEBUG: memory: Failed to allocate frame #{}", self.next);
        }
        self.next += 1;
        frame
    }
}

/// Physical frame allocator for the rest of the kernel (shared memory objects,
/// per-task address spaces). Bump-allocates from the boot memory map like
/// `BootInfoFrameAllocator`, but also keeps a free-list so pages can be given
/// back, which the bump allocator alone cannot do.
struct PhysicalFrameManager {
    allocator: Option<BootInfoFrameAllocator>,
    free_list: Vec<PhysFrame>,
}

impl PhysicalFrameManager {
    const fn new() -> Self {
        Self { allocator: None, free_list: Vec::new() }
    }

    fn alloc(&mut self, n_pages: usize) -> Option<PhysAddr> {
        if n_pages == 0 {
            return None;
        }
        // Only contiguous single-frame fast path is served from the free list;
        // multi-frame requests always come from the bump allocator, which hands
        // out contiguous usable-region frames in address order.
        if n_pages == 1 {
            if let Some(frame) = self.free_list.pop() {
                return Some(frame.start_address());
            }
        }
        let allocator = self.allocator.as_mut()?;
        let first = allocator.allocate_frame()?;
        let mut last_addr = first.start_address().as_u64();
        for _ in 1..n_pages {
            let frame = allocator.allocate_frame()?;
            if frame.start_address().as_u64() != last_addr + PAGE_SIZE {
                serial_println!("DEBUG: memory: physical_alloc - non-contiguous frame from bump allocator, giving up");
                return None;
            }
            last_addr = frame.start_address().as_u64();
        }
        Some(first.start_address())
    }

    fn free(&mut self, address: PhysAddr, n_pages: usize) {
        for i in 0..n_pages {
            let addr = PhysAddr::new(address.as_u64() + i as u64 * PAGE_SIZE);
            self.free_list.push(PhysFrame::containing_address(addr));
        }
    }
}

lazy_static! {
    static ref PHYSICAL_FRAMES: Mutex<PhysicalFrameManager> = Mutex::new(PhysicalFrameManager::new());
}

/// Hands the boot-time frame allocator over to the global physical frame
/// manager so `physical_alloc`/`physical_free` become usable kernel-wide.
pub fn install_frame_allocator(allocator: BootInfoFrameAllocator) {
    PHYSICAL_FRAMES.lock().allocator = Some(allocator);
}

/// Allocate `n_pages` contiguous physical pages. Returns the base address.
pub fn physical_alloc(n_pages: usize) -> Option<PhysAddr> {
    PHYSICAL_FRAMES.lock().alloc(n_pages)
}

/// Return `n_pages` contiguous physical pages starting at `address` to the
/// free list.
pub fn physical_free(address: PhysAddr, n_pages: usize) {
    PHYSICAL_FRAMES.lock().free(address, n_pages);
}

// ---------------------------------------------------------------------------
// Address space manager
//
// This kernel keeps a single page table shared by every task (there is no
// per-process CR3 yet - spawning a genuinely isolated user address space is
// out of scope here, same as the ELF loader and the filesystem node layer).
// `AddressSpace` still gives the task layer the narrow interface it expects
// (`kernel_space`, `virtual_alloc`, `virtual_free`) against this one shared
// table, which is all shared-memory mappings need.

use x86_64::structures::paging::{Mapper, Page, PageTableFlags, Size4KiB as PageSize4KiB};

lazy_static! {
    static ref MAPPER: Mutex<Option<OffsetPageTable<'static>>> = Mutex::new(None);
}

/// Hands the live page table over to the global mapper so later subsystems
/// (shared memory) can map pages after boot has moved on from `init()`.
///
/// # Safety
/// Must be called exactly once, with the same table returned by
/// `init_page_table`.
pub unsafe fn install_mapper(mapper: OffsetPageTable<'static>) {
    *MAPPER.lock() = Some(mapper);
}

/// A handle to an address space. Every task currently shares the one kernel
/// table; this type exists so callers go through a named interface rather
/// than poking the global mapper directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSpace;

/// The kernel's single shared address space.
pub fn kernel_space() -> AddressSpace {
    AddressSpace
}

/// Map `n_pages` physical pages starting at `phys` into `virt`, with the
/// given flags. Returns the virtual range's base address on success.
pub fn virtual_alloc(
    _space: AddressSpace,
    virt: VirtAddr,
    phys: PhysAddr,
    n_pages: usize,
    writable: bool,
) -> Result<VirtAddr, crate::errors::KernelError> {
    use crate::errors::{KernelError, MemoryError};

    let mut guard = MAPPER.lock();
    let mapper = guard.as_mut().ok_or(KernelError::NotInitialized)?;

    let mut flags = PageTableFlags::PRESENT;
    if writable {
        flags |= PageTableFlags::WRITABLE;
    }

    for i in 0..n_pages {
        let page = Page::<PageSize4KiB>::containing_address(VirtAddr::new(virt.as_u64() + i as u64 * PAGE_SIZE));
        let frame = PhysFrame::containing_address(PhysAddr::new(phys.as_u64() + i as u64 * PAGE_SIZE));
        let mut frame_allocator_guard = PHYSICAL_FRAMES.lock();
        let frame_allocator = frame_allocator_guard.allocator.as_mut().ok_or(KernelError::NotInitialized)?;
        let result = unsafe { mapper.map_to(page, frame, flags, frame_allocator) };
        match result {
            Ok(flush) => flush.flush(),
            Err(_) => return Err(KernelError::MemoryError(MemoryError::PageMappingFailed)),
        }
    }
    Ok(virt)
}

/// Unmap `n_pages` pages starting at `virt`.
pub fn virtual_free(_space: AddressSpace, virt: VirtAddr, n_pages: usize) {
    let mut guard = MAPPER.lock();
    let mapper = match guard.as_mut() {
        Some(m) => m,
        None => return,
    };
    for i in 0..n_pages {
        let page = Page::<PageSize4KiB>::containing_address(VirtAddr::new(virt.as_u64() + i as u64 * PAGE_SIZE));
        if let Ok((_, flush)) = mapper.unmap(page) {
            flush.flush();
        }
    }
} 