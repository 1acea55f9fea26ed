pub use self::frame::*;
mod frame;

pub use self::swap::*;
mod swap;

/// physical memory below this line belongs to the kernel and the
/// adapters; it is never handed to the pager
pub const LOW_MEM: u32 = 0x10_0000;

/// span of physical memory owned by the pager
pub const PAGING_MEMORY: u32 = 15 * 1024 * 1024;

/// pageable 4 KiB frames
pub const PAGING_PAGES: usize = (PAGING_MEMORY >> 12) as usize;

/// top of the per-task virtual address range
pub const TASK_SIZE: u32 = 0x400_0000;

/// frame map index of a pageable physical address
pub fn map_nr(addr: u32) -> usize {
    ((addr - LOW_MEM) >> 12) as usize
}

bitflags! {
    /// status bits in the low half of a present page-table entry; an
    /// entry with PRESENT clear but a nonzero value carries a swap
    /// slot in bits 1..31 instead
    pub struct PageFlags: u32 {
        const PRESENT  = 0x01;
        const RW       = 0x02;
        const USER     = 0x04;
        const ACCESSED = 0x20;
        const DIRTY    = 0x40;
    }
}

/// the out-of-memory handler; a full kernel would pick a task to
/// kill, this machine has nothing left to run
pub fn oom() -> ! {
    panic!("out of memory");
}
