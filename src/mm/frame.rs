// Physical frame allocator: a byte-per-frame reference map over the
// pageable region, scanned downward so the low frames stay free for
// DMA buffers.

use crate::machine::Machine;
use crate::mm::{map_nr, LOW_MEM, PAGING_PAGES};
use crate::storage::Inode;

#[cfg(test)]
#[path = "./frame_test.rs"]
mod frame_test;

/// frame map value for memory the pager must never touch
const USED: u8 = 100;

/// Memory-manager state: the frame reference map plus the swap
/// configuration and the page-out cursors. Frame allocation and
/// page-out are mutually recursive, so one record owns both.
pub struct Mm {
    pub mem_map: Vec<u8>,
    /// first physical address past the installed memory
    pub high_memory: u32,

    /// swap device chosen at boot configuration time
    pub swap_dev: Option<u16>,
    /// active raw swap device
    pub swap_device: Option<u16>,
    /// active swap file
    pub swap_file: Option<Inode>,
    /// physical address of the slot bitmap page, once loaded
    pub(super) swap_bitmap: Option<u32>,

    // round-robin page-out cursors, persistent across calls
    pub(super) dir_entry: usize,
    pub(super) page_entry: i32,

    tlb_flushes: u64,
}

impl Mm {
    pub fn new(high_memory: u32) -> Self {
        assert!(high_memory > LOW_MEM);
        let mut mem_map = vec![0u8; PAGING_PAGES];
        let usable = map_nr(high_memory.min(LOW_MEM + crate::mm::PAGING_MEMORY));
        for entry in mem_map.iter_mut().skip(usable) {
            *entry = USED;
        }
        Mm {
            mem_map,
            high_memory,
            swap_dev: None,
            swap_device: None,
            swap_file: None,
            swap_bitmap: None,
            dir_entry: super::swap::first_vm_dir_entry(),
            page_entry: -1,
            tlb_flushes: 0,
        }
    }

    /// flush seam for the hardware TLB; the emulated machine has
    /// none, but eviction ordering stays observable via the counter
    pub fn invalidate(&mut self) {
        self.tlb_flushes += 1;
    }

    pub fn tlb_flushes(&self) -> u64 {
        self.tlb_flushes
    }

    /// hands out the highest free frame, zero-filled, or 0 when even
    /// paging out cannot produce one
    pub fn get_free_page(&mut self, hw: &mut Machine) -> u32 {
        loop {
            if let Some(addr) = self.find_free_frame() {
                if addr >= self.high_memory {
                    continue;
                }
                hw.memory.fill(addr, 0, 4096);
                return addr;
            }
            if !self.swap_out(hw) {
                return 0;
            }
        }
    }

    fn find_free_frame(&mut self) -> Option<u32> {
        for nr in (0..PAGING_PAGES).rev() {
            if self.mem_map[nr] == 0 {
                self.mem_map[nr] = 1;
                return Some(LOW_MEM + ((nr as u32) << 12));
            }
        }
        None
    }

    /// drops one reference to a frame; freeing kernel memory is
    /// silently ignored, freeing a free frame is a corrupted map
    pub fn free_page(&mut self, addr: u32) {
        if addr < LOW_MEM {
            return;
        }
        if addr >= self.high_memory {
            panic!("mm: freeing nonexistent page {:#x}", addr);
        }
        let nr = map_nr(addr);
        if self.mem_map[nr] == 0 {
            panic!("mm: freeing already free page {:#x}", addr);
        }
        self.mem_map[nr] -= 1;
    }
}
