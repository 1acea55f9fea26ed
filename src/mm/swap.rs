// Demand paging: a slot bitmap over the backing store, the page-out
// walk over the page tables and the fault-driven page-in path.

use log::{info, warn};

use crate::machine::Machine;
use crate::memory::FlatMemory;
use crate::mm::{map_nr, oom, Mm, PageFlags, LOW_MEM, PAGING_MEMORY, TASK_SIZE};
use crate::storage::Rw;

#[cfg(test)]
#[path = "./swap_test.rs"]
mod swap_test;

/// slots addressable by the one-page allocation bitmap
pub const SWAP_BITS: u32 = 4096 << 3;

/// pages below the task address space belong to the kernel and are
/// never paged
const FIRST_VM_PAGE: u32 = TASK_SIZE >> 12;
const LAST_VM_PAGE: u32 = 1024 * 1024;
const VM_PAGES: i32 = (LAST_VM_PAGE - FIRST_VM_PAGE) as i32;

/// byte offset of the "SWAP-SPACE" signature inside the bitmap page
const SIGNATURE_OFFSET: u32 = 4086;
const SIGNATURE: &[u8] = b"SWAP-SPACE";

pub(super) fn first_vm_dir_entry() -> usize {
    (FIRST_VM_PAGE >> 10) as usize
}

fn bit(mem: &FlatMemory, page: u32, nr: u32) -> bool {
    mem.read_u8(page + nr / 8) & (1 << (nr & 7)) != 0
}

/// BTS: sets the bit and reports its previous state
fn test_and_set_bit(mem: &mut FlatMemory, page: u32, nr: u32) -> bool {
    let addr = page + nr / 8;
    let mask = 1 << (nr & 7);
    let old = mem.read_u8(addr);
    mem.write_u8(addr, old | mask);
    old & mask != 0
}

/// BTR: clears the bit and reports its previous state
fn test_and_clear_bit(mem: &mut FlatMemory, page: u32, nr: u32) -> bool {
    let addr = page + nr / 8;
    let mask = 1 << (nr & 7);
    let old = mem.read_u8(addr);
    mem.write_u8(addr, old & !mask);
    old & mask != 0
}

impl Mm {
    /// moves one page between physical memory at `buf` and swap slot
    /// `nr`. A missing backing store or a corrupt swap file abandons
    /// the request after one log line; callers carry on from their
    /// previous state.
    pub fn rw_swap_page(&mut self, hw: &mut Machine, rw: Rw, nr: u32, buf: u32) {
        if let Some(dev) = self.swap_device {
            if let Err(e) = hw.storage.rw_page(rw, dev, nr, &mut hw.memory, buf) {
                warn!("swap: i/o failed on device {:#06x}: {}", dev, e);
            }
            return;
        }
        if let Some(file) = &self.swap_file {
            let mut zones = [0u32; 4];
            for (i, zone) in zones.iter_mut().enumerate() {
                *zone = file.bmap((nr << 2) + i as u32);
                if *zone == 0 {
                    warn!("swap: bad swap file");
                    return;
                }
            }
            let dev = file.dev;
            if let Err(e) = hw.storage.rw_swap_file(rw, dev, &zones, &mut hw.memory, buf) {
                warn!("swap: i/o failed on swap file {:#06x}: {}", dev, e);
            }
            return;
        }
        warn!("swap: no swap file or device");
    }

    fn read_swap_page(&mut self, hw: &mut Machine, nr: u32, buf: u32) {
        self.rw_swap_page(hw, Rw::Read, nr, buf);
    }

    fn write_swap_page(&mut self, hw: &mut Machine, nr: u32, buf: u32) {
        self.rw_swap_page(hw, Rw::Write, nr, buf);
    }

    /// claims the first free slot, 0 meaning none (slot 0 is the
    /// reserved signature page and is never handed out)
    fn get_swap_page(&mut self, hw: &mut Machine) -> u32 {
        let bitmap = match self.swap_bitmap {
            Some(b) => b,
            None => return 0,
        };
        for nr in 1..SWAP_BITS {
            if test_and_clear_bit(&mut hw.memory, bitmap, nr) {
                return nr;
            }
        }
        0
    }

    /// returns a slot to the bitmap; freeing a free slot means the
    /// bitmap no longer matches the page tables
    pub fn swap_free(&mut self, hw: &mut Machine, nr: u32) {
        if nr == 0 {
            return;
        }
        if let Some(bitmap) = self.swap_bitmap {
            if nr < SWAP_BITS && !test_and_set_bit(&mut hw.memory, bitmap, nr) {
                return;
            }
        }
        warn!("swap: swap-space bitmap bad");
    }

    /// faults a swapped page back in through the entry at `pte_addr`:
    /// fresh frame, slot read, slot released, entry made present
    pub fn swap_in(&mut self, hw: &mut Machine, pte_addr: u32) {
        let bitmap = match self.swap_bitmap {
            Some(b) => b,
            None => {
                warn!("swap: swapping in without a bitmap");
                return;
            }
        };
        let entry = hw.memory.read_u32(pte_addr);
        if entry & PageFlags::PRESENT.bits() != 0 {
            warn!("swap: swapping in a present page");
            return;
        }
        let nr = entry >> 1;
        if nr == 0 {
            warn!("swap: swapped entry holds no slot");
            return;
        }
        let page = self.get_free_page(hw);
        if page == 0 {
            oom();
        }
        self.read_swap_page(hw, nr, page);
        if test_and_set_bit(&mut hw.memory, bitmap, nr) {
            warn!("swap: slot {} multiply swapped", nr);
        }
        let flags = PageFlags::DIRTY | PageFlags::USER | PageFlags::RW | PageFlags::PRESENT;
        hw.memory.write_u32(pte_addr, page | flags.bits());
    }

    /// tries to evict the page behind one table entry. Clean pages
    /// are dropped on the floor, dirty unshared ones go to a slot;
    /// the TLB flush precedes the disk write so a racing fault sees
    /// the slot, never a half-evicted frame.
    pub fn try_to_swap_out(&mut self, hw: &mut Machine, pte_addr: u32) -> bool {
        let entry = hw.memory.read_u32(pte_addr);
        if entry & PageFlags::PRESENT.bits() == 0 {
            return false;
        }
        if entry.wrapping_sub(LOW_MEM) > PAGING_MEMORY {
            return false;
        }
        let page = entry & 0xffff_f000;
        if entry & PageFlags::DIRTY.bits() != 0 {
            if self.mem_map[map_nr(page)] != 1 {
                return false;
            }
            let nr = self.get_swap_page(hw);
            if nr == 0 {
                return false;
            }
            hw.memory.write_u32(pte_addr, nr << 1);
            self.invalidate();
            self.write_swap_page(hw, nr, page);
            self.free_page(page);
            return true;
        }
        hw.memory.write_u32(pte_addr, 0);
        self.invalidate();
        self.free_page(page);
        true
    }

    /// round-robin hunt for an evictable page, resuming where the
    /// last call left off; one full lap without an eviction gives up
    pub fn swap_out(&mut self, hw: &mut Machine) -> bool {
        let mut counter = VM_PAGES;
        let mut pg_table = 0u32;
        while counter > 0 {
            pg_table = hw.memory.read_u32((self.dir_entry as u32) << 2);
            if pg_table & PageFlags::PRESENT.bits() != 0 {
                break;
            }
            counter -= 1024;
            self.advance_dir_entry();
        }
        pg_table &= 0xffff_f000;
        'scan: while counter > 0 {
            counter -= 1;
            self.page_entry += 1;
            if self.page_entry >= 1024 {
                self.page_entry = 0;
                loop {
                    self.advance_dir_entry();
                    pg_table = hw.memory.read_u32((self.dir_entry as u32) << 2);
                    if pg_table & PageFlags::PRESENT.bits() == 0 {
                        counter -= 1024;
                        if counter > 0 {
                            continue;
                        }
                        break 'scan;
                    }
                    pg_table &= 0xffff_f000;
                    break;
                }
            }
            if self.try_to_swap_out(hw, pg_table + ((self.page_entry as u32) << 2)) {
                return true;
            }
        }
        warn!("swap: out of swap space");
        false
    }

    fn advance_dir_entry(&mut self) {
        self.dir_entry += 1;
        if self.dir_entry >= 1024 {
            self.dir_entry = first_vm_dir_entry();
        }
    }

    /// brings up swapping on the configured device: loads the slot
    /// bitmap from slot 0, checks the signature and the reserved
    /// bits, and counts what is actually usable
    pub fn init_swapping(&mut self, hw: &mut Machine) {
        let dev = match self.swap_dev {
            Some(d) => d,
            None => return,
        };
        let blocks = match hw.storage.blk_size(dev) {
            Some(b) => b,
            None => {
                warn!("swap: unable to get size of swap device");
                return;
            }
        };
        if blocks == 0 {
            return;
        }
        if blocks < 100 {
            warn!("swap: swap device too small ({} blocks)", blocks);
            return;
        }
        let mut swap_size = blocks >> 2;
        if swap_size > SWAP_BITS {
            swap_size = SWAP_BITS;
        }
        let bitmap = self.get_free_page(hw);
        if bitmap == 0 {
            warn!("swap: out of memory before swapping even started");
            return;
        }
        self.swap_device = Some(dev);
        self.swap_bitmap = Some(bitmap);
        self.read_swap_page(hw, 0, bitmap);
        if hw.memory.read(bitmap + SIGNATURE_OFFSET, SIGNATURE.len()) != SIGNATURE {
            warn!("swap: unable to find swap-space signature");
            self.free_page(bitmap);
            self.swap_bitmap = None;
            return;
        }
        // the signature bytes double as bitmap storage; zeroed they
        // read as permanently allocated slots
        hw.memory.fill(bitmap + SIGNATURE_OFFSET, 0, SIGNATURE.len());
        let mut i = 0;
        while i < SWAP_BITS {
            if i == 1 {
                i = swap_size;
            }
            if bit(&hw.memory, bitmap, i) {
                warn!("swap: bad swap-space bit-map");
                self.free_page(bitmap);
                self.swap_bitmap = None;
                return;
            }
            i += 1;
        }
        let mut free = 0u32;
        for nr in 1..swap_size {
            if bit(&hw.memory, bitmap, nr) {
                free += 1;
            }
        }
        if free == 0 {
            self.free_page(bitmap);
            self.swap_bitmap = None;
            return;
        }
        info!("swap: device ok, {} pages ({} bytes) swap-space", free, free * 4096);
    }
}
