extern crate kernbox;

use kernbox::console::Console;
use kernbox::machine::Machine;
use kernbox::memory::MEMORY_SIZE;
use kernbox::mm::{Mm, PageFlags};
use kernbox::storage::BlockDevice;
use kernbox::tty::Tty;

const SWAP_DEV: u16 = 0x0300;

#[test]
fn typing_reaches_the_screen_and_the_crtc() {
    let mut hw = Machine::default();
    let mut console = Console::init(&mut hw);
    let mut tty = Tty::new(0);

    tty.queue_bytes(b"Hi\n");
    console.write(&mut hw, &mut tty);

    let mut dump = vec![0u8; 80 * 25];
    dump[0] = 1;
    console.screendump(&hw, &mut dump).unwrap();
    assert_eq!(b'H', dump[0]);
    assert_eq!(0x07, dump[1]);
    assert_eq!(b'i', dump[2]);

    assert_eq!((0, 1), console.cursor_position(0));
    // the hardware cursor followed: one row of 80 cells
    assert_eq!(80, hw.crtc.cursor_location());
}

#[test]
fn a_vt102_dialog_round_trips() {
    let mut hw = Machine::default();
    let mut console = Console::init(&mut hw);
    let mut tty = Tty::new(0);

    tty.queue_bytes(b"\x1b[5;10H\x1b[7m*\x1bZ");
    console.write(&mut hw, &mut tty);

    assert_eq!((10, 4), console.cursor_position(0));
    assert_eq!(0x70, console.attribute(0));

    let mut dump = vec![0u8; 80 * 25];
    dump[0] = 1;
    console.screendump(&hw, &mut dump).unwrap();
    assert_eq!(b'*', dump[4 * 160 + 9 * 2]);
    assert_eq!(0x70, dump[4 * 160 + 9 * 2 + 1]);

    let mut answer = Vec::new();
    while let Some(c) = tty.read_q.get_char() {
        answer.push(c);
    }
    assert_eq!(b"\x1b[?1;2c".to_vec(), answer);
}

#[test]
fn console_switching_moves_the_display_origin() {
    let mut hw = Machine::default();
    let mut console = Console::init(&mut hw);
    let mut tty1 = Tty::new(1);

    tty1.queue_bytes(b"back");
    console.write(&mut hw, &mut tty1);
    assert_eq!(0, hw.crtc.start_address());

    console.update_screen(&mut hw, 1);
    let base = console.video.mem_base;
    assert_eq!(((console.origin(1) - base) >> 1) as u16, hw.crtc.start_address());

    let mut dump = vec![0u8; 80 * 25];
    dump[0] = 2;
    console.screendump(&hw, &mut dump).unwrap();
    assert_eq!(b'b', dump[0]);
}

#[test]
fn a_dirty_page_survives_eviction_and_fault_in() {
    let mut hw = Machine::default();
    let mut dev = BlockDevice::in_memory(400);
    dev.write_at(0, &signature_page(100)).unwrap();
    hw.storage.register(SWAP_DEV, dev);

    let mut mm = Mm::new(MEMORY_SIZE as u32);
    mm.swap_dev = Some(SWAP_DEV);
    mm.init_swapping(&mut hw);

    let table = mm.get_free_page(&mut hw);
    let frame = mm.get_free_page(&mut hw);
    let pte = table + 5 * 4;
    let flags = PageFlags::DIRTY | PageFlags::USER | PageFlags::PRESENT;
    hw.memory.write_u32(pte, frame | flags.bits());
    let pattern: Vec<u8> = (0..4096).map(|i| (i * 13 % 241) as u8).collect();
    hw.memory.write(frame, &pattern);

    assert!(mm.try_to_swap_out(&mut hw, pte));
    let entry = hw.memory.read_u32(pte);
    assert_eq!(0, entry & PageFlags::PRESENT.bits());
    let slot = entry >> 1;
    assert_ne!(0, slot);

    mm.swap_in(&mut hw, pte);
    let entry = hw.memory.read_u32(pte);
    assert_ne!(0, entry & PageFlags::PRESENT.bits());
    assert_eq!(pattern, hw.memory.read(entry & 0xffff_f000, 4096));

    // the slot went back to the pool: the next eviction reuses it
    let frame2 = entry & 0xffff_f000;
    hw.memory.write_u32(pte, frame2 | flags.bits());
    assert!(mm.try_to_swap_out(&mut hw, pte));
    assert_eq!(slot, hw.memory.read_u32(pte) >> 1);
}

fn signature_page(swap_size: u32) -> [u8; 4096] {
    let mut page = [0u8; 4096];
    for nr in 1..swap_size {
        page[(nr / 8) as usize] |= 1 << (nr & 7);
    }
    page[4086..].copy_from_slice(b"SWAP-SPACE");
    page
}
