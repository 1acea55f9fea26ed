use std::fs::OpenOptions;

use tempdir::TempDir;

use crate::memory::FlatMemory;
use crate::storage::{BlockDevice, Inode, Rw, Storage, StorageError};

#[test]
fn page_io_round_trips_through_ram_device() {
    let mut storage = Storage::default();
    let mut mem = FlatMemory::new();
    storage.register(0x0300, BlockDevice::in_memory(64));

    mem.fill(0x20_0000, 0x5a, 4096);
    storage
        .rw_page(Rw::Write, 0x0300, 3, &mut mem, 0x20_0000)
        .unwrap();

    storage
        .rw_page(Rw::Read, 0x0300, 3, &mut mem, 0x30_0000)
        .unwrap();
    assert_eq!(mem.read(0x20_0000, 4096), mem.read(0x30_0000, 4096));
}

#[test]
fn page_io_round_trips_through_file_device() {
    let tmp = TempDir::new("kernbox").unwrap();
    let path = tmp.path().join("disk.img");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&path)
        .unwrap();
    file.set_len(64 * 1024).unwrap();

    let mut storage = Storage::default();
    let mut mem = FlatMemory::new();
    storage.register(0x0301, BlockDevice::from_file(file).unwrap());
    assert_eq!(Some(64), storage.blk_size(0x0301));

    mem.fill(0x20_0000, 0xa5, 4096);
    storage
        .rw_page(Rw::Write, 0x0301, 2, &mut mem, 0x20_0000)
        .unwrap();
    storage
        .rw_page(Rw::Read, 0x0301, 2, &mut mem, 0x30_0000)
        .unwrap();
    assert_eq!(mem.read(0x20_0000, 4096), mem.read(0x30_0000, 4096));
}

#[test]
fn unknown_device_is_an_error() {
    let mut storage = Storage::default();
    let mut mem = FlatMemory::new();
    match storage.rw_page(Rw::Read, 0x0900, 0, &mut mem, 0x20_0000) {
        Err(StorageError::UnknownDevice(0x0900)) => {}
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[test]
fn transfers_past_the_device_end_are_rejected() {
    let mut storage = Storage::default();
    let mut mem = FlatMemory::new();
    storage.register(0x0300, BlockDevice::in_memory(8));
    match storage.rw_page(Rw::Read, 0x0300, 2, &mut mem, 0x20_0000) {
        Err(StorageError::OutOfRange(0x0300, 8)) => {}
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[test]
fn swap_file_zones_scatter_one_page() {
    let mut storage = Storage::default();
    let mut mem = FlatMemory::new();
    storage.register(0x0300, BlockDevice::in_memory(64));

    // a page scattered over non-contiguous file blocks
    let inode = Inode::new(0x0300, vec![10, 3, 40, 7]);
    let zones = [
        inode.bmap(0),
        inode.bmap(1),
        inode.bmap(2),
        inode.bmap(3),
    ];
    for (i, b) in mem.data[0x20_0000..0x20_1000].iter_mut().enumerate() {
        *b = (i / 1024) as u8 + 1;
    }
    storage
        .rw_swap_file(Rw::Write, 0x0300, &zones, &mut mem, 0x20_0000)
        .unwrap();

    storage
        .rw_swap_file(Rw::Read, 0x0300, &zones, &mut mem, 0x30_0000)
        .unwrap();
    assert_eq!(mem.read(0x20_0000, 4096), mem.read(0x30_0000, 4096));

    // the second kilobyte went to device block 3
    let device = storage.device_mut(0x0300).unwrap();
    let mut block = [0u8; 1024];
    device.read_at(3 * 1024, &mut block).unwrap();
    assert!(block.iter().all(|&b| b == 2));
}

#[test]
fn bmap_reports_holes_as_zero() {
    let inode = Inode::new(0x0300, vec![5, 0, 9]);
    assert_eq!(5, inode.bmap(0));
    assert_eq!(0, inode.bmap(1));
    assert_eq!(9, inode.bmap(2));
    assert_eq!(0, inode.bmap(3));
}
