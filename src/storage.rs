// Block-device layer: numbered devices with 1 KiB block and 4 KiB page
// granular transfers between the device and physical memory. Devices
// are RAM images or host files.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};

use crate::memory::FlatMemory;

#[cfg(test)]
#[path = "./storage_test.rs"]
mod storage_test;

pub const BLOCK_SIZE: usize = 1024;
pub const PAGE_SIZE: usize = 4096;

pub fn major(dev: u16) -> u8 {
    (dev >> 8) as u8
}

pub fn minor(dev: u16) -> u8 {
    dev as u8
}

/// transfer direction of a block request
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Rw {
    Read,
    Write,
}

quick_error! {
    #[derive(Debug)]
    pub enum StorageError {
        UnknownDevice(dev: u16) {
            display("no such block device: {:#06x}", dev)
        }
        OutOfRange(dev: u16, block: u32) {
            display("block {} past end of device {:#06x}", block, dev)
        }
        Io(err: io::Error) {
            from()
            display("block i/o error: {}", err)
            cause(err)
        }
    }
}

enum Backing {
    Ram(Vec<u8>),
    File(File),
}

/// one registered block device
pub struct BlockDevice {
    backing: Backing,
    blocks: u32,
}

impl BlockDevice {
    /// a zero-filled RAM image of `blocks` 1 KiB blocks
    pub fn in_memory(blocks: u32) -> Self {
        BlockDevice {
            backing: Backing::Ram(vec![0u8; blocks as usize * BLOCK_SIZE]),
            blocks,
        }
    }

    /// a device backed by a host file; partial trailing blocks are
    /// not addressable
    pub fn from_file(file: File) -> io::Result<Self> {
        let blocks = (file.metadata()?.len() / BLOCK_SIZE as u64) as u32;
        Ok(BlockDevice {
            backing: Backing::File(file),
            blocks,
        })
    }

    /// size in 1 KiB blocks
    pub fn blocks(&self) -> u32 {
        self.blocks
    }

    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), StorageError> {
        match &mut self.backing {
            Backing::Ram(data) => {
                let offset = offset as usize;
                buf.copy_from_slice(&data[offset..offset + buf.len()]);
            }
            Backing::File(f) => {
                f.seek(SeekFrom::Start(offset))?;
                f.read_exact(buf)?;
            }
        }
        Ok(())
    }

    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<(), StorageError> {
        match &mut self.backing {
            Backing::Ram(data) => {
                let offset = offset as usize;
                data[offset..offset + buf.len()].copy_from_slice(buf);
            }
            Backing::File(f) => {
                f.seek(SeekFrom::Start(offset))?;
                f.write_all(buf)?;
            }
        }
        Ok(())
    }
}

/// in-core inode view of a swap file: the block map resolves
/// file-relative block numbers to device blocks, 0 marking a hole
#[derive(Clone)]
pub struct Inode {
    pub dev: u16,
    block_map: Vec<u32>,
}

impl Inode {
    pub fn new(dev: u16, block_map: Vec<u32>) -> Self {
        Inode { dev, block_map }
    }

    pub fn bmap(&self, nr: u32) -> u32 {
        self.block_map.get(nr as usize).cloned().unwrap_or(0)
    }
}

pub struct Storage {
    devices: HashMap<u16, BlockDevice>,
}

impl Storage {
    pub fn default() -> Self {
        Storage {
            devices: HashMap::new(),
        }
    }

    pub fn register(&mut self, dev: u16, device: BlockDevice) {
        self.devices.insert(dev, device);
    }

    pub fn device_mut(&mut self, dev: u16) -> Option<&mut BlockDevice> {
        self.devices.get_mut(&dev)
    }

    /// device size in 1 KiB blocks
    pub fn blk_size(&self, dev: u16) -> Option<u32> {
        self.devices.get(&dev).map(|d| d.blocks())
    }

    /// page-granular transfer between a device and physical memory;
    /// `page` counts 4 KiB units from the start of the device
    pub fn rw_page(
        &mut self,
        rw: Rw,
        dev: u16,
        page: u32,
        mem: &mut FlatMemory,
        buf: u32,
    ) -> Result<(), StorageError> {
        let device = self
            .devices
            .get_mut(&dev)
            .ok_or_else(|| StorageError::UnknownDevice(dev))?;
        if (page + 1) * 4 > device.blocks() {
            return Err(StorageError::OutOfRange(dev, page * 4));
        }
        let offset = u64::from(page) * PAGE_SIZE as u64;
        match rw {
            Rw::Read => {
                let mut data = [0u8; PAGE_SIZE];
                device.read_at(offset, &mut data)?;
                mem.write(buf, &data);
            }
            Rw::Write => {
                let mut data = [0u8; PAGE_SIZE];
                data.copy_from_slice(mem.read(buf, PAGE_SIZE));
                device.write_at(offset, &data)?;
            }
        }
        Ok(())
    }

    /// scatter transfer for swap files: one page as four device blocks
    /// resolved through the file's block map
    pub fn rw_swap_file(
        &mut self,
        rw: Rw,
        dev: u16,
        zones: &[u32; 4],
        mem: &mut FlatMemory,
        buf: u32,
    ) -> Result<(), StorageError> {
        let device = self
            .devices
            .get_mut(&dev)
            .ok_or_else(|| StorageError::UnknownDevice(dev))?;
        for (i, &zone) in zones.iter().enumerate() {
            if zone >= device.blocks() {
                return Err(StorageError::OutOfRange(dev, zone));
            }
            let offset = u64::from(zone) * BLOCK_SIZE as u64;
            let addr = buf + (i * BLOCK_SIZE) as u32;
            match rw {
                Rw::Read => {
                    let mut data = [0u8; BLOCK_SIZE];
                    device.read_at(offset, &mut data)?;
                    mem.write(addr, &data);
                }
                Rw::Write => {
                    let mut data = [0u8; BLOCK_SIZE];
                    data.copy_from_slice(mem.read(addr, BLOCK_SIZE));
                    device.write_at(offset, &data)?;
                }
            }
        }
        Ok(())
    }
}
