#![allow(dead_code)]

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate quick_error;

#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod console;
pub mod machine;
pub mod memory;
pub mod mm;
pub mod pic;
pub mod pit;
pub mod storage;
pub mod tty;
