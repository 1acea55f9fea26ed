// Programmable Interval Timer (8253)
//
// Counter 0 drives the timer tick, counter 2 the speaker. The speaker
// gate itself sits in PPI port B.

use crate::machine::Component;

#[cfg(test)]
#[path = "./pit_test.rs"]
mod pit_test;

#[derive(Clone, Debug, PartialEq)]
enum AccessMode {
    LatchCountValue,
    LoByteOnly,
    HiByteOnly,
    LoByteHiByte,
}

#[derive(Clone, Debug, PartialEq)]
enum OperatingMode {
    Mode0, // interrupt on terminal count
    Mode1, // hardware re-triggerable one-shot
    Mode2, // rate generator
    Mode3, // square wave generator
    Mode4, // software triggered strobe
    Mode5, // hardware triggered strobe
}

#[derive(Clone)]
pub struct Counter {
    pub count: u16,
    pub reload: u16,
    latch: u16,
    hi: bool,
    channel: u8,

    access_mode: AccessMode,
    operating_mode: OperatingMode,
    bcd: bool,
}

impl Counter {
    pub fn new(channel: u8) -> Self {
        Counter {
            count: 0,
            reload: 0, // 0 = 0x1_0000
            latch: 0,
            hi: false,
            channel,
            access_mode: AccessMode::LoByteHiByte,
            operating_mode: OperatingMode::Mode0,
            bcd: false,
        }
    }

    pub fn read_next_part(&mut self) -> u8 {
        let word = match self.access_mode {
            AccessMode::LatchCountValue => self.latch,
            _ => self.count,
        };
        match self.access_mode {
            AccessMode::LoByteOnly => word as u8,
            AccessMode::HiByteOnly => (word >> 8) as u8,
            _ => {
                let res = if self.hi { (word >> 8) as u8 } else { word as u8 };
                self.hi = !self.hi;
                res
            }
        }
    }

    /// sets the reload value, one byte at a time in the two-byte modes
    pub fn write_reload_part(&mut self, val: u8) {
        match self.access_mode {
            AccessMode::LoByteOnly => {
                self.reload = (self.reload & 0xff00) | u16::from(val);
            }
            AccessMode::HiByteOnly => {
                self.reload = (self.reload & 0x00ff) | u16::from(val) << 8;
            }
            _ => {
                self.reload = if self.hi {
                    (self.reload & 0x00ff) | u16::from(val) << 8
                } else {
                    (self.reload & 0xff00) | u16::from(val)
                };
                self.hi = !self.hi;
            }
        }
    }

    fn set_mode(&mut self, access_mode: u8, operating_mode: u8, bcd: u8) {
        self.access_mode = match access_mode {
            0 => {
                self.latch = self.count;
                AccessMode::LatchCountValue
            }
            1 => AccessMode::LoByteOnly,
            2 => AccessMode::HiByteOnly,
            _ => AccessMode::LoByteHiByte,
        };
        self.operating_mode = match operating_mode {
            0 => OperatingMode::Mode0,
            1 => OperatingMode::Mode1,
            2 | 6 => OperatingMode::Mode2,
            3 | 7 => OperatingMode::Mode3,
            4 => OperatingMode::Mode4,
            _ => OperatingMode::Mode5,
        };
        self.bcd = bcd != 0;
        self.hi = false;
    }
}

#[derive(Clone)]
pub struct PIT {
    pub counter0: Counter,
    pub counter1: Counter,
    pub counter2: Counter,
}

impl PIT {
    pub fn new() -> Self {
        PIT {
            counter0: Counter::new(0),
            counter1: Counter::new(1),
            counter2: Counter::new(2),
        }
    }

    fn counter(&mut self, n: u8) -> &mut Counter {
        match n {
            0 => &mut self.counter0,
            1 => &mut self.counter1,
            _ => &mut self.counter2,
        }
    }

    /// port 0043: control word for counters 0-2
    pub fn set_mode_command(&mut self, val: u8) {
        let channel = (val >> 6) & 0b11;
        let access_mode = (val >> 4) & 0b11;
        let operating_mode = (val >> 1) & 0b111;
        let bcd = val & 1;
        if channel == 3 {
            // read-back command, 8254 only
            return;
        }
        self.counter(channel).set_mode(access_mode, operating_mode, bcd);
    }
}

impl Component for PIT {
    fn in_u8(&mut self, port: u16) -> Option<u8> {
        match port {
            0x40..=0x42 => Some(self.counter((port - 0x40) as u8).read_next_part()),
            _ => None,
        }
    }

    fn out_u8(&mut self, port: u16, data: u8) -> bool {
        match port {
            0x40..=0x42 => {
                self.counter((port - 0x40) as u8).write_reload_part(data);
                true
            }
            0x43 => {
                self.set_mode_command(data);
                true
            }
            _ => false,
        }
    }
}
