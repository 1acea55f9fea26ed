// Virtual console engine: a VT102 interpreter driving a character-cell
// adapter through memory-mapped cells and CRTC port writes. Several
// independent consoles share the adapter window; only the foreground
// one owns the CRTC registers.

use crate::machine::{Machine, TrapGate, BOOT_CURSOR_X, BOOT_CURSOR_Y, BOOT_EGA_BX, BOOT_VIDEO_LINES, BOOT_VIDEO_MODE, HZ};
use crate::tty::{Termios, Tty};

#[cfg(test)]
#[path = "./console_test.rs"]
mod console_test;

pub const MAX_CONSOLES: usize = 8;

const NPAR: usize = 16;

/// what the terminal answers to ESC Z (vt100 identify)
const RESPONSE: &[u8] = b"\x1b[?1;2c";

/// glyphs for the printable range 32..127
static NORMAL_MAP: &[u8; 96] =
    b" !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~ ";

/// vt100 line-drawing set; the lower-case range maps to box glyphs
static GRAPHICS_MAP: &[u8; 96] =
    b" !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^ \x04\xb1\x07\x07\x07\x07\xf8\xf1\x07\x07\xbd\xb7\xd6\xd3\xd7\xc4\xc4\xc4\xc4\xc4\xc7\xb6\xd0\xd2\xba\xf3\xf2\xe3\\007";

#[derive(Clone, Copy, PartialEq, Debug)]
enum Charset {
    Normal,
    Graphics,
}

impl Charset {
    fn table(self) -> &'static [u8; 96] {
        match self {
            Charset::Normal => NORMAL_MAP,
            Charset::Graphics => GRAPHICS_MAP,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AdapterKind {
    Mda,
    Cga,
    EgaMono,
    EgaColor,
}

impl AdapterKind {
    /// EGA-class adapters have spare window memory and scroll by
    /// moving the CRTC start address
    pub fn is_ega(self) -> bool {
        self == AdapterKind::EgaMono || self == AdapterKind::EgaColor
    }
}

/// display adapter selected by the boot-time probe
#[derive(Clone, Debug)]
pub struct Adapter {
    pub kind: AdapterKind,
    pub mem_base: u32,
    pub mem_term: u32,
    /// CRTC index port
    pub port_reg: u16,
    /// CRTC data port
    pub port_val: u16,
    pub columns: u32,
    pub lines: u32,
    /// bytes per text row: one glyph and one attribute byte per cell
    pub row_bytes: u32,
    pub can_do_colour: bool,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum State {
    Normal,
    Escape,
    CsiEnter,
    CsiParams,
    FuncKey,
    SetTerm,
    SetGraph,
    Discard,
}

/// per-console state record
#[derive(Clone)]
struct Vc {
    /// slice of the adapter window owned by this console
    mem_start: u32,
    mem_end: u32,
    /// address of logical row 0; slides within the slice on EGA
    origin: u32,
    scr_end: u32,
    /// cursor cell address
    pos: u32,
    /// x may rest at `columns`, the pre-wrap column
    x: u32,
    y: u32,
    /// scrolling region, top inclusive, bottom exclusive
    top: u32,
    bottom: u32,
    attr: u8,
    def_attr: u8,
    erase_char: u16,
    bold_attr: Option<u8>,
    state: State,
    ques: bool,
    npar: usize,
    par: [u32; NPAR],
    saved_x: u32,
    saved_y: u32,
    iscolor: bool,
    translate: Charset,
}

quick_error! {
    #[derive(Debug)]
    pub enum ConsoleError {
        BadConsole(n: usize) {
            display("no such console: {}", n)
        }
        BufferTooSmall {
            display("buffer smaller than one screen")
        }
    }
}

pub struct Console {
    pub video: Adapter,
    vc: Vec<Vc>,
    pub nr_consoles: usize,
    pub fg_console: usize,

    /// screen-blank timeout in ticks, 0 disables blanking
    pub blankinterval: u32,
    /// ticks left until the screen blanks, reloaded on cursor motion
    pub blankcount: u32,
    /// ticks left until the speaker is gated off
    pub beepcount: u32,
}

impl Console {
    /// probes the adapter from the boot hand-off words, carves the
    /// video window into consoles and takes over the keyboard vector
    pub fn init(hw: &mut Machine) -> Console {
        let mode = hw.memory.read_u16(BOOT_VIDEO_MODE) & 0xff;
        let columns = u32::from(hw.memory.read_u16(BOOT_VIDEO_MODE) >> 8);
        let lines = u32::from(hw.memory.read_u16(BOOT_VIDEO_LINES) & 0xff);
        let ega_bx = hw.memory.read_u16(BOOT_EGA_BX);
        let orig_x = u32::from(hw.memory.read_u8(BOOT_CURSOR_X));
        let orig_y = u32::from(hw.memory.read_u8(BOOT_CURSOR_Y));
        let row_bytes = columns * 2;

        let (kind, mem_base, mem_term, port_reg, port_val, can_do_colour, tag): (_, u32, u32, u16, u16, bool, &[u8; 4]) = if mode == 7 {
            if ega_bx & 0xff != 0x10 {
                (AdapterKind::EgaMono, 0xb0000, 0xb8000, 0x3b4, 0x3b5, false, b"EGAm")
            } else {
                (AdapterKind::Mda, 0xb0000, 0xb2000, 0x3b4, 0x3b5, false, b"*MDA")
            }
        } else if ega_bx & 0xff != 0x10 {
            (AdapterKind::EgaColor, 0xb8000, 0xc0000, 0x3d4, 0x3d5, true, b"EGAc")
        } else {
            (AdapterKind::Cga, 0xb8000, 0xba000, 0x3d4, 0x3d5, true, b"*CGA")
        };

        let mut window = mem_term - mem_base;
        let screen_bytes = lines * row_bytes;
        let mut nr_consoles = (window / screen_bytes) as usize;
        if nr_consoles > MAX_CONSOLES {
            nr_consoles = MAX_CONSOLES;
        }
        if nr_consoles == 0 {
            nr_consoles = 1;
        }
        window /= nr_consoles as u32;

        // adapter tag in the last eight bytes of the first row, glyph
        // cells only, attributes left alone
        let mut p = mem_base + row_bytes - 8;
        for &b in tag.iter() {
            hw.memory.write_u8(p, b);
            p += 2;
        }

        let vc0 = Vc {
            mem_start: mem_base,
            mem_end: mem_base + window,
            origin: mem_base,
            scr_end: mem_base + screen_bytes,
            pos: mem_base,
            x: 0,
            y: 0,
            top: 0,
            bottom: lines,
            attr: 0x07,
            def_attr: 0x07,
            erase_char: 0x0720,
            bold_attr: None,
            state: State::Normal,
            ques: false,
            npar: 0,
            par: [0; NPAR],
            saved_x: 0,
            saved_y: 0,
            iscolor: false,
            translate: Charset::Normal,
        };
        let mut vc = vec![vc0; nr_consoles];
        for (i, c) in vc.iter_mut().enumerate().skip(1) {
            let base = mem_base + i as u32 * window;
            c.mem_start = base;
            c.mem_end = base + window;
            c.origin = base;
            c.scr_end = base + screen_bytes;
            c.pos = base;
        }

        let mut console = Console {
            video: Adapter {
                kind,
                mem_base,
                mem_term,
                port_reg,
                port_val,
                columns,
                lines,
                row_bytes,
                can_do_colour,
            },
            vc,
            nr_consoles,
            fg_console: 0,
            blankinterval: 0,
            blankcount: 0,
            beepcount: 0,
        };
        console.gotoxy(0, orig_x, orig_y);
        for cons in 1..nr_consoles {
            console.gotoxy(cons, 0, 0);
        }
        console.update_screen(hw, 0);

        hw.set_trap_gate(0x21, TrapGate::KeyboardInterrupt);
        let mask = hw.inb_p(0x21);
        hw.outb_p(0x21, mask & 0xfd);
        let a = hw.inb_p(0x61);
        hw.outb_p(0x61, a | 0x80);
        hw.outb_p(0x61, a);
        console
    }

    /// makes console `new_console` the foreground one and hands it the
    /// CRTC; the keyboard driver calls this on console switch
    pub fn update_screen(&mut self, hw: &mut Machine, new_console: usize) {
        self.fg_console = new_console;
        self.set_origin(hw, new_console);
        self.set_cursor(hw, new_console);
    }

    /// drains the tty write queue into the interpreter unless the tty
    /// is stopped by flow control
    pub fn write(&mut self, hw: &mut Machine, tty: &mut Tty) {
        let cons = tty.num;
        if cons >= MAX_CONSOLES {
            panic!("console: write on illegal tty {}", cons);
        }
        let mut nr = tty.write_q.chars();
        while nr > 0 {
            nr -= 1;
            if tty.stopped {
                break;
            }
            let c = match tty.write_q.get_char() {
                Some(c) => c,
                None => break,
            };
            self.put_byte(hw, tty, cons, c);
        }
        self.set_cursor(hw, cons);
    }

    /// unstructured writer for kernel messages: LF becomes CR+LF, CR
    /// stays CR, everything else is written literally with no escape
    /// interpretation
    pub fn print(&mut self, hw: &mut Machine, s: &[u8]) {
        let cons = self.fg_console;
        for &c in s {
            if c == 10 {
                self.cr(cons);
                self.lf(hw, cons);
                continue;
            }
            if c == 13 {
                self.cr(cons);
                continue;
            }
            self.emit(hw, cons, c);
        }
        self.set_cursor(hw, cons);
    }

    /// copies one console's screen into `buf`; buf[0] selects the
    /// console, 1-based. The source pointer advances a byte per output
    /// byte, so glyphs and attributes come out interleaved and the
    /// copy covers the top half of the window.
    pub fn screendump(&self, hw: &Machine, buf: &mut [u8]) -> Result<(), ConsoleError> {
        let len = (self.video.columns * self.video.lines) as usize;
        if buf.len() < len {
            return Err(ConsoleError::BufferTooSmall);
        }
        let n = buf[0] as usize;
        if n < 1 || n > self.nr_consoles {
            return Err(ConsoleError::BadConsole(n));
        }
        let mut sptr = self.vc[n - 1].origin;
        for slot in buf.iter_mut().take(len) {
            *slot = hw.memory.read_u8(sptr);
            sptr += 1;
        }
        Ok(())
    }

    /// gates the speaker off; the timer calls this when `beepcount`
    /// runs out
    pub fn stop_beep(&mut self, hw: &mut Machine) {
        let a = hw.inb_p(0x61);
        hw.outb(0x61, a & 0xfc);
    }

    pub fn blank_screen(&mut self, hw: &mut Machine) {
        if !self.video.kind.is_ega() {
            return;
        }
        self.hide_cursor(hw, self.fg_console);
    }

    pub fn unblank_screen(&mut self, hw: &mut Machine) {
        if !self.video.kind.is_ega() {
            return;
        }
        let cons = self.fg_console;
        self.set_cursor(hw, cons);
    }

    pub fn cursor_position(&self, cons: usize) -> (u32, u32) {
        (self.vc[cons].x, self.vc[cons].y)
    }

    pub fn attribute(&self, cons: usize) -> u8 {
        self.vc[cons].attr
    }

    pub fn origin(&self, cons: usize) -> u32 {
        self.vc[cons].origin
    }

    // --- interpreter ---

    fn put_byte(&mut self, hw: &mut Machine, tty: &mut Tty, cons: usize, c: u8) {
        // CAN and SUB abort any escape in progress
        if c == 24 || c == 26 {
            self.vc[cons].state = State::Normal;
        }
        match self.vc[cons].state {
            State::Normal => {
                let erase = tty.erase_char();
                self.do_normal(hw, cons, c, erase);
            }
            State::Escape => self.do_escape(hw, tty, cons, c),
            State::CsiEnter => {
                {
                    let vc = &mut self.vc[cons];
                    vc.par = [0; NPAR];
                    vc.npar = 0;
                    vc.state = State::CsiParams;
                    if c == b'[' {
                        vc.state = State::FuncKey;
                        return;
                    }
                    vc.ques = c == b'?';
                    if vc.ques {
                        return;
                    }
                }
                self.do_params(hw, cons, c);
            }
            State::CsiParams => self.do_params(hw, cons, c),
            State::FuncKey => self.vc[cons].state = State::Normal,
            State::SetTerm => {
                self.vc[cons].state = State::Normal;
                if c == b'S' {
                    let vc = &mut self.vc[cons];
                    vc.def_attr = vc.attr;
                    vc.erase_char = (vc.erase_char & 0x00ff) | u16::from(vc.def_attr) << 8;
                }
            }
            State::SetGraph => {
                self.vc[cons].state = State::Normal;
                if c == b'0' {
                    self.vc[cons].translate = Charset::Graphics;
                } else if c == b'B' {
                    self.vc[cons].translate = Charset::Normal;
                }
            }
            State::Discard => self.vc[cons].state = State::Normal,
        }
    }

    fn do_normal(&mut self, hw: &mut Machine, cons: usize, c: u8, erase: u8) {
        if c > 31 && c < 127 {
            let glyph = self.vc[cons].translate.table()[(c - 32) as usize];
            self.emit(hw, cons, glyph);
        } else if c == 27 {
            self.vc[cons].state = State::Escape;
        } else if c == 10 || c == 11 || c == 12 {
            self.lf(hw, cons);
        } else if c == 13 {
            self.cr(cons);
        } else if c == erase {
            self.del(hw, cons);
        } else if c == 8 {
            let vc = &mut self.vc[cons];
            if vc.x > 0 {
                vc.x -= 1;
                vc.pos -= 2;
            }
        } else if c == 9 {
            let columns = self.video.columns;
            let row_bytes = self.video.row_bytes;
            let n = 8 - (self.vc[cons].x & 7);
            self.vc[cons].x += n;
            self.vc[cons].pos += n << 1;
            if self.vc[cons].x > columns {
                self.vc[cons].x -= columns;
                self.vc[cons].pos -= row_bytes;
                self.lf(hw, cons);
            }
        } else if c == 7 {
            self.sysbeep(hw);
        } else if c == 14 {
            self.vc[cons].translate = Charset::Graphics;
        } else if c == 15 {
            self.vc[cons].translate = Charset::Normal;
        }
    }

    /// writes one glyph cell at the cursor, wrapping first when the
    /// cursor rests in the pre-wrap column
    fn emit(&mut self, hw: &mut Machine, cons: usize, glyph: u8) {
        let columns = self.video.columns;
        let row_bytes = self.video.row_bytes;
        if self.vc[cons].x >= columns {
            self.vc[cons].x -= columns;
            self.vc[cons].pos -= row_bytes;
            self.lf(hw, cons);
        }
        let vc = &mut self.vc[cons];
        let cell = u16::from(vc.attr) << 8 | u16::from(glyph);
        hw.memory.write_u16(vc.pos, cell);
        vc.pos += 2;
        vc.x += 1;
    }

    fn do_escape(&mut self, hw: &mut Machine, tty: &mut Tty, cons: usize, c: u8) {
        self.vc[cons].state = State::Normal;
        match c {
            b'[' => self.vc[cons].state = State::CsiEnter,
            b'E' => {
                let y = self.vc[cons].y;
                self.gotoxy(cons, 0, y + 1);
            }
            b'M' => self.ri(hw, cons),
            b'D' => self.lf(hw, cons),
            b'Z' => self.respond(hw, tty),
            b'7' => self.save_cur(cons),
            b'8' => self.restore_cur(cons),
            b'(' | b')' => self.vc[cons].state = State::SetGraph,
            b'P' => self.vc[cons].state = State::SetTerm,
            b'#' => self.vc[cons].state = State::Discard,
            b'c' => {
                tty.termios = Termios::console_default();
                let lines = self.video.lines;
                let vc = &mut self.vc[cons];
                vc.state = State::Normal;
                vc.ques = false;
                vc.top = 0;
                vc.bottom = lines;
            }
            _ => {}
        }
    }

    fn do_params(&mut self, hw: &mut Machine, cons: usize, c: u8) {
        if c == b';' && self.vc[cons].npar < NPAR - 1 {
            self.vc[cons].npar += 1;
        } else if c >= b'0' && c <= b'9' {
            let vc = &mut self.vc[cons];
            let n = vc.npar;
            vc.par[n] = vc.par[n].wrapping_mul(10).wrapping_add(u32::from(c - b'0'));
        } else {
            self.do_dispatch(hw, cons, c);
        }
    }

    fn do_dispatch(&mut self, hw: &mut Machine, cons: usize, c: u8) {
        self.vc[cons].state = State::Normal;
        if self.vc[cons].ques {
            self.vc[cons].ques = false;
            return;
        }
        let (x, y) = (self.vc[cons].x, self.vc[cons].y);
        let mut par0 = self.vc[cons].par[0];
        let par1 = self.vc[cons].par[1];
        match c {
            b'G' | b'`' => {
                if par0 > 0 {
                    par0 -= 1;
                }
                self.gotoxy(cons, par0, y);
            }
            b'A' => {
                if par0 == 0 {
                    par0 = 1;
                }
                self.gotoxy(cons, x, y.wrapping_sub(par0));
            }
            b'B' | b'e' => {
                if par0 == 0 {
                    par0 = 1;
                }
                self.gotoxy(cons, x, y.wrapping_add(par0));
            }
            b'C' | b'a' => {
                if par0 == 0 {
                    par0 = 1;
                }
                self.gotoxy(cons, x.wrapping_add(par0), y);
            }
            b'D' => {
                if par0 == 0 {
                    par0 = 1;
                }
                self.gotoxy(cons, x.wrapping_sub(par0), y);
            }
            b'E' => {
                if par0 == 0 {
                    par0 = 1;
                }
                self.gotoxy(cons, 0, y.wrapping_add(par0));
            }
            b'F' => {
                if par0 == 0 {
                    par0 = 1;
                }
                self.gotoxy(cons, 0, y.wrapping_sub(par0));
            }
            b'd' => {
                if par0 > 0 {
                    par0 -= 1;
                }
                self.gotoxy(cons, x, par0);
            }
            b'H' | b'f' => {
                if par0 > 0 {
                    par0 -= 1;
                }
                let mut col = par1;
                if col > 0 {
                    col -= 1;
                }
                self.gotoxy(cons, col, par0);
            }
            b'J' => self.csi_j(hw, cons, par0),
            b'K' => self.csi_k(hw, cons, par0),
            b'L' => self.csi_cap_l(hw, cons, par0),
            b'M' => self.csi_cap_m(hw, cons, par0),
            b'P' => self.csi_cap_p(hw, cons, par0),
            b'@' => self.csi_at(hw, cons, par0),
            b'm' => self.csi_m(cons),
            b'r' => {
                let lines = self.video.lines;
                if par0 > 0 {
                    par0 -= 1;
                }
                let mut bot = par1;
                if bot == 0 {
                    bot = lines;
                }
                if par0 < bot && bot <= lines {
                    let vc = &mut self.vc[cons];
                    vc.top = par0;
                    vc.bottom = bot;
                }
            }
            b's' => self.save_cur(cons),
            b'u' => self.restore_cur(cons),
            b'l' | b'b' => self.private_seq(cons, c),
            _ => {}
        }
    }

    /// `CSI n;n+13;n+17 l` sets the blank interval, `CSI k;k+13;k+17 b`
    /// the bold override; the offsets double as a checksum
    fn private_seq(&mut self, cons: usize, c: u8) {
        let vc = &self.vc[cons];
        let (p0, p1, p2) = (vc.par[0], vc.par[1], vc.par[2]);
        if vc.npar < 2 || p1.wrapping_sub(13) != p0 || p2.wrapping_sub(17) != p0 {
            return;
        }
        if c == b'l' && p0 <= 60 {
            self.blankinterval = HZ * 60 * p0;
            self.blankcount = self.blankinterval;
        }
        if c == b'b' {
            self.vc[cons].bold_attr = Some(p0 as u8);
        }
    }

    // --- cursor and scrolling ---

    /// x == columns is accepted, it is the legal pre-wrap position
    fn gotoxy(&mut self, cons: usize, new_x: u32, new_y: u32) {
        if new_x > self.video.columns || new_y >= self.video.lines {
            return;
        }
        let row_bytes = self.video.row_bytes;
        let vc = &mut self.vc[cons];
        vc.x = new_x;
        vc.y = new_y;
        vc.pos = vc.origin + new_y * row_bytes + (new_x << 1);
    }

    fn save_cur(&mut self, cons: usize) {
        let vc = &mut self.vc[cons];
        vc.saved_x = vc.x;
        vc.saved_y = vc.y;
    }

    fn restore_cur(&mut self, cons: usize) {
        let (x, y) = (self.vc[cons].saved_x, self.vc[cons].saved_y);
        self.gotoxy(cons, x, y);
    }

    fn lf(&mut self, hw: &mut Machine, cons: usize) {
        if self.vc[cons].y + 1 < self.vc[cons].bottom {
            self.vc[cons].y += 1;
            self.vc[cons].pos += self.video.row_bytes;
            return;
        }
        self.scrup(hw, cons);
    }

    fn ri(&mut self, hw: &mut Machine, cons: usize) {
        if self.vc[cons].y > self.vc[cons].top {
            self.vc[cons].y -= 1;
            self.vc[cons].pos -= self.video.row_bytes;
            return;
        }
        self.scrdown(hw, cons);
    }

    fn cr(&mut self, cons: usize) {
        let vc = &mut self.vc[cons];
        vc.pos -= vc.x << 1;
        vc.x = 0;
    }

    /// destructive backspace
    fn del(&mut self, hw: &mut Machine, cons: usize) {
        let vc = &mut self.vc[cons];
        if vc.x > 0 {
            vc.pos -= 2;
            vc.x -= 1;
            hw.memory.write_u16(vc.pos, vc.erase_char);
        }
    }

    fn scrup(&mut self, hw: &mut Machine, cons: usize) {
        let columns = self.video.columns;
        let lines = self.video.lines;
        let row_bytes = self.video.row_bytes;
        let (top, bottom) = (self.vc[cons].top, self.vc[cons].bottom);
        if bottom <= top {
            return;
        }
        if self.video.kind.is_ega() && top == 0 && bottom == lines {
            // fast scroll: slide the origin instead of the cells
            {
                let vc = &mut self.vc[cons];
                vc.origin += row_bytes;
                vc.pos += row_bytes;
                vc.scr_end += row_bytes;
                if vc.scr_end > vc.mem_end {
                    // out of window, rewind to the slice start
                    let visible = (lines - 1) * row_bytes;
                    hw.memory.copy_block(vc.origin, vc.mem_start, visible as usize);
                    hw.memory
                        .fill_u16(vc.mem_start + visible, vc.erase_char, columns as usize);
                    let slide = vc.origin - vc.mem_start;
                    vc.scr_end -= slide;
                    vc.pos -= slide;
                    vc.origin = vc.mem_start;
                } else {
                    hw.memory
                        .fill_u16(vc.scr_end - row_bytes, vc.erase_char, columns as usize);
                }
            }
            self.set_origin(hw, cons);
        } else {
            let vc = &self.vc[cons];
            hw.memory.copy_block(
                vc.origin + row_bytes * (top + 1),
                vc.origin + row_bytes * top,
                ((bottom - top - 1) * row_bytes) as usize,
            );
            hw.memory.fill_u16(
                vc.origin + row_bytes * (bottom - 1),
                vc.erase_char,
                columns as usize,
            );
        }
    }

    fn scrdown(&mut self, hw: &mut Machine, cons: usize) {
        let columns = self.video.columns;
        let row_bytes = self.video.row_bytes;
        let (top, bottom) = (self.vc[cons].top, self.vc[cons].bottom);
        if bottom <= top {
            return;
        }
        let vc = &self.vc[cons];
        hw.memory.copy_block(
            vc.origin + row_bytes * top,
            vc.origin + row_bytes * (top + 1),
            ((bottom - top - 1) * row_bytes) as usize,
        );
        hw.memory
            .fill_u16(vc.origin + row_bytes * top, vc.erase_char, columns as usize);
    }

    // --- erase, insert, delete ---

    fn csi_j(&mut self, hw: &mut Machine, cons: usize, vpar: u32) {
        let vc = &self.vc[cons];
        let (count, start) = match vpar {
            0 => ((vc.scr_end - vc.pos) >> 1, vc.pos),
            1 => ((vc.pos - vc.origin) >> 1, vc.origin),
            2 => (self.video.columns * self.video.lines, vc.origin),
            _ => return,
        };
        hw.memory.fill_u16(start, vc.erase_char, count as usize);
    }

    fn csi_k(&mut self, hw: &mut Machine, cons: usize, vpar: u32) {
        let columns = self.video.columns;
        let vc = &self.vc[cons];
        let (count, start) = match vpar {
            0 => {
                if vc.x >= columns {
                    return;
                }
                (columns - vc.x, vc.pos)
            }
            1 => (vc.x.min(columns), vc.pos - (vc.x << 1)),
            2 => (columns, vc.pos - (vc.x << 1)),
            _ => return,
        };
        hw.memory.fill_u16(start, vc.erase_char, count as usize);
    }

    fn insert_char(&mut self, hw: &mut Machine, cons: usize) {
        let columns = self.video.columns;
        let vc = &self.vc[cons];
        let mut i = vc.x;
        let mut old = vc.erase_char;
        let mut p = vc.pos;
        while i < columns {
            let tmp = hw.memory.read_u16(p);
            hw.memory.write_u16(p, old);
            old = tmp;
            p += 2;
            i += 1;
        }
    }

    fn delete_char(&mut self, hw: &mut Machine, cons: usize) {
        let columns = self.video.columns;
        let vc = &self.vc[cons];
        if vc.x >= columns {
            return;
        }
        let mut i = vc.x;
        let mut p = vc.pos;
        while i + 1 < columns {
            let next = hw.memory.read_u16(p + 2);
            hw.memory.write_u16(p, next);
            p += 2;
            i += 1;
        }
        hw.memory.write_u16(p, vc.erase_char);
    }

    /// scrolls [y, lines) down one row, opening a row at the cursor
    fn insert_line(&mut self, hw: &mut Machine, cons: usize) {
        let lines = self.video.lines;
        let (old_top, old_bottom) = (self.vc[cons].top, self.vc[cons].bottom);
        self.vc[cons].top = self.vc[cons].y;
        self.vc[cons].bottom = lines;
        self.scrdown(hw, cons);
        self.vc[cons].top = old_top;
        self.vc[cons].bottom = old_bottom;
    }

    /// scrolls [y, lines) up one row, dropping the cursor row
    fn delete_line(&mut self, hw: &mut Machine, cons: usize) {
        let lines = self.video.lines;
        let (old_top, old_bottom) = (self.vc[cons].top, self.vc[cons].bottom);
        self.vc[cons].top = self.vc[cons].y;
        self.vc[cons].bottom = lines;
        self.scrup(hw, cons);
        self.vc[cons].top = old_top;
        self.vc[cons].bottom = old_bottom;
    }

    fn csi_at(&mut self, hw: &mut Machine, cons: usize, nr: u32) {
        let mut nr = nr;
        if nr > self.video.columns {
            nr = self.video.columns;
        } else if nr == 0 {
            nr = 1;
        }
        while nr > 0 {
            self.insert_char(hw, cons);
            nr -= 1;
        }
    }

    fn csi_cap_l(&mut self, hw: &mut Machine, cons: usize, nr: u32) {
        let mut nr = nr;
        if nr > self.video.lines {
            nr = self.video.lines;
        } else if nr == 0 {
            nr = 1;
        }
        while nr > 0 {
            self.insert_line(hw, cons);
            nr -= 1;
        }
    }

    fn csi_cap_p(&mut self, hw: &mut Machine, cons: usize, nr: u32) {
        let mut nr = nr;
        if nr > self.video.columns {
            nr = self.video.columns;
        } else if nr == 0 {
            nr = 1;
        }
        while nr > 0 {
            self.delete_char(hw, cons);
            nr -= 1;
        }
    }

    fn csi_cap_m(&mut self, hw: &mut Machine, cons: usize, nr: u32) {
        let mut nr = nr;
        if nr > self.video.lines {
            nr = self.video.lines;
        } else if nr == 0 {
            nr = 1;
        }
        while nr > 0 {
            self.delete_line(hw, cons);
            nr -= 1;
        }
    }

    // --- attributes ---

    fn csi_m(&mut self, cons: usize) {
        let can_do_colour = self.video.can_do_colour;
        let vc = &mut self.vc[cons];
        for i in 0..=vc.npar {
            match vc.par[i] {
                0 => vc.attr = vc.def_attr,
                1 => {
                    vc.attr = if vc.iscolor {
                        vc.attr | 0x08
                    } else {
                        vc.attr | 0x0f
                    };
                }
                4 => {
                    if !can_do_colour {
                        vc.attr |= 0x01;
                    } else if let Some(bold) = vc.bold_attr {
                        vc.attr = (bold & 0x0f) | (vc.attr & 0xf0);
                    } else {
                        // complement the foreground, nudging it off the
                        // background when they collide
                        let newattr = (vc.attr & 0xf0) | (0x0f & !vc.attr);
                        vc.attr = if newattr & 0x0f == (vc.attr >> 4) & 0x0f {
                            (vc.attr & 0xf0) | (((vc.attr & 0x0f) + 1) % 0x0f)
                        } else {
                            newattr
                        };
                    }
                }
                5 => vc.attr |= 0x80,
                7 => vc.attr = vc.attr << 4 | vc.attr >> 4,
                22 => vc.attr &= 0xf7,
                24 => vc.attr &= 0xfe,
                25 => vc.attr &= 0x7f,
                27 => vc.attr = vc.def_attr,
                39 => vc.attr = (vc.attr & 0xf0) | (vc.def_attr & 0x0f),
                49 => vc.attr = (vc.attr & 0x0f) | (vc.def_attr & 0xf0),
                p => {
                    if !can_do_colour {
                        continue;
                    }
                    if p >= 30 && p <= 38 {
                        vc.iscolor = true;
                        vc.attr = (vc.attr & 0xf0) | (p - 30) as u8;
                    } else if p >= 40 && p <= 48 {
                        vc.iscolor = true;
                        vc.attr = (vc.attr & 0x0f) | (((p - 40) as u8) << 4);
                    }
                }
            }
        }
    }

    // --- CRTC programming and beep ---

    /// reprograms the CRTC start address; EGA-class foreground
    /// consoles only. The index/data pair must not be split by the
    /// keyboard interrupt.
    fn set_origin(&mut self, hw: &mut Machine, cons: usize) {
        if !self.video.kind.is_ega() {
            return;
        }
        if cons != self.fg_console {
            return;
        }
        let offset = self.vc[cons].origin - self.video.mem_base;
        hw.cli();
        hw.outb_p(self.video.port_reg, 12);
        hw.outb_p(self.video.port_val, (offset >> 9) as u8);
        hw.outb_p(self.video.port_reg, 13);
        hw.outb_p(self.video.port_val, (offset >> 1) as u8);
        hw.sti();
    }

    fn set_cursor(&mut self, hw: &mut Machine, cons: usize) {
        self.blankcount = self.blankinterval;
        if cons != self.fg_console {
            return;
        }
        let offset = self.vc[cons].pos - self.video.mem_base;
        hw.cli();
        hw.outb_p(self.video.port_reg, 14);
        hw.outb_p(self.video.port_val, (offset >> 9) as u8);
        hw.outb_p(self.video.port_reg, 15);
        hw.outb_p(self.video.port_val, (offset >> 1) as u8);
        hw.sti();
    }

    /// parks the hardware cursor past the visible screen
    fn hide_cursor(&mut self, hw: &mut Machine, cons: usize) {
        let offset = self.vc[cons].scr_end - self.video.mem_base;
        hw.cli();
        hw.outb_p(self.video.port_reg, 14);
        hw.outb_p(self.video.port_val, (offset >> 9) as u8);
        hw.outb_p(self.video.port_reg, 15);
        hw.outb_p(self.video.port_val, (offset >> 1) as u8);
        hw.sti();
    }

    /// queues the vt100 identify response on the tty's raw input queue
    fn respond(&self, hw: &mut Machine, tty: &mut Tty) {
        hw.cli();
        for &b in RESPONSE {
            tty.read_q.put_char(b);
        }
        hw.sti();
        tty.copy_to_cooked();
    }

    /// 750 Hz on PIT counter 2, gated on through PPI port B
    fn sysbeep(&mut self, hw: &mut Machine) {
        let a = hw.inb_p(0x61);
        hw.outb_p(0x61, a | 3);
        // counter 2, lobyte/hibyte, square wave
        hw.outb_p(0x43, 0xb6);
        hw.outb_p(0x42, 0x37);
        hw.outb(0x42, 0x06);
        self.beepcount = HZ / 8;
    }
}
