use super::*;

#[test]
fn queue_is_fifo() {
    let mut q = TtyQueue::new();
    assert!(q.is_empty());
    q.put_char(b'a');
    q.put_char(b'b');
    assert_eq!(2, q.chars());
    assert_eq!(Some(b'a'), q.get_char());
    assert_eq!(Some(b'b'), q.get_char());
    assert_eq!(None, q.get_char());
}

#[test]
fn full_queue_drops_new_bytes() {
    let mut q = TtyQueue::new();
    for i in 0..2000 {
        q.put_char(i as u8);
    }
    assert!(q.is_full());
    assert_eq!(TTY_BUF_SIZE - 1, q.chars());
    assert_eq!(Some(0), q.get_char());
}

#[test]
fn erase_char_comes_from_termios() {
    let tty = Tty::new(0);
    assert_eq!(0x7f, tty.erase_char());
}
