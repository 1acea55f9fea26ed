use crate::pit::PIT;

#[test]
fn control_word_selects_channel_and_access() {
    let mut pit = PIT::new();
    // counter 2, lobyte/hibyte, mode 3 (square wave)
    pit.set_mode_command(0xb6);
    pit.counter2.write_reload_part(0x37);
    pit.counter2.write_reload_part(0x06);
    assert_eq!(0x0637, pit.counter2.reload);
    assert_eq!(0, pit.counter0.reload);
}

#[test]
fn reload_write_alternates_bytes() {
    let mut pit = PIT::new();
    pit.set_mode_command(0x36); // counter 0, lobyte/hibyte
    pit.counter0.write_reload_part(0xcd);
    pit.counter0.write_reload_part(0xab);
    assert_eq!(0xabcd, pit.counter0.reload);

    pit.counter0.write_reload_part(0x11);
    assert_eq!(0xab11, pit.counter0.reload);
}

#[test]
fn latch_command_freezes_read_value() {
    let mut pit = PIT::new();
    pit.set_mode_command(0x36);
    pit.counter0.count = 0x1234;
    pit.set_mode_command(0x06); // counter 0, latch
    pit.counter0.count = 0x5678;
    assert_eq!(0x34, pit.counter0.read_next_part());
    assert_eq!(0x12, pit.counter0.read_next_part());
}
