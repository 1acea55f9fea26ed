use crate::console::crtc::CRTC;
use crate::machine::Component;

#[test]
fn indexed_writes_land_in_named_registers() {
    let mut crtc = CRTC::default();
    crtc.out_u8(0x3d4, 12);
    crtc.out_u8(0x3d5, 0x01);
    crtc.out_u8(0x3d4, 13);
    crtc.out_u8(0x3d5, 0x40);
    assert_eq!(0x0140, crtc.start_address());

    crtc.out_u8(0x3b4, 14);
    crtc.out_u8(0x3b5, 0x02);
    crtc.out_u8(0x3b4, 15);
    crtc.out_u8(0x3b5, 0x80);
    assert_eq!(0x0280, crtc.cursor_location());
}

#[test]
fn data_port_reads_back_the_indexed_register() {
    let mut crtc = CRTC::default();
    crtc.out_u8(0x3d4, 15);
    crtc.out_u8(0x3d5, 0x77);
    assert_eq!(Some(0x77), crtc.in_u8(0x3d5));
}
