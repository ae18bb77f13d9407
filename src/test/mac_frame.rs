use crate::engine::{ETH_HEADER_LEN, Frame, MacAddr};

#[test]
fn mac_addr_parses_colon_and_dash_forms() {
    let mac: MacAddr = "02:54:00:00:00:0a".parse().expect("mac");
    assert_eq!(mac, MacAddr([0x02, 0x54, 0, 0, 0, 0x0a]));
    assert_eq!("02-54-00-00-00-0A".parse::<MacAddr>(), Ok(mac));
    assert_eq!(mac.to_string(), "02:54:00:00:00:0a");

    assert!("02:54:00:00:00".parse::<MacAddr>().is_err());
    assert!("02:54:00:00:00:00:01".parse::<MacAddr>().is_err());
    assert!("02:54:00:00:00:zz".parse::<MacAddr>().is_err());
}

#[test]
fn group_bit_marks_broadcast_and_multicast() {
    assert!(MacAddr::BROADCAST.is_group());
    assert!(MacAddr::BROADCAST.is_broadcast());
    assert!(MacAddr([0x01, 0x00, 0x5e, 0, 0, 1]).is_group());
    assert!(!MacAddr([0x02, 0, 0, 0, 0, 1]).is_group());
}

#[test]
fn frame_header_accessors_rewrite_addresses_in_place() {
    let a = MacAddr([0, 0, 0, 0, 0, 1]);
    let b = MacAddr([0, 0, 0, 0, 0, 2]);
    let mut f = Frame::ethernet(a, b, 0x0800, b"payload");
    assert_eq!(f.len(), ETH_HEADER_LEN + 7);
    assert!(f.is_valid());
    assert_eq!((f.dst(), f.src()), (a, b));

    f.set_dst(b);
    f.set_src(a);
    assert_eq!((f.dst(), f.src()), (b, a));
    assert_eq!(&f.as_bytes()[12..14], &[0x08, 0x00]);
    assert_eq!(&f.as_bytes()[ETH_HEADER_LEN..], b"payload");
}

#[test]
fn short_frames_are_not_valid_ethernet() {
    assert!(!Frame::new(vec![0; ETH_HEADER_LEN - 1]).is_valid());
    assert!(Frame::new(vec![0; ETH_HEADER_LEN]).is_valid());
}
