use std::net::Ipv4Addr;

use crate::net::{FiveTuple, PROTO_UDP};

fn tuple() -> FiveTuple {
    FiveTuple::udp(Ipv4Addr::new(11, 0, 0, 1), Ipv4Addr::new(11, 0, 5, 1), 4000, 80)
}

#[test]
fn flow_key_is_direction_sensitive() {
    let t = tuple();
    assert_eq!(t.protocol, PROTO_UDP);
    assert_eq!(t.flow_key(), tuple().flow_key());
    assert_ne!(t.flow_key(), t.reversed().flow_key());
    assert_eq!(t.reversed().reversed(), t);
}

#[test]
fn flow_key_changes_with_any_field() {
    let base = tuple();
    let mut other = base;
    other.src_port += 1;
    assert_ne!(base.flow_key(), other.flow_key());

    let mut other = base;
    other.protocol = 0x06;
    assert_ne!(base.flow_key(), other.flow_key());

    let mut other = base;
    other.dst_ip = Ipv4Addr::new(11, 0, 6, 1);
    assert_ne!(base.flow_key(), other.flow_key());
}

#[test]
fn hash_bytes_layout_is_addresses_then_packed_ports() {
    let b = tuple().hash_bytes();
    assert_eq!(&b[0..4], &u32::from(Ipv4Addr::new(11, 0, 0, 1)).to_le_bytes());
    assert_eq!(&b[4..8], &u32::from(Ipv4Addr::new(11, 0, 5, 1)).to_le_bytes());
    let ports = 4000u32 | (80u32 << 16);
    assert_eq!(&b[8..12], &ports.to_le_bytes());
}
