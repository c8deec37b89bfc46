//! Fuzz target for community id hashing.
//!
//! Both directions of a flow must hash to the same id, except one-way
//! ICMP messages, which have no reverse direction.

#![no_main]

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use cidretro::flow::{CommunityId, FlowTuple, Protocol};
use libfuzzer_sys::fuzz_target;

fn addr(bytes: &[u8], v6: bool) -> Option<IpAddr> {
    if v6 {
        let octets: [u8; 16] = bytes.get(..16)?.try_into().ok()?;
        Some(IpAddr::V6(Ipv6Addr::from(octets)))
    } else {
        let octets: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        Some(IpAddr::V4(Ipv4Addr::from(octets)))
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let (head, rest) = data.split_at(8);
    let seed = u16::from_be_bytes([head[0], head[1]]);
    let Ok(protocol) = Protocol::from_number(head[2]) else {
        return;
    };
    let v6 = head[3] & 1 == 1;
    let port_a = u16::from_be_bytes([head[4], head[5]]);
    let port_b = u16::from_be_bytes([head[6], head[7]]);

    let width = if v6 { 16 } else { 4 };
    let Some(addr_a) = addr(rest, v6) else {
        return;
    };
    let Some(addr_b) = rest.get(width..).and_then(|b| addr(b, v6)) else {
        return;
    };

    let one_way = protocol.is_icmp()
        && u8::try_from(port_a).map_or(true, |t| protocol.icmp_counterpart(t).is_none());

    let tuple = FlowTuple::new(protocol, addr_a, addr_b, Some(port_a), Some(port_b));
    let hasher = CommunityId::new(seed);
    let forward = hasher.compute(&tuple);
    let backward = hasher.compute(&tuple.reverse());

    match (forward, backward) {
        (Ok(f), Ok(b)) => {
            assert!(f.as_str().starts_with("1:"));
            if !one_way {
                assert_eq!(f, b);
            }
        }
        (Err(_), Err(_)) => {}
        (f, b) => panic!("direction changed validity: {f:?} vs {b:?}"),
    }
});
