//! Flow 5-tuple.

use std::net::IpAddr;

use super::Protocol;
use crate::error::FlowError;

/// A flow's endpoints and transport protocol.
///
/// The two sides carry no inherent order: `a` is whatever side the log
/// recorded first. Hashing canonicalizes the direction. For ICMP and
/// ICMPv6 the port slots hold the message type (`port_a`) and code
/// (`port_b`), which is how Zeek records them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowTuple {
    pub protocol: Protocol,
    pub addr_a: IpAddr,
    pub addr_b: IpAddr,
    pub port_a: Option<u16>,
    pub port_b: Option<u16>,
}

impl FlowTuple {
    pub fn new(
        protocol: Protocol,
        addr_a: IpAddr,
        addr_b: IpAddr,
        port_a: Option<u16>,
        port_b: Option<u16>,
    ) -> Self {
        Self {
            protocol,
            addr_a,
            addr_b,
            port_a,
            port_b,
        }
    }

    /// TCP tuple from source to destination.
    pub fn tcp(src: IpAddr, dst: IpAddr, src_port: u16, dst_port: u16) -> Self {
        Self::new(Protocol::Tcp, src, dst, Some(src_port), Some(dst_port))
    }

    /// UDP tuple from source to destination.
    pub fn udp(src: IpAddr, dst: IpAddr, src_port: u16, dst_port: u16) -> Self {
        Self::new(Protocol::Udp, src, dst, Some(src_port), Some(dst_port))
    }

    /// ICMP or ICMPv6 tuple (picked from the address family) with type and code.
    pub fn icmp(src: IpAddr, dst: IpAddr, message_type: u8, code: u8) -> Self {
        let protocol = if src.is_ipv6() {
            Protocol::Icmpv6
        } else {
            Protocol::Icmp
        };
        Self::new(
            protocol,
            src,
            dst,
            Some(message_type as u16),
            Some(code as u16),
        )
    }

    /// Build a tuple from the textual fields of a log record.
    ///
    /// The protocol name is resolved against the address family, so a Zeek
    /// `icmp` record between IPv6 hosts becomes ICMPv6.
    pub fn from_strs(
        proto: &str,
        addr_a: &str,
        addr_b: &str,
        port_a: Option<u16>,
        port_b: Option<u16>,
    ) -> Result<Self, FlowError> {
        let addr_a = parse_addr(addr_a)?;
        let addr_b = parse_addr(addr_b)?;
        let protocol = Protocol::from_name(proto, addr_a.is_ipv6())?;
        Ok(Self::new(protocol, addr_a, addr_b, port_a, port_b))
    }

    /// The same flow seen from the other side.
    ///
    /// For ICMP the port slots are (type, code): the reverse of a request is
    /// its response type with the same code. One-way ICMP types keep their
    /// type and only the addresses swap.
    pub fn reverse(&self) -> Self {
        if self.protocol.is_icmp() {
            let port_a = self.port_a.map(|t| {
                u8::try_from(t)
                    .ok()
                    .and_then(|t| self.protocol.icmp_counterpart(t))
                    .map_or(t, u16::from)
            });
            return Self {
                addr_a: self.addr_b,
                addr_b: self.addr_a,
                port_a,
                ..*self
            };
        }
        Self {
            protocol: self.protocol,
            addr_a: self.addr_b,
            addr_b: self.addr_a,
            port_a: self.port_b,
            port_b: self.port_a,
        }
    }

    /// Check that the tuple can be hashed.
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.addr_a.is_ipv4() != self.addr_b.is_ipv4() {
            return Err(FlowError::invalid(format!(
                "mixed address families: {} and {}",
                self.addr_a, self.addr_b
            )));
        }
        if self.port_a.is_none() || self.port_b.is_none() {
            return Err(FlowError::invalid(format!(
                "{} flow requires both ports",
                self.protocol
            )));
        }
        if self.protocol.is_icmp() {
            for value in [self.port_a, self.port_b].into_iter().flatten() {
                if value > u8::MAX as u16 {
                    return Err(FlowError::invalid(format!(
                        "{} type/code out of range: {value}",
                        self.protocol
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_addr(text: &str) -> Result<IpAddr, FlowError> {
    text.trim()
        .parse()
        .map_err(|_| FlowError::InvalidAddress(text.to_string()))
}
