//! Transport protocols covered by the community id protocol table.

use std::fmt;

use crate::error::FlowError;

/// IP protocol number for ICMP.
pub const IP_PROTO_ICMP: u8 = 1;
/// IP protocol number for TCP.
pub const IP_PROTO_TCP: u8 = 6;
/// IP protocol number for UDP.
pub const IP_PROTO_UDP: u8 = 17;
/// IP protocol number for ICMPv6.
pub const IP_PROTO_ICMPV6: u8 = 58;
/// IP protocol number for SCTP.
pub const IP_PROTO_SCTP: u8 = 132;

/// ICMP type constants with a request/response counterpart.
pub mod icmp_type {
    pub const ECHO_REPLY: u8 = 0;
    pub const ROUTER_ADVERTISEMENT: u8 = 9;
    pub const ROUTER_SOLICITATION: u8 = 10;
    pub const ECHO_REQUEST: u8 = 8;
    pub const TIMESTAMP_REQUEST: u8 = 13;
    pub const TIMESTAMP_REPLY: u8 = 14;
    pub const INFO_REQUEST: u8 = 15;
    pub const INFO_REPLY: u8 = 16;
    pub const MASK_REQUEST: u8 = 17;
    pub const MASK_REPLY: u8 = 18;
}

/// ICMPv6 type constants with a request/response counterpart.
pub mod icmpv6_type {
    pub const ECHO_REQUEST: u8 = 128;
    pub const ECHO_REPLY: u8 = 129;
    pub const MLD_LISTENER_QUERY: u8 = 130;
    pub const MLD_LISTENER_REPORT: u8 = 131;
    pub const ROUTER_SOLICITATION: u8 = 133;
    pub const ROUTER_ADVERTISEMENT: u8 = 134;
    pub const NEIGHBOR_SOLICITATION: u8 = 135;
    pub const NEIGHBOR_ADVERTISEMENT: u8 = 136;
    pub const WRU_REQUEST: u8 = 139;
    pub const WRU_REPLY: u8 = 140;
    pub const HAAD_REQUEST: u8 = 144;
    pub const HAAD_REPLY: u8 = 145;
}

/// Transport protocol of a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Icmp,
    Tcp,
    Udp,
    Icmpv6,
    Sctp,
}

impl Protocol {
    /// IANA protocol number, as it appears in the hash input.
    pub fn number(&self) -> u8 {
        match self {
            Protocol::Icmp => IP_PROTO_ICMP,
            Protocol::Tcp => IP_PROTO_TCP,
            Protocol::Udp => IP_PROTO_UDP,
            Protocol::Icmpv6 => IP_PROTO_ICMPV6,
            Protocol::Sctp => IP_PROTO_SCTP,
        }
    }

    /// Look up a protocol by IANA number.
    pub fn from_number(number: u8) -> Result<Self, FlowError> {
        match number {
            IP_PROTO_ICMP => Ok(Protocol::Icmp),
            IP_PROTO_TCP => Ok(Protocol::Tcp),
            IP_PROTO_UDP => Ok(Protocol::Udp),
            IP_PROTO_ICMPV6 => Ok(Protocol::Icmpv6),
            IP_PROTO_SCTP => Ok(Protocol::Sctp),
            other => Err(FlowError::UnsupportedProtocol(other.to_string())),
        }
    }

    /// Parse a protocol as written in a log's `proto` field.
    ///
    /// Accepts names (`tcp`, `udp`, `icmp`, `icmp6`, `ipv6-icmp`, `sctp`,
    /// case-insensitive) and decimal protocol numbers. Zeek writes `icmp` for
    /// both ICMP versions, so `icmp` resolves to ICMPv6 when `ipv6` is set.
    pub fn from_name(name: &str, ipv6: bool) -> Result<Self, FlowError> {
        let name = name.trim();
        if let Ok(number) = name.parse::<u8>() {
            return Self::from_number(number);
        }

        match name.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            "sctp" => Ok(Protocol::Sctp),
            "icmp" if ipv6 => Ok(Protocol::Icmpv6),
            "icmp" => Ok(Protocol::Icmp),
            "icmp6" | "icmpv6" | "ipv6-icmp" => Ok(Protocol::Icmpv6),
            _ => Err(FlowError::UnsupportedProtocol(name.to_string())),
        }
    }

    /// Whether the port slots hold ICMP type and code.
    pub fn is_icmp(&self) -> bool {
        matches!(self, Protocol::Icmp | Protocol::Icmpv6)
    }

    /// Counterpart of an ICMP message type (request <-> response), if any.
    pub fn icmp_counterpart(&self, message_type: u8) -> Option<u8> {
        match self {
            Protocol::Icmp => {
                use icmp_type::*;
                match message_type {
                    ECHO_REQUEST => Some(ECHO_REPLY),
                    ECHO_REPLY => Some(ECHO_REQUEST),
                    TIMESTAMP_REQUEST => Some(TIMESTAMP_REPLY),
                    TIMESTAMP_REPLY => Some(TIMESTAMP_REQUEST),
                    INFO_REQUEST => Some(INFO_REPLY),
                    INFO_REPLY => Some(INFO_REQUEST),
                    ROUTER_SOLICITATION => Some(ROUTER_ADVERTISEMENT),
                    ROUTER_ADVERTISEMENT => Some(ROUTER_SOLICITATION),
                    MASK_REQUEST => Some(MASK_REPLY),
                    MASK_REPLY => Some(MASK_REQUEST),
                    _ => None,
                }
            }
            Protocol::Icmpv6 => {
                use icmpv6_type::*;
                match message_type {
                    ECHO_REQUEST => Some(ECHO_REPLY),
                    ECHO_REPLY => Some(ECHO_REQUEST),
                    MLD_LISTENER_QUERY => Some(MLD_LISTENER_REPORT),
                    MLD_LISTENER_REPORT => Some(MLD_LISTENER_QUERY),
                    ROUTER_SOLICITATION => Some(ROUTER_ADVERTISEMENT),
                    ROUTER_ADVERTISEMENT => Some(ROUTER_SOLICITATION),
                    NEIGHBOR_SOLICITATION => Some(NEIGHBOR_ADVERTISEMENT),
                    NEIGHBOR_ADVERTISEMENT => Some(NEIGHBOR_SOLICITATION),
                    WRU_REQUEST => Some(WRU_REPLY),
                    WRU_REPLY => Some(WRU_REQUEST),
                    HAAD_REQUEST => Some(HAAD_REPLY),
                    HAAD_REPLY => Some(HAAD_REQUEST),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Icmp => write!(f, "icmp"),
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
            Protocol::Icmpv6 => write!(f, "icmp6"),
            Protocol::Sctp => write!(f, "sctp"),
        }
    }
}
