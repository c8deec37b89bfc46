//! Community ID v1 flow hashing.
//!
//! Implements the published Community ID specification: the tuple is put in
//! a canonical direction, serialized into a fixed binary layout, hashed with
//! SHA-1 and rendered as `1:<base64>`. Output is bit-compatible with Zeek,
//! Suricata and the reference implementations, so retrofitted logs join with
//! logs that were written with the id from the start.

use std::fmt;
use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::digest::{digest, SHA1_FOR_LEGACY_USE_ONLY};

use super::FlowTuple;
use crate::error::FlowError;

/// Version tag prefixed to every id.
pub const COMMUNITY_ID_VERSION: u8 = 1;

/// A flow correlation id in its textual form, e.g. `1:LQU9qZlK+B5F3KDmev6m5PMibrg=`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap an id taken verbatim from a log record.
    pub fn from_existing(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Community ID hasher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommunityId {
    seed: u16,
}

impl CommunityId {
    /// Create a hasher with the given seed. Zeek and Suricata default to 0.
    pub fn new(seed: u16) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u16 {
        self.seed
    }

    /// Compute the correlation id of a flow.
    pub fn compute(&self, tuple: &FlowTuple) -> Result<CorrelationId, FlowError> {
        let input = self.hash_input(tuple)?;
        let hash = digest(&SHA1_FOR_LEGACY_USE_ONLY, &input);
        Ok(CorrelationId(format!(
            "{}:{}",
            COMMUNITY_ID_VERSION,
            BASE64.encode(hash.as_ref())
        )))
    }

    /// Serialize a tuple into the bytes that get hashed.
    ///
    /// Layout: seed (u16 BE), originator address, responder address,
    /// protocol number, one zero pad byte, originator port (u16 BE),
    /// responder port (u16 BE).
    pub fn hash_input(&self, tuple: &FlowTuple) -> Result<Vec<u8>, FlowError> {
        tuple.validate()?;
        let endpoints = Endpoints::canonical(tuple)?;

        let mut buf = Vec::with_capacity(2 + 16 + 16 + 2 + 4);
        buf.extend_from_slice(&self.seed.to_be_bytes());
        buf.extend_from_slice(&endpoints.addr_a);
        buf.extend_from_slice(&endpoints.addr_b);
        buf.push(tuple.protocol.number());
        buf.push(0);
        buf.extend_from_slice(&endpoints.port_a.to_be_bytes());
        buf.extend_from_slice(&endpoints.port_b.to_be_bytes());
        Ok(buf)
    }
}

/// Endpoints in hash order, addresses in network byte order.
struct Endpoints {
    addr_a: Vec<u8>,
    addr_b: Vec<u8>,
    port_a: u16,
    port_b: u16,
}

impl Endpoints {
    fn canonical(tuple: &FlowTuple) -> Result<Self, FlowError> {
        let (port_a, port_b) = match (tuple.port_a, tuple.port_b) {
            (Some(a), Some(b)) => (a, b),
            _ => return Err(FlowError::invalid("missing ports")),
        };

        // ICMP: (type, code) becomes (type, counterpart type) for
        // request/response messages; everything else is one-way.
        let (port_a, port_b, one_way) = if tuple.protocol.is_icmp() {
            let message_type = u8::try_from(port_a)
                .map_err(|_| FlowError::invalid(format!("ICMP type out of range: {port_a}")))?;
            match tuple.protocol.icmp_counterpart(message_type) {
                Some(counterpart) => (port_a, u16::from(counterpart), false),
                None => (port_a, port_b, true),
            }
        } else {
            (port_a, port_b, false)
        };

        let addr_a = addr_bytes(&tuple.addr_a);
        let addr_b = addr_bytes(&tuple.addr_b);

        let ordered = one_way || addr_a < addr_b || (addr_a == addr_b && port_a < port_b);
        if ordered {
            Ok(Self {
                addr_a,
                addr_b,
                port_a,
                port_b,
            })
        } else {
            Ok(Self {
                addr_a: addr_b,
                addr_b: addr_a,
                port_a: port_b,
                port_b: port_a,
            })
        }
    }
}

fn addr_bytes(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}
