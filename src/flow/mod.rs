//! Flow tuples and Community ID hashing.
//!
//! Pure code, no I/O. [`CommunityId::compute`] turns a [`FlowTuple`] into a
//! [`CorrelationId`] that is identical for both directions of a flow.

mod community_id;
mod protocol;
mod tuple;

pub use community_id::{CommunityId, CorrelationId, COMMUNITY_ID_VERSION};
pub use protocol::{icmp_type, icmpv6_type, Protocol};
pub use tuple::FlowTuple;
