//! Subnets, pools and leases
//!
//! Read-only views of the host server's subnet configuration and of the
//! lease it tentatively picked, plus the pool membership check every
//! enforcement stage relies on.

use crate::config::PolicyConfig;
use crate::packet::HwAddr;
use serde::Deserialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Identifier of a configured subnet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct SubnetId(pub u32);

impl From<u32> for SubnetId {
    fn from(value: u32) -> Self {
        SubnetId(value)
    }
}

impl fmt::Display for SubnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two subnets this policy steers clients into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubnetRole {
    /// Clients with a hardware-address reservation
    Registered,
    /// Clients without one
    Unregistered,
}

impl SubnetRole {
    /// Configured subnet id for this role
    pub fn subnet_id(&self, config: &PolicyConfig) -> SubnetId {
        match self {
            SubnetRole::Registered => config.registered_subnet_id,
            SubnetRole::Unregistered => config.unregistered_subnet_id,
        }
    }
}

impl fmt::Display for SubnetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubnetRole::Registered => f.write_str("registered"),
            SubnetRole::Unregistered => f.write_str("unregistered"),
        }
    }
}

/// Inclusive address range a subnet allocates from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pool4 {
    pub first: Ipv4Addr,
    pub last: Ipv4Addr,
}

impl Pool4 {
    /// Create a pool covering `first..=last`
    pub fn new(first: Ipv4Addr, last: Ipv4Addr) -> Self {
        Self { first, last }
    }

    /// Check if `addr` lies within the pool bounds
    ///
    /// A pool with `first > last` contains nothing.
    pub fn in_range(&self, addr: Ipv4Addr) -> bool {
        let addr = u32::from(addr);
        u32::from(self.first) <= addr && addr <= u32::from(self.last)
    }
}

impl fmt::Display for Pool4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.first, self.last)
    }
}

/// Check if `addr` belongs to any of `pools`
pub fn in_any_pool(pools: &[Pool4], addr: Ipv4Addr) -> bool {
    pools.iter().any(|pool| pool.in_range(addr))
}

/// A configured IPv4 subnet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet4 {
    pub id: SubnetId,
    pub network: Ipv4Addr,
    pub prefix_len: u8,
    pub pools: Vec<Pool4>,
}

impl Subnet4 {
    /// Create a subnet with no pools
    pub fn new(id: impl Into<SubnetId>, network: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            id: id.into(),
            network,
            prefix_len,
            pools: Vec::new(),
        }
    }

    /// Add an address pool
    pub fn with_pool(mut self, first: Ipv4Addr, last: Ipv4Addr) -> Self {
        self.pools.push(Pool4::new(first, last));
        self
    }

    /// Check if `addr` may be assigned from this subnet
    pub fn in_pool(&self, addr: Ipv4Addr) -> bool {
        in_any_pool(&self.pools, addr)
    }
}

impl fmt::Display for Subnet4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} (id {})", self.network, self.prefix_len, self.id)
    }
}

/// Subnets offered by the host as candidates for a packet
pub type SubnetCollection = Vec<Arc<Subnet4>>;

/// Find a subnet by id
pub fn find_subnet(subnets: &[Arc<Subnet4>], id: SubnetId) -> Option<&Arc<Subnet4>> {
    subnets.iter().find(|s| s.id == id)
}

/// A lease the host has tentatively picked or is renewing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease4 {
    pub addr: Ipv4Addr,
    pub hwaddr: Option<HwAddr>,
    pub subnet_id: SubnetId,
}

impl Lease4 {
    /// Create a lease for `addr` in `subnet_id`
    pub fn new(addr: Ipv4Addr, subnet_id: impl Into<SubnetId>) -> Self {
        Self {
            addr,
            hwaddr: None,
            subnet_id: subnet_id.into(),
        }
    }

    /// Set the hardware address recorded on the lease
    pub fn with_hwaddr(mut self, hwaddr: HwAddr) -> Self {
        self.hwaddr = Some(hwaddr);
        self
    }
}
