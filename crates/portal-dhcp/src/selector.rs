//! Subnet selection
//!
//! Runs before the host allocates anything. Registered clients are placed
//! in the registered subnet and everyone else in the unregistered one; a
//! DHCPREQUEST for an address outside the chosen subnet's pools is answered
//! with a NAK straight away.

use crate::config::PolicyConfig;
use crate::packet::{NakBuilder, Packet4};
use crate::policy::{verify_claim, RejectReason, Verdict};
use crate::reservation::{classify, ReservationOracle};
use crate::subnet::{find_subnet, Subnet4, SubnetRole};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of subnet selection
#[derive(Debug, Clone)]
pub enum Selection {
    /// No decision; the host keeps its own choice
    Deferred,

    /// Commit `subnet` for this packet
    Selected {
        subnet: Arc<Subnet4>,
        role: SubnetRole,
    },

    /// Commit `subnet` and answer with `nak` instead of the host's response
    Rejected {
        subnet: Arc<Subnet4>,
        role: SubnetRole,
        nak: Packet4,
        reason: RejectReason,
    },
}

impl Selection {
    /// Subnet committed by this selection, if any
    pub fn subnet(&self) -> Option<&Arc<Subnet4>> {
        match self {
            Selection::Deferred => None,
            Selection::Selected { subnet, .. } | Selection::Rejected { subnet, .. } => Some(subnet),
        }
    }
}

/// Steers clients into the subnet matching their registration status
pub struct SubnetSelector {
    config: PolicyConfig,
    oracle: Arc<dyn ReservationOracle>,
}

impl SubnetSelector {
    /// Create a new selector
    pub fn new(config: PolicyConfig, oracle: Arc<dyn ReservationOracle>) -> Self {
        Self { config, oracle }
    }

    /// Choose a subnet for `query` among `subnets`
    pub fn select(&self, query: &Packet4, subnets: &[Arc<Subnet4>]) -> Selection {
        let hwaddr = match query.hwaddr() {
            Some(hw) => hw,
            None => {
                debug!(xid = query.xid(), "No hardware address, deferring subnet selection");
                return Selection::Deferred;
            }
        };

        if subnets.is_empty() {
            debug!(mac = %hwaddr, "Empty subnet collection, deferring subnet selection");
            return Selection::Deferred;
        }

        let status = classify(self.oracle.as_ref(), &hwaddr, subnets.iter().map(|s| s.id));
        let role = status.role();
        let target = role.subnet_id(&self.config);

        let subnet = match find_subnet(subnets, target) {
            Some(subnet) => Arc::clone(subnet),
            None => {
                warn!(
                    mac = %hwaddr,
                    role = %role,
                    subnet_id = %target,
                    "Target subnet not among candidates, deferring to server"
                );
                return Selection::Deferred;
            }
        };

        info!(mac = %hwaddr, role = %role, subnet = %subnet, "Selected subnet");

        if !query.is_request() {
            return Selection::Selected { subnet, role };
        }

        match verify_claim(query, &subnet) {
            Verdict::Allow => Selection::Selected { subnet, role },
            Verdict::Reject(reason) => {
                info!(mac = %hwaddr, reason = %reason, "Answering DHCPREQUEST with NAK");
                let nak = NakBuilder::for_query(query).build();
                Selection::Rejected {
                    subnet,
                    role,
                    nak,
                    reason,
                }
            }
        }
    }
}

impl std::fmt::Debug for SubnetSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubnetSelector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
