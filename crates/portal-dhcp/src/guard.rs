//! Lease guard
//!
//! The host's allocator can reach a lease without going through subnet
//! selection again (a renewal, for instance), so the claim is re-checked
//! against the committed subnet right before the lease is used. Withdrawing
//! the lease sends the host down its own allocation-failure path, which
//! ends in a NAK.

use crate::packet::Packet4;
use crate::policy::{verify_claim, Verdict};
use crate::subnet::{Lease4, Subnet4};
use tracing::{debug, info};

/// Withdraws leases for addresses outside the committed subnet
#[derive(Debug, Default, Clone, Copy)]
pub struct LeaseGuard;

impl LeaseGuard {
    pub fn new() -> Self {
        Self
    }

    /// Check `lease` for `query` against `subnet`
    ///
    /// Returns the verdict; on rejection `lease` has been set to `None`.
    /// Anything other than a DHCPREQUEST with a lease passes untouched.
    pub fn check(&self, lease: &mut Option<Lease4>, query: &Packet4, subnet: &Subnet4) -> Verdict {
        let Some(current) = lease.as_ref() else {
            return Verdict::Allow;
        };

        if !query.is_request() {
            debug!(xid = query.xid(), "Not a DHCPREQUEST, leaving lease alone");
            return Verdict::Allow;
        }

        let verdict = verify_claim(query, subnet);
        match verdict {
            Verdict::Reject(reason) => {
                info!(
                    xid = query.xid(),
                    lease = %current.addr,
                    lease_subnet = %current.subnet_id,
                    reason = %reason,
                    "Withdrawing lease"
                );
                *lease = None;
            }
            Verdict::Allow => {
                debug!(lease = %current.addr, subnet = %subnet, "Lease allowed");
            }
        }
        verdict
    }
}
