//! Enforcement verdicts
//!
//! Every stage asks the same question: may this client hold the address it
//! claims, given the subnet it has been placed in? Only the way a rejection
//! is carried out differs per stage.

use crate::claim::extract_claim;
use crate::packet::Packet4;
use crate::subnet::{Subnet4, SubnetId};
use std::fmt;
use std::net::Ipv4Addr;

/// Why a claim was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RejectReason {
    pub claimed: Ipv4Addr,
    pub subnet_id: SubnetId,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is not in any pool of subnet {}",
            self.claimed, self.subnet_id
        )
    }
}

/// Outcome of checking a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_reject(&self) -> bool {
        matches!(self, Verdict::Reject(_))
    }
}

/// Check the address claimed in `request` against `subnet`'s pools
///
/// No claim means nothing to refuse.
pub fn verify_claim(request: &Packet4, subnet: &Subnet4) -> Verdict {
    match extract_claim(request) {
        Some(claimed) if !subnet.in_pool(claimed) => Verdict::Reject(RejectReason {
            claimed,
            subnet_id: subnet.id,
        }),
        _ => Verdict::Allow,
    }
}
