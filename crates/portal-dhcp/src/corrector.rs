//! Response correction
//!
//! Last check before a reply leaves the server. An ACK for an address
//! outside the committed subnet's pools is rewritten into a NAK: message
//! type changed, yiaddr zeroed, and the lease-time, renewal-time and
//! rebinding-time options removed, since some clients mis-parse a NAK that
//! still carries them.

use crate::packet::Packet4;
use crate::policy::{verify_claim, Verdict};
use crate::subnet::Subnet4;
use dhcproto::v4::{MessageType, OptionCode};
use std::net::Ipv4Addr;
use tracing::{debug, info};

/// Options that make no sense on a NAK
const LEASE_TIMER_OPTIONS: [OptionCode; 3] = [
    OptionCode::AddressLeaseTime,
    OptionCode::Renewal,
    OptionCode::Rebinding,
];

/// Downgrades ACKs for out-of-pool addresses to NAKs
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseCorrector;

impl ResponseCorrector {
    pub fn new() -> Self {
        Self
    }

    /// Check `response` to `query` against `subnet`, rewriting it on rejection
    ///
    /// Only an ACK answering a DHCPREQUEST is examined, so running this on
    /// an already downgraded response changes nothing.
    pub fn correct(&self, response: &mut Packet4, query: &Packet4, subnet: &Subnet4) -> Verdict {
        if !response.is_ack() {
            debug!(xid = response.xid(), "Response is not an ACK");
            return Verdict::Allow;
        }
        if !query.is_request() {
            debug!(xid = query.xid(), "Query is not a DHCPREQUEST");
            return Verdict::Allow;
        }

        let verdict = verify_claim(query, subnet);
        if let Verdict::Reject(reason) = verdict {
            info!(
                xid = response.xid(),
                yiaddr = %response.yiaddr(),
                reason = %reason,
                "Converting ACK to NAK"
            );
            downgrade_to_nak(response);
        }
        verdict
    }
}

/// Rewrite `response` in place as a NAK
pub fn downgrade_to_nak(response: &mut Packet4) {
    response.set_message_type(MessageType::Nak);
    response.message.set_yiaddr(Ipv4Addr::UNSPECIFIED);
    for code in LEASE_TIMER_OPTIONS {
        response.message.opts_mut().remove(code);
    }
}
