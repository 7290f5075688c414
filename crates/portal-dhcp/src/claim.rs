//! Claimed address extraction
//!
//! A bound client renewing its lease puts its current address in ciaddr;
//! a client in INIT-REBOOT leaves ciaddr zero and names the address in the
//! requested-address option (50). ciaddr wins when both are present.

use crate::error::PolicyError;
use crate::packet::Packet4;
use dhcproto::v4::{DhcpOption, OptionCode};
use std::net::Ipv4Addr;
use tracing::debug;

const REQUESTED_ADDRESS_CODE: u8 = 50;

/// Address the client currently claims, if any
///
/// The all-zeros address is never returned: it means "no claim".
pub fn extract_claim(request: &Packet4) -> Option<Ipv4Addr> {
    let ciaddr = request.ciaddr();
    if !ciaddr.is_unspecified() {
        return Some(ciaddr);
    }

    match requested_address(request) {
        Ok(Some(ip)) if !ip.is_unspecified() => Some(ip),
        Ok(_) => None,
        Err(e) => {
            debug!(xid = request.xid(), error = %e, "Ignoring requested-address option");
            None
        }
    }
}

/// Decode option 50
///
/// The decoder files an option it could not type under
/// `OptionCode::Unknown(50)` with its raw bytes; those are read if they
/// hold at least four bytes, and only the first four are used.
fn requested_address(request: &Packet4) -> Result<Option<Ipv4Addr>, PolicyError> {
    let opts = request.message.opts();
    if let Some(DhcpOption::RequestedIpAddress(ip)) = opts.get(OptionCode::RequestedIpAddress) {
        return Ok(Some(*ip));
    }

    match opts.get(OptionCode::Unknown(REQUESTED_ADDRESS_CODE)) {
        Some(DhcpOption::Unknown(raw)) => {
            let data = raw.data();
            if data.len() < 4 {
                return Err(PolicyError::MalformedOption {
                    code: REQUESTED_ADDRESS_CODE,
                    len: data.len(),
                });
            }
            Ok(Some(Ipv4Addr::new(data[0], data[1], data[2], data[3])))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dhcproto::v4::{Message, MessageType, UnknownOption};

    fn request(ciaddr: Ipv4Addr) -> Packet4 {
        let mut msg = Message::default();
        msg.set_ciaddr(ciaddr);
        msg.set_chaddr(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        msg.opts_mut()
            .insert(DhcpOption::MessageType(MessageType::Request));
        Packet4::new(msg)
    }

    fn with_option(mut packet: Packet4, opt: DhcpOption) -> Packet4 {
        packet.message.opts_mut().insert(opt);
        packet
    }

    fn raw_option50(data: Vec<u8>) -> DhcpOption {
        DhcpOption::Unknown(UnknownOption::new(OptionCode::RequestedIpAddress, data))
    }

    #[test]
    fn test_ciaddr_wins_over_option() {
        let packet = with_option(
            request(Ipv4Addr::new(10, 0, 0, 20)),
            DhcpOption::RequestedIpAddress(Ipv4Addr::new(192, 168, 1, 20)),
        );

        assert_eq!(extract_claim(&packet), Some(Ipv4Addr::new(10, 0, 0, 20)));
    }

    #[test]
    fn test_ciaddr_alone() {
        let packet = request(Ipv4Addr::new(10, 0, 0, 20));
        assert_eq!(extract_claim(&packet), Some(Ipv4Addr::new(10, 0, 0, 20)));
    }

    #[test]
    fn test_requested_address_option() {
        let packet = with_option(
            request(Ipv4Addr::UNSPECIFIED),
            DhcpOption::RequestedIpAddress(Ipv4Addr::new(192, 168, 1, 99)),
        );

        assert_eq!(extract_claim(&packet), Some(Ipv4Addr::new(192, 168, 1, 99)));
    }

    #[test]
    fn test_raw_option_uses_first_four_bytes() {
        let packet = with_option(
            request(Ipv4Addr::UNSPECIFIED),
            raw_option50(vec![192, 168, 1, 30, 0xff]),
        );

        assert_eq!(extract_claim(&packet), Some(Ipv4Addr::new(192, 168, 1, 30)));
    }

    #[test]
    fn test_raw_option_filed_under_unknown_code() {
        let packet = with_option(
            request(Ipv4Addr::UNSPECIFIED),
            raw_option50(vec![192, 168, 1, 99]),
        );

        let opts = packet.message.opts();
        assert!(opts.get(OptionCode::RequestedIpAddress).is_none());
        assert!(opts.get(OptionCode::Unknown(REQUESTED_ADDRESS_CODE)).is_some());
        assert_eq!(extract_claim(&packet), Some(Ipv4Addr::new(192, 168, 1, 99)));
    }

    #[test]
    fn test_short_option_is_malformed() {
        let packet = with_option(request(Ipv4Addr::UNSPECIFIED), raw_option50(vec![192, 168, 1]));
        assert!(matches!(
            requested_address(&packet),
            Err(PolicyError::MalformedOption { code: 50, len: 3 })
        ));
        assert_eq!(extract_claim(&packet), None);

        let packet = with_option(request(Ipv4Addr::UNSPECIFIED), raw_option50(vec![]));
        assert!(matches!(
            requested_address(&packet),
            Err(PolicyError::MalformedOption { code: 50, len: 0 })
        ));
        assert_eq!(extract_claim(&packet), None);
    }

    #[test]
    fn test_short_option_ignored_when_ciaddr_set() {
        let packet = with_option(
            request(Ipv4Addr::new(10, 0, 0, 20)),
            raw_option50(vec![192, 168]),
        );
        assert_eq!(extract_claim(&packet), Some(Ipv4Addr::new(10, 0, 0, 20)));
    }

    #[test]
    fn test_no_claim() {
        assert_eq!(extract_claim(&request(Ipv4Addr::UNSPECIFIED)), None);
    }

    #[test]
    fn test_zero_option_is_no_claim() {
        let packet = with_option(
            request(Ipv4Addr::UNSPECIFIED),
            DhcpOption::RequestedIpAddress(Ipv4Addr::UNSPECIFIED),
        );
        assert_eq!(extract_claim(&packet), None);
    }
}
