//! DHCP packet handling
//!
//! This module wraps `dhcproto` messages with the transport metadata the
//! host server keeps alongside them, and builds the NAK that replaces an
//! in-progress response when a client asks for an address it may not hold.

use crate::error::{PolicyError, Result};
use dhcproto::v4::{DhcpOption, Message, MessageType, Opcode, OptionCode};
use dhcproto::{Decodable, Encodable};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// DHCPv4 server port
pub const DHCP4_SERVER_PORT: u16 = 67;

/// DHCPv4 client port
pub const DHCP4_CLIENT_PORT: u16 = 68;

/// Client hardware address (chaddr trimmed to hlen)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HwAddr(Vec<u8>);

impl HwAddr {
    /// Create from raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Raw address bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HwAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for HwAddr {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s
            .split(|c| c == ':' || c == '-')
            .map(|part| {
                if part.len() != 2 {
                    return Err(PolicyError::InvalidMac(s.to_string()));
                }
                u8::from_str_radix(part, 16).map_err(|_| PolicyError::InvalidMac(s.to_string()))
            })
            .collect::<Result<Vec<u8>>>()?;

        if bytes.is_empty() || bytes.len() > 16 {
            return Err(PolicyError::InvalidMac(s.to_string()));
        }
        Ok(Self(bytes))
    }
}

/// A DHCPv4 packet as the host server hands it to a callout
#[derive(Debug, Clone)]
pub struct Packet4 {
    /// Decoded message
    pub message: Message,

    /// Interface the packet arrived on / leaves through
    pub iface: Option<String>,

    /// Interface index
    pub ifindex: Option<u32>,

    /// Local (server-side) address
    pub local_addr: Ipv4Addr,

    /// Local port
    pub local_port: u16,

    /// Remote (client or relay) address
    pub remote_addr: Ipv4Addr,

    /// Remote port
    pub remote_port: u16,
}

impl Packet4 {
    /// Wrap a message with empty transport metadata
    pub fn new(message: Message) -> Self {
        Self {
            message,
            iface: None,
            ifindex: None,
            local_addr: Ipv4Addr::UNSPECIFIED,
            local_port: DHCP4_SERVER_PORT,
            remote_addr: Ipv4Addr::UNSPECIFIED,
            remote_port: DHCP4_CLIENT_PORT,
        }
    }

    /// Parse a packet from raw bytes
    pub fn parse(data: &[u8]) -> Result<Self> {
        let message =
            Message::from_bytes(data).map_err(|e| PolicyError::ParseError(e.to_string()))?;
        Ok(Self::new(message))
    }

    /// Encode the message to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.message
            .to_vec()
            .map_err(|e| PolicyError::EncodeError(e.to_string()))
    }

    /// Set the interface
    pub fn with_iface(mut self, iface: impl Into<String>, ifindex: u32) -> Self {
        self.iface = Some(iface.into());
        self.ifindex = Some(ifindex);
        self
    }

    /// Set the local address
    pub fn with_local_addr(mut self, addr: Ipv4Addr) -> Self {
        self.local_addr = addr;
        self
    }

    /// Set the remote address
    pub fn with_remote_addr(mut self, addr: Ipv4Addr) -> Self {
        self.remote_addr = addr;
        self
    }

    /// Message type (option 53)
    pub fn message_type(&self) -> Option<MessageType> {
        self.message
            .opts()
            .get(OptionCode::MessageType)
            .and_then(|opt| {
                if let DhcpOption::MessageType(mt) = opt {
                    Some(mt.clone())
                } else {
                    None
                }
            })
    }

    /// Replace the message type
    pub fn set_message_type(&mut self, message_type: MessageType) {
        self.message
            .opts_mut()
            .insert(DhcpOption::MessageType(message_type));
    }

    /// Check if this is a DHCPREQUEST
    pub fn is_request(&self) -> bool {
        self.message_type() == Some(MessageType::Request)
    }

    /// Check if this is a DHCPACK
    pub fn is_ack(&self) -> bool {
        self.message_type() == Some(MessageType::Ack)
    }

    /// Client hardware address, if the packet carries one
    pub fn hwaddr(&self) -> Option<HwAddr> {
        let chaddr = self.message.chaddr();
        if chaddr.is_empty() {
            None
        } else {
            Some(HwAddr::new(chaddr))
        }
    }

    /// Transaction ID
    pub fn xid(&self) -> u32 {
        self.message.xid()
    }

    /// Client IP (ciaddr)
    pub fn ciaddr(&self) -> Ipv4Addr {
        self.message.ciaddr()
    }

    /// Your IP (yiaddr)
    pub fn yiaddr(&self) -> Ipv4Addr {
        self.message.yiaddr()
    }

    /// Client identifier (option 61)
    pub fn client_id(&self) -> Option<&[u8]> {
        self.message
            .opts()
            .get(OptionCode::ClientIdentifier)
            .and_then(|opt| {
                if let DhcpOption::ClientIdentifier(id) = opt {
                    Some(id.as_slice())
                } else {
                    None
                }
            })
    }
}

/// Builds the DHCPNAK sent in place of the host's response
pub struct NakBuilder<'a> {
    query: &'a Packet4,
    server_id: Ipv4Addr,
}

impl<'a> NakBuilder<'a> {
    /// Start a NAK answering `query`
    ///
    /// The server identifier defaults to the address the query arrived on.
    pub fn for_query(query: &'a Packet4) -> Self {
        Self {
            query,
            server_id: query.local_addr,
        }
    }

    /// Override the server identifier
    pub fn with_server_id(mut self, server_id: Ipv4Addr) -> Self {
        self.server_id = server_id;
        self
    }

    /// Build the NAK packet
    pub fn build(self) -> Packet4 {
        let request = &self.query.message;
        let mut nak = Message::default();

        nak.set_opcode(Opcode::BootReply);
        nak.set_xid(request.xid());
        nak.set_flags(request.flags());
        nak.set_htype(request.htype());
        nak.set_chaddr(request.chaddr());
        nak.set_giaddr(request.giaddr());

        nak.opts_mut()
            .insert(DhcpOption::MessageType(MessageType::Nak));

        if let Some(client_id) = self.query.client_id() {
            nak.opts_mut()
                .insert(DhcpOption::ClientIdentifier(client_id.to_vec()));
        }

        nak.opts_mut()
            .insert(DhcpOption::ServerIdentifier(self.server_id));

        Packet4 {
            message: nak,
            iface: self.query.iface.clone(),
            ifindex: self.query.ifindex,
            local_addr: self.query.local_addr,
            local_port: DHCP4_SERVER_PORT,
            remote_addr: self.query.remote_addr,
            remote_port: DHCP4_CLIENT_PORT,
        }
    }
}
