//! Portal DHCP subnet policy
//!
//! This crate provides the lease-pipeline hooks that keep a DHCPv4 server's
//! clients in the subnet matching their registration status. Clients with
//! a hardware-address reservation belong to the registered subnet, all
//! others to the unregistered one, and a client holding, requesting or
//! renewing an address from the wrong side is answered with a NAK.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 PolicyHooks                         │
//! │  ┌───────────────────────────────────────────────┐  │
//! │  │  subnet4_select → SubnetSelector              │  │
//! │  │   reservation? → registered | unregistered    │  │
//! │  │   REQUEST out of pool → synthesized NAK       │  │
//! │  └───────────────────────────────────────────────┘  │
//! │                       │                             │
//! │                       ▼                             │
//! │  ┌───────────────────────────────────────────────┐  │
//! │  │  lease4_select / lease4_renew → LeaseGuard    │  │
//! │  │   out of pool → lease withdrawn               │  │
//! │  │   kept → hijack / unhijack notification       │  │
//! │  └───────────────────────────────────────────────┘  │
//! │                       │                             │
//! │                       ▼                             │
//! │  ┌───────────────────────────────────────────────┐  │
//! │  │  pkt4_send → ResponseCorrector                │  │
//! │  │   ACK out of pool → rewritten as NAK          │  │
//! │  └───────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! All three stages keep no state between calls; the reservation oracle
//! and the notifier are injected.
//!
//! # Example
//!
//! ```ignore
//! use portal_dhcp::{CalloutHandle, PolicyHooks};
//! use std::sync::Arc;
//!
//! let hooks = PolicyHooks::load(&params, Arc::new(MyReservationStore::new()))?;
//!
//! let mut handle = CalloutHandle::new()
//!     .with_query(query)
//!     .with_subnet_collection(subnets);
//! hooks.subnet4_select(&mut handle);
//! ```

pub mod claim;
pub mod config;
pub mod corrector;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod notify;
pub mod packet;
pub mod policy;
pub mod reservation;
pub mod selector;
pub mod subnet;

pub use claim::*;
pub use config::*;
pub use corrector::*;
pub use error::*;
pub use guard::*;
pub use hooks::*;
pub use notify::*;
pub use packet::*;
pub use policy::*;
pub use reservation::*;
pub use selector::*;
pub use subnet::*;
