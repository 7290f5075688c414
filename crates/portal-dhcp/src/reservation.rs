//! Reservation lookup
//!
//! The host server's reservation store is consumed through
//! [`ReservationOracle`]. A client counts as registered when a reservation
//! for its hardware address exists in the global scope or, failing that,
//! in any of the subnet scopes being considered.

use crate::error::Result;
use crate::packet::HwAddr;
use crate::subnet::{SubnetId, SubnetRole};
use std::fmt;
use tracing::{debug, warn};

/// Where a reservation is looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReservationScope {
    /// Reservations that apply to every subnet
    Global,
    /// Reservations made within one subnet
    Subnet(SubnetId),
}

impl fmt::Display for ReservationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationScope::Global => f.write_str("global"),
            ReservationScope::Subnet(id) => write!(f, "subnet {}", id),
        }
    }
}

/// Kind of identifier a reservation is keyed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    HardwareAddress,
}

/// A reservation returned by the oracle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    /// Scope the reservation was found in
    pub scope: ReservationScope,
}

impl Reservation {
    pub fn new(scope: ReservationScope) -> Self {
        Self { scope }
    }
}

/// Trait for looking up host reservations
///
/// Implementations must be safe to call from concurrent callouts.
pub trait ReservationOracle: Send + Sync {
    /// Look up a reservation for `identifier` in `scope`
    fn lookup(
        &self,
        scope: ReservationScope,
        kind: IdentifierKind,
        identifier: &[u8],
    ) -> Result<Option<Reservation>>;
}

/// Registration status of a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationStatus {
    Registered(Reservation),
    Unregistered,
}

impl RegistrationStatus {
    /// Subnet role this status maps to
    pub fn role(&self) -> SubnetRole {
        match self {
            RegistrationStatus::Registered(_) => SubnetRole::Registered,
            RegistrationStatus::Unregistered => SubnetRole::Unregistered,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationStatus::Registered(_))
    }
}

/// Find a reservation for `hwaddr`: global scope first, then each subnet
///
/// A failed lookup counts as "no reservation" for that scope.
pub fn find_reservation<I>(
    oracle: &dyn ReservationOracle,
    hwaddr: &HwAddr,
    subnets: I,
) -> Option<Reservation>
where
    I: IntoIterator<Item = SubnetId>,
{
    std::iter::once(ReservationScope::Global)
        .chain(subnets.into_iter().map(ReservationScope::Subnet))
        .find_map(|scope| {
            match oracle.lookup(scope, IdentifierKind::HardwareAddress, hwaddr.as_bytes()) {
                Ok(found) => found,
                Err(e) => {
                    warn!(mac = %hwaddr, scope = %scope, error = %e, "Reservation lookup failed");
                    None
                }
            }
        })
}

/// Classify a client by reservation
pub fn classify<I>(oracle: &dyn ReservationOracle, hwaddr: &HwAddr, subnets: I) -> RegistrationStatus
where
    I: IntoIterator<Item = SubnetId>,
{
    match find_reservation(oracle, hwaddr, subnets) {
        Some(reservation) => {
            debug!(mac = %hwaddr, scope = %reservation.scope, "Found reservation");
            RegistrationStatus::Registered(reservation)
        }
        None => RegistrationStatus::Unregistered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PolicyError;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockOracle {
        reservations: HashMap<(ReservationScope, Vec<u8>), Reservation>,
        failing: Vec<ReservationScope>,
        queried: Mutex<Vec<ReservationScope>>,
    }

    impl MockOracle {
        fn reserve(&mut self, scope: ReservationScope, hwaddr: &HwAddr) {
            self.reservations
                .insert((scope, hwaddr.as_bytes().to_vec()), Reservation::new(scope));
        }
    }

    impl ReservationOracle for MockOracle {
        fn lookup(
            &self,
            scope: ReservationScope,
            _kind: IdentifierKind,
            identifier: &[u8],
        ) -> Result<Option<Reservation>> {
            self.queried.lock().unwrap().push(scope);
            if self.failing.contains(&scope) {
                return Err(PolicyError::LookupFailure("backend down".to_string()));
            }
            Ok(self.reservations.get(&(scope, identifier.to_vec())).cloned())
        }
    }

    fn mac() -> HwAddr {
        HwAddr::new(vec![0x00, 0x11, 0x22, 0x33, 0x44, 0x55])
    }

    #[test]
    fn test_global_checked_first() {
        let mut oracle = MockOracle::default();
        oracle.reserve(ReservationScope::Global, &mac());
        oracle.reserve(ReservationScope::Subnet(SubnetId(10)), &mac());

        let found = find_reservation(&oracle, &mac(), [SubnetId(10), SubnetId(11)]).unwrap();
        assert_eq!(found.scope, ReservationScope::Global);
        assert_eq!(*oracle.queried.lock().unwrap(), vec![ReservationScope::Global]);
    }

    #[test]
    fn test_subnet_scope_fallback_stops_at_first_hit() {
        let mut oracle = MockOracle::default();
        oracle.reserve(ReservationScope::Subnet(SubnetId(11)), &mac());

        let found = find_reservation(
            &oracle,
            &mac(),
            [SubnetId(10), SubnetId(11), SubnetId(12)],
        )
        .unwrap();
        assert_eq!(found.scope, ReservationScope::Subnet(SubnetId(11)));
        assert_eq!(
            *oracle.queried.lock().unwrap(),
            vec![
                ReservationScope::Global,
                ReservationScope::Subnet(SubnetId(10)),
                ReservationScope::Subnet(SubnetId(11)),
            ]
        );
    }

    #[test]
    fn test_no_reservation() {
        let oracle = MockOracle::default();
        let status = classify(&oracle, &mac(), [SubnetId(10), SubnetId(11)]);

        assert_eq!(status, RegistrationStatus::Unregistered);
        assert_eq!(status.role(), SubnetRole::Unregistered);
        assert!(!status.is_registered());
    }

    #[test]
    fn test_lookup_failure_is_no_reservation() {
        let mut oracle = MockOracle::default();
        oracle.failing.push(ReservationScope::Global);
        oracle.reserve(ReservationScope::Subnet(SubnetId(10)), &mac());

        // Global fails, subnet scope still answers
        let status = classify(&oracle, &mac(), [SubnetId(10)]);
        assert!(status.is_registered());
        assert_eq!(status.role(), SubnetRole::Registered);

        let mut oracle = MockOracle::default();
        oracle.failing.push(ReservationScope::Global);
        assert_eq!(
            classify(&oracle, &mac(), std::iter::empty()),
            RegistrationStatus::Unregistered
        );
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(ReservationScope::Global.to_string(), "global");
        assert_eq!(ReservationScope::Subnet(SubnetId(10)).to_string(), "subnet 10");
    }
}
