//! Hook entry points
//!
//! The host server calls into the library through a fixed set of entry
//! points, each handed a mutable bag of named arguments. Every callout
//! catches its own failures (panics included) and tells the host to carry
//! on: a fault in this policy must never take DHCP service down.

use crate::config::PolicyConfig;
use crate::corrector::ResponseCorrector;
use crate::error::{PolicyError, Result};
use crate::guard::LeaseGuard;
use crate::notify::{HijackAction, NoopNotifier, Notifier, QueuedNotifier, ScriptRunner};
use crate::packet::Packet4;
use crate::policy::Verdict;
use crate::reservation::{classify, ReservationOracle};
use crate::selector::{Selection, SubnetSelector};
use crate::subnet::{Lease4, Subnet4, SubnetCollection};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error, info};

/// Hooks ABI version this library was built against
pub const HOOKS_VERSION: i32 = 30002;

/// What the host should do after a callout returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NextStep {
    /// Carry on with normal processing
    #[default]
    Continue,
    /// Skip the host's own processing for this step
    Skip,
}

/// Named arguments passed to a callout
#[derive(Debug, Default)]
pub struct CalloutHandle {
    /// Incoming query
    pub query4: Option<Packet4>,
    /// Candidate subnets (subnet selection only)
    pub subnet4collection: Option<SubnetCollection>,
    /// Committed subnet
    pub subnet4: Option<Arc<Subnet4>>,
    /// Tentative or renewed lease
    pub lease4: Option<Lease4>,
    /// Outgoing response
    pub response4: Option<Packet4>,
    status: NextStep,
}

impl CalloutHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: Packet4) -> Self {
        self.query4 = Some(query);
        self
    }

    pub fn with_subnet_collection(mut self, subnets: SubnetCollection) -> Self {
        self.subnet4collection = Some(subnets);
        self
    }

    pub fn with_subnet(mut self, subnet: Arc<Subnet4>) -> Self {
        self.subnet4 = Some(subnet);
        self
    }

    pub fn with_lease(mut self, lease: Lease4) -> Self {
        self.lease4 = Some(lease);
        self
    }

    pub fn with_response(mut self, response: Packet4) -> Self {
        self.response4 = Some(response);
        self
    }

    /// Directive for the host
    pub fn status(&self) -> NextStep {
        self.status
    }

    pub fn set_status(&mut self, status: NextStep) {
        self.status = status;
    }
}

/// Borrow a callout argument the stage cannot run without
fn required<'a, T>(slot: &'a Option<T>, name: &'static str) -> Result<&'a T> {
    slot.as_ref().ok_or(PolicyError::MissingArgument(name))
}

fn required_mut<'a, T>(slot: &'a mut Option<T>, name: &'static str) -> Result<&'a mut T> {
    slot.as_mut().ok_or(PolicyError::MissingArgument(name))
}

/// The subnet policy as loaded into the host
pub struct PolicyHooks {
    config: PolicyConfig,
    oracle: Arc<dyn ReservationOracle>,
    selector: SubnetSelector,
    guard: LeaseGuard,
    corrector: ResponseCorrector,
    notifier: Arc<dyn Notifier>,
    runtime: Option<Runtime>,
}

impl PolicyHooks {
    /// Create hooks that send no notifications
    pub fn new(config: PolicyConfig, oracle: Arc<dyn ReservationOracle>) -> Self {
        Self {
            selector: SubnetSelector::new(config.clone(), Arc::clone(&oracle)),
            guard: LeaseGuard::new(),
            corrector: ResponseCorrector::new(),
            notifier: Arc::new(NoopNotifier),
            runtime: None,
            config,
            oracle,
        }
    }

    /// Use `notifier` for hijack notifications
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Library load: parse parameters and start the notification worker
    pub fn load(params: &serde_json::Value, oracle: Arc<dyn ReservationOracle>) -> Result<Self> {
        let config = PolicyConfig::from_params(params)?;
        let mut hooks = Self::new(config, oracle);

        if let Some(script) = hooks.config.hijack_script.clone() {
            let runtime = Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("portal-notify")
                .enable_all()
                .build()
                .map_err(|e| PolicyError::ConfigError(format!("notification runtime: {}", e)))?;
            let notifier = QueuedNotifier::spawn(
                Arc::new(ScriptRunner::new(&script)),
                hooks.config.notify_queue_depth,
                runtime.handle(),
            );
            info!(script = %script.display(), "Hijack notifications enabled");
            hooks.notifier = Arc::new(notifier);
            hooks.runtime = Some(runtime);
        }

        info!(
            registered = %hooks.config.registered_subnet_id,
            unregistered = %hooks.config.unregistered_subnet_id,
            "Subnet policy loaded"
        );
        Ok(hooks)
    }

    /// Library unload: stop the notification worker without waiting
    pub fn unload(mut self) -> i32 {
        // Drop the sender first so the worker sees a closed queue
        self.notifier = Arc::new(NoopNotifier);
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
        info!("Subnet policy unloaded");
        0
    }

    pub fn version() -> i32 {
        HOOKS_VERSION
    }

    pub fn multi_threading_compatible() -> i32 {
        1
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// `subnet4_select`: pick the subnet matching the client's registration
    pub fn subnet4_select(&self, handle: &mut CalloutHandle) -> i32 {
        run_callout("subnet4_select", handle, |handle| {
            let query = required(&handle.query4, "query4")?;
            let subnets = required(&handle.subnet4collection, "subnet4collection")?;

            match self.selector.select(query, subnets) {
                Selection::Deferred => Ok(NextStep::Continue),
                Selection::Selected { subnet, .. } => {
                    handle.subnet4 = Some(subnet);
                    Ok(NextStep::Continue)
                }
                Selection::Rejected { subnet, nak, .. } => {
                    handle.subnet4 = Some(subnet);
                    handle.response4 = Some(nak);
                    Ok(NextStep::Skip)
                }
            }
        })
    }

    /// `lease4_select`: veto a tentative lease the client may not hold
    pub fn lease4_select(&self, handle: &mut CalloutHandle) -> i32 {
        run_callout("lease4_select", handle, |handle| self.guard_lease(handle))
    }

    /// `lease4_renew`: same check on the renewal path
    pub fn lease4_renew(&self, handle: &mut CalloutHandle) -> i32 {
        run_callout("lease4_renew", handle, |handle| self.guard_lease(handle))
    }

    /// `pkt4_send`: downgrade an out-of-pool ACK to a NAK
    pub fn pkt4_send(&self, handle: &mut CalloutHandle) -> i32 {
        run_callout("pkt4_send", handle, |handle| {
            let query = required(&handle.query4, "query4")?;
            let subnet = required(&handle.subnet4, "subnet4")?;
            let response = required_mut(&mut handle.response4, "response4")?;

            self.corrector.correct(response, query, subnet);
            Ok(NextStep::Continue)
        })
    }

    fn guard_lease(&self, handle: &mut CalloutHandle) -> Result<NextStep> {
        required(&handle.lease4, "lease4")?;
        let subnet = required(&handle.subnet4, "subnet4")?;
        let query = required(&handle.query4, "query4")?;

        if self.guard.check(&mut handle.lease4, query, subnet) == Verdict::Allow {
            if let Some(lease) = handle.lease4.as_ref() {
                self.notify_registration(lease, query, subnet);
            }
        }
        Ok(NextStep::Continue)
    }

    /// Tell the side-effect script whether `lease`'s address is registered
    fn notify_registration(&self, lease: &Lease4, query: &Packet4, subnet: &Subnet4) {
        let Some(hwaddr) = lease.hwaddr.clone().or_else(|| query.hwaddr()) else {
            debug!(lease = %lease.addr, "No hardware address for notification");
            return;
        };

        let status = classify(self.oracle.as_ref(), &hwaddr, [subnet.id]);
        let action = if status.is_registered() {
            HijackAction::Unhijack
        } else {
            HijackAction::Hijack
        };
        info!(mac = %hwaddr, ip = %lease.addr, action = %action, "Dispatching notification");
        self.notifier.notify(action, lease.addr);
    }
}

impl std::fmt::Debug for PolicyHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyHooks")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Run one callout body, mapping every failure to "continue"
///
/// Returns 0 on success, 1 if the body failed or panicked.
fn run_callout<F>(name: &'static str, handle: &mut CalloutHandle, body: F) -> i32
where
    F: FnOnce(&mut CalloutHandle) -> Result<NextStep>,
{
    let outcome = catch_unwind(AssertUnwindSafe(|| body(&mut *handle)))
        .unwrap_or_else(|panic| Err(PolicyError::Internal(panic_message(panic.as_ref()))));

    match outcome {
        Ok(next) => {
            handle.set_status(next);
            0
        }
        Err(PolicyError::MissingArgument(arg)) => {
            debug!(callout = name, argument = arg, "Missing argument, passing through");
            handle.set_status(NextStep::Continue);
            0
        }
        Err(e) => {
            error!(callout = name, error = %e, "Callout failed, continuing normal processing");
            handle.set_status(NextStep::Continue);
            1
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
