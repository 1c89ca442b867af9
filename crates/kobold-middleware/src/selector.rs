//! [`BackendSelector`] – dialect choice at discovery time.
//!
//! Adapters are tried strictly in priority order.  The first one that
//! returns a non-empty robot list wins and is used for every later call to
//! those robots; lists are never merged across dialects.  Any error, or an
//! empty list, moves on to the next adapter.
//!
//! | Outcome | Result |
//! |---|---|
//! | some adapter lists robots | that adapter and its robots |
//! | every adapter answered, all lists empty | first adapter that answered, no robots |
//! | every adapter failed | the last error |
//! | no adapters configured | [`KoboldError::NoBackends`] |

use kobold_types::{Dialect, DiscoveredRobot, KoboldError};
use tracing::{info, instrument, warn};

use crate::adapter::{Backend, RobotBackend};
use crate::companion_adapter::{COMPANION_URL, CompanionAdapter};
use crate::orbital_adapter::{BEEHIVE_URL, ORBITAL_URL, OrbitalAdapter};
use crate::transport::Transport;

/// Base URLs of every vendor host.  Overridable for staging hosts and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorHosts {
    pub beehive: String,
    pub orbital: String,
    pub companion: String,
}

impl Default for VendorHosts {
    fn default() -> Self {
        Self {
            beehive: BEEHIVE_URL.to_string(),
            orbital: ORBITAL_URL.to_string(),
            companion: COMPANION_URL.to_string(),
        }
    }
}

/// The adapter chosen by [`BackendSelector::discover`] and what it listed.
pub struct Selection<B = Backend> {
    pub backend: B,
    pub robots: Vec<DiscoveredRobot>,
}

/// Ordered list of candidate adapters.
pub struct BackendSelector<B: RobotBackend = Backend> {
    backends: Vec<B>,
}

impl<B: RobotBackend> BackendSelector<B> {
    pub fn new(backends: Vec<B>) -> Self {
        Self { backends }
    }

    pub fn dialects(&self) -> Vec<Dialect> {
        self.backends.iter().map(RobotBackend::dialect).collect()
    }

    /// Try each adapter in order and keep the first that lists robots.
    ///
    /// # Errors
    ///
    /// Returns the last adapter error when every adapter failed, or
    /// [`KoboldError::NoBackends`] when the selector is empty.
    #[instrument(skip(self), fields(candidates = self.backends.len()))]
    pub async fn discover(self) -> Result<Selection<B>, KoboldError> {
        let mut last_error = None;
        let mut first_empty = None;

        for backend in self.backends {
            let dialect = backend.dialect();
            match backend.list_robots().await {
                Ok(robots) if !robots.is_empty() => {
                    info!(%dialect, robots = robots.len(), "dialect selected");
                    return Ok(Selection { backend, robots });
                }
                Ok(_) => {
                    warn!(%dialect, "dialect listed no robots; trying next");
                    if first_empty.is_none() {
                        first_empty = Some(backend);
                    }
                }
                Err(e) => {
                    warn!(%dialect, error = %e, "dialect discovery failed; trying next");
                    last_error = Some(e);
                }
            }
        }

        if let Some(backend) = first_empty {
            return Ok(Selection {
                backend,
                robots: Vec::new(),
            });
        }
        Err(last_error.unwrap_or(KoboldError::NoBackends))
    }
}

impl BackendSelector<Backend> {
    /// Build concrete adapters for `dialects`, in the order given.
    pub fn for_dialects(
        dialects: &[Dialect],
        transport: &Transport,
        token: &str,
        hosts: &VendorHosts,
    ) -> Self {
        let backends = dialects
            .iter()
            .map(|dialect| match dialect {
                Dialect::Orbital => Backend::Orbital(OrbitalAdapter::with_hosts(
                    transport.clone(),
                    token,
                    hosts.beehive.clone(),
                    hosts.orbital.clone(),
                )),
                Dialect::Companion => Backend::Companion(CompanionAdapter::with_base_url(
                    transport.clone(),
                    token,
                    hosts.companion.clone(),
                )),
            })
            .collect();
        Self::new(backends)
    }
}
