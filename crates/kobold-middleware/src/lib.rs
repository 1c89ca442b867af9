//! `kobold-middleware` – Vendor Plumbing
//!
//! Everything that touches a vendor host lives here.  Nothing in this crate
//! holds robot state between calls.
//!
//! # Modules
//!
//! - [`transport`] – [`Transport`]: one authenticated HTTP exchange with a
//!   timeout, normalized into a [`Payload`] or a
//!   [`KoboldError`][kobold_types::KoboldError].
//! - [`adapter`] – the [`RobotBackend`] contract and the [`Backend`] tagged
//!   union over both dialects.
//! - [`orbital_adapter`] – [`OrbitalAdapter`]: Beehive / Orbital dialect.
//! - [`companion_adapter`] – [`CompanionAdapter`]: Companion dialect.
//! - [`selector`] – [`BackendSelector`]: ordered dialect fallback at
//!   discovery time.

pub mod adapter;
pub mod companion_adapter;
pub mod orbital_adapter;
mod payload;
pub mod selector;
pub mod transport;

pub use adapter::{Backend, RobotBackend, SpotOptions, StartOptions};
pub use companion_adapter::CompanionAdapter;
pub use orbital_adapter::OrbitalAdapter;
pub use selector::{BackendSelector, Selection, VendorHosts};
pub use transport::{Payload, Transport};
