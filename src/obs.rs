//! Optional observability helpers for acquisition flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_acquire.flow` with the `flow` and
//!   `stage` fields, plus the per-request log lines written by [`RequestLogger`].
//! - Enable `metrics` to increment the `oauth2_acquire_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`.

mod log;
mod metrics;
mod tracing;

pub use log::*;
pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Acquisition flow kinds observed by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Username/password, integrated or bearer-assertion acquisition.
	NonInteractive,
	/// Authorization code acquisition through an interactive prompt.
	Interactive,
	/// Refresh token redemption.
	RefreshToken,
	/// Confidential client acquiring a token for itself.
	ClientCredential,
	/// Device code polling.
	DeviceCode,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::NonInteractive => "non_interactive",
			FlowKind::Interactive => "interactive",
			FlowKind::RefreshToken => "refresh_token",
			FlowKind::ClientCredential => "client_credential",
			FlowKind::DeviceCode => "device_code",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an acquisition.
	Attempt,
	/// Token served from the cache.
	CacheHit,
	/// Successful completion through the network.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::CacheHit => "cache_hit",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
