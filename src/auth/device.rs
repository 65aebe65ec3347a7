//! Device code sign-in handle.

// self
use crate::{
	_prelude::*,
	auth::{ClientId, ResourceId, TokenSecret},
};

/// Device code issued by the device authorization endpoint.
///
/// The caller shows [`message`](Self::message) (or the user code and verification URL) to the
/// user, then polls with the device-code flow no faster than [`interval`](Self::interval).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCodeResult {
	/// Code redeemed at the token endpoint.
	pub device_code: TokenSecret,
	/// Code the user types at the verification URL.
	pub user_code: String,
	/// URL where the user completes sign-in.
	pub verification_url: String,
	/// Instant after which the device code can no longer be redeemed.
	pub expires_on: OffsetDateTime,
	/// Minimum polling interval.
	pub interval: Duration,
	/// Human-readable instructions returned by the provider.
	pub message: Option<String>,
	/// Client the code was issued to.
	pub client_id: ClientId,
	/// Resource the code was issued for.
	pub resource: ResourceId,
}
impl DeviceCodeResult {
	/// Returns `true` once the code can no longer be redeemed.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		now >= self.expires_on
	}
}
