//! Platform identity collaborator used to fill a missing username.

// self
use crate::_prelude::*;

/// Future returned by [`PlatformIdentity`].
pub type PlatformFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + 'a + Send>>;

/// Looks up the user principal name of the signed-in platform user.
pub trait PlatformIdentity
where
	Self: Send + Sync,
{
	/// Returns the signed-in user's principal name, or `None` when unavailable.
	fn user_principal_name(&self) -> PlatformFuture<'_>;
}

/// Platform without a signed-in user.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPlatformIdentity;
impl PlatformIdentity for NoPlatformIdentity {
	fn user_principal_name(&self) -> PlatformFuture<'_> {
		Box::pin(async { None })
	}
}

/// Platform identity that always answers with a fixed principal name.
#[derive(Clone, Debug)]
pub struct FixedPlatformIdentity(String);
impl FixedPlatformIdentity {
	/// Creates an identity answering with `upn`.
	pub fn new(upn: impl Into<String>) -> Self {
		Self(upn.into())
	}
}
impl PlatformIdentity for FixedPlatformIdentity {
	fn user_principal_name(&self) -> PlatformFuture<'_> {
		let upn = self.0.clone();

		Box::pin(async move { Some(upn) })
	}
}
