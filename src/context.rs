//! Per-acquisition context threaded through every pipeline stage.

// self
use crate::{_prelude::*, obs::RequestLogger};

/// Correlation id, logger, and cancellation token of one acquisition.
#[derive(Clone, Debug)]
pub struct RequestContext {
	/// Client-generated correlation identifier sent with every request.
	pub correlation_id: Uuid,
	/// Logger bound to the correlation id.
	pub logger: RequestLogger,
	/// Token observed by every network call.
	pub cancellation: CancellationToken,
}
impl RequestContext {
	/// Creates a context for `correlation_id`.
	pub fn new(correlation_id: Uuid, log_pii: bool, cancellation: CancellationToken) -> Self {
		Self { correlation_id, logger: RequestLogger::new(correlation_id, log_pii), cancellation }
	}

	/// Fails with [`Error::Cancelled`] when the caller already cancelled.
	pub fn ensure_active(&self) -> Result<()> {
		if self.cancellation.is_cancelled() { Err(Error::Cancelled) } else { Ok(()) }
	}
}
