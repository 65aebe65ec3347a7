//! Per-request logger with a separate channel for personally identifiable information.

// self
use crate::_prelude::*;

/// Target used for general acquisition log lines.
pub const LOG_TARGET: &str = "oauth2_acquire";
/// Target used for log lines that may carry personally identifiable information.
pub const PII_LOG_TARGET: &str = "oauth2_acquire::pii";

macro_rules! emit {
	($logger:expr, $level:ident, $message:expr, general) => {{
		#[cfg(feature = "tracing")]
		tracing::$level!(
			target: LOG_TARGET,
			correlation_id = %$logger.correlation_id,
			"{}",
			$message
		);

		emit!($logger, $level, $message, pii);
	}};
	($logger:expr, $level:ident, $message:expr, pii) => {{
		if $logger.pii {
			#[cfg(feature = "tracing")]
			tracing::$level!(
				target: PII_LOG_TARGET,
				correlation_id = %$logger.correlation_id,
				"{}",
				$message
			);
		}

		#[cfg(not(feature = "tracing"))]
		let _ = $message;
	}};
}

/// Logger bound to one acquisition request.
///
/// Every line carries the request's correlation id. General lines go to [`LOG_TARGET`] and, when
/// the engine was configured with `log_pii`, are mirrored to [`PII_LOG_TARGET`]. The `*_pii`
/// variants carry user identifiers or endpoints and write only to [`PII_LOG_TARGET`], only when
/// `log_pii` is set, so subscribers can route or drop them independently.
#[derive(Clone, Debug)]
pub struct RequestLogger {
	correlation_id: Uuid,
	pii: bool,
}
impl RequestLogger {
	/// Creates a logger for `correlation_id`.
	pub fn new(correlation_id: Uuid, pii: bool) -> Self {
		Self { correlation_id, pii }
	}

	/// Returns `true` when PII lines are emitted.
	pub fn pii_enabled(&self) -> bool {
		self.pii
	}

	/// Informational line.
	pub fn info(&self, message: impl Display) {
		emit!(self, info, message, general);
	}

	/// Informational line that may contain PII.
	pub fn info_pii(&self, message: impl Display) {
		emit!(self, info, message, pii);
	}

	/// Verbose line.
	pub fn verbose(&self, message: impl Display) {
		emit!(self, debug, message, general);
	}

	/// Verbose line that may contain PII.
	pub fn verbose_pii(&self, message: impl Display) {
		emit!(self, debug, message, pii);
	}

	/// Warning line.
	pub fn warning(&self, message: impl Display) {
		emit!(self, warn, message, general);
	}
}

#[cfg(all(test, feature = "tracing"))]
mod tests {
	// std
	use std::io::{self, Write};
	// crates.io
	use tracing_subscriber::fmt::MakeWriter;
	// self
	use super::*;

	#[derive(Clone, Default)]
	struct Captured(Arc<Mutex<Vec<u8>>>);
	impl Captured {
		fn lines(&self) -> Vec<String> {
			String::from_utf8_lossy(&self.0.lock()).lines().map(str::to_owned).collect()
		}
	}
	impl Write for Captured {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().extend_from_slice(buf);

			Ok(buf.len())
		}

		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}
	impl<'a> MakeWriter<'a> for Captured {
		type Writer = Self;

		fn make_writer(&'a self) -> Self::Writer {
			self.clone()
		}
	}

	fn capture(pii: bool, log: impl FnOnce(&RequestLogger)) -> Vec<String> {
		let captured = Captured::default();
		let subscriber = tracing_subscriber::fmt()
			.with_writer(captured.clone())
			.with_max_level(tracing::Level::DEBUG)
			.with_ansi(false)
			.with_target(true)
			.finish();
		let logger = RequestLogger::new(Uuid::nil(), pii);

		tracing::subscriber::with_default(subscriber, || log(&logger));

		captured.lines()
	}

	fn count(lines: &[String], target: &str, message: &str) -> usize {
		let prefix = format!("{target}: ");

		lines.iter().filter(|line| line.contains(&prefix) && line.contains(message)).count()
	}

	#[test]
	fn general_lines_are_mirrored_to_the_pii_channel_when_enabled() {
		let lines = capture(true, |logger| {
			logger.info("Serving token from cache.");
			logger.warning("Realm discovery failed.");
		});

		assert_eq!(count(&lines, LOG_TARGET, "Serving token from cache."), 1);
		assert_eq!(count(&lines, PII_LOG_TARGET, "Serving token from cache."), 1);
		assert_eq!(count(&lines, LOG_TARGET, "Realm discovery failed."), 1);
		assert_eq!(count(&lines, PII_LOG_TARGET, "Realm discovery failed."), 1);
	}

	#[test]
	fn pii_lines_never_reach_the_general_channel() {
		let lines = capture(true, |logger| logger.verbose_pii("Token for alice@contoso.com."));

		assert_eq!(count(&lines, LOG_TARGET, "alice@contoso.com"), 0);
		assert_eq!(count(&lines, PII_LOG_TARGET, "alice@contoso.com"), 1);
	}

	#[test]
	fn pii_channel_is_silent_unless_enabled() {
		let lines = capture(false, |logger| {
			logger.verbose("Flow state: created.");
			logger.info_pii("Platform identity returned `alice@contoso.com`.");
		});

		assert_eq!(count(&lines, LOG_TARGET, "Flow state: created."), 1);
		assert!(lines.iter().all(|line| !line.contains(PII_LOG_TARGET)));
	}
}
