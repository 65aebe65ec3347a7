//! Shared pieces of the acquisition pipeline: per-key guards and grant parameter assembly.

// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	auth::{ResolvedUser, TokenSecret, UserAssertion},
	flows::RequestData,
	oauth::{GrantType, OPENID_SCOPE, RequestParameters, param},
};

/// Per-key singleflight guards; only callers contending on the same key wait for each other.
///
/// A key's entry lives only while a caller holds or awaits its lease.
pub(crate) struct FlowGuards<K>(Mutex<HashMap<K, Arc<AsyncMutex<()>>>>);
impl<K> FlowGuards<K>
where
	K: Clone + Eq + Hash,
{
	/// Waits until no other caller holds `key`.
	pub(crate) async fn lock(&self, key: K) -> FlowLease<'_, K> {
		let mut lease = FlowLease { guards: self, key, guard: None };
		let mutex = self
			.0
			.lock()
			.entry(lease.key.clone())
			.or_insert_with(|| Arc::new(AsyncMutex::new(())))
			.clone();

		lease.guard = Some(mutex.lock_arc().await);

		lease
	}

	#[cfg(test)]
	fn len(&self) -> usize {
		self.0.lock().len()
	}
}
impl<K> FlowGuards<K>
where
	K: Eq + Hash,
{
	fn release(&self, key: &K) {
		let mut guards = self.0.lock();

		if guards.get(key).is_some_and(|mutex| Arc::strong_count(mutex) == 1) {
			guards.remove(key);
		}
	}
}
impl<K> Default for FlowGuards<K> {
	fn default() -> Self {
		Self(Mutex::new(HashMap::new()))
	}
}
impl<K> Debug for FlowGuards<K> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FlowGuards").field("keys", &self.0.lock().len()).finish()
	}
}

/// Exclusive hold on one key of a [`FlowGuards`] map.
pub(crate) struct FlowLease<'a, K>
where
	K: Eq + Hash,
{
	guards: &'a FlowGuards<K>,
	key: K,
	guard: Option<MutexGuardArc<()>>,
}
impl<K> Drop for FlowLease<'_, K>
where
	K: Eq + Hash,
{
	fn drop(&mut self) {
		self.guard.take();
		self.guards.release(&self.key);
	}
}

/// Grant material chosen by the pre-token-request stage.
#[derive(Clone, Debug)]
pub(crate) enum Grant {
	Password(ResolvedUser),
	Assertion(UserAssertion),
	RefreshToken(TokenSecret),
	ClientCredentials,
	AuthorizationCode { code: TokenSecret, redirect_uri: Url, verifier: TokenSecret },
	DeviceCode(TokenSecret),
}
impl Grant {
	/// Whether the token is issued on behalf of a user and should come with an id token.
	pub(crate) fn has_user_context(&self) -> bool {
		!matches!(self, Self::ClientCredentials)
	}

	/// Assembles the token request form. Later inserts replace earlier ones.
	pub(crate) fn build_parameters(&self, request: &RequestData) -> Result<RequestParameters> {
		let mut params = RequestParameters::default();

		params.insert(param::CLIENT_ID, request.client_id().to_string());
		params.insert(param::RESOURCE, request.resource().to_string());

		match self {
			Self::Password(user) => user.apply_password_grant(&mut params)?,
			Self::Assertion(assertion) => assertion.apply_to(&mut params),
			Self::RefreshToken(token) => {
				params.insert(param::GRANT_TYPE, GrantType::RefreshToken.as_str());
				params.insert(param::REFRESH_TOKEN, token.expose());
			},
			Self::ClientCredentials =>
				params.insert(param::GRANT_TYPE, GrantType::ClientCredentials.as_str()),
			Self::AuthorizationCode { code, redirect_uri, verifier } => {
				params.insert(param::GRANT_TYPE, GrantType::AuthorizationCode.as_str());
				params.insert(param::CODE, code.expose());
				params.insert(param::REDIRECT_URI, redirect_uri.as_str());
				params.insert(param::CODE_VERIFIER, verifier.expose());
			},
			Self::DeviceCode(code) => {
				params.insert(param::GRANT_TYPE, GrantType::DeviceCode.as_str());
				params.insert(param::CODE, code.expose());
			},
		}

		if self.has_user_context() {
			params.insert(param::SCOPE, OPENID_SCOPE);
		}
		if let Some(credential) = request.client_credential() {
			credential.apply_to(&mut params);
		}

		Ok(params)
	}
}
