//! Acquisition engine: one fixed pipeline (pre-run, pre-token-request, parameter assembly,
//! execution, cache update) shared by every flow strategy.

pub mod client_credential;
pub mod device_code;
pub mod interactive;
pub mod non_interactive;
pub mod refresh;

pub(crate) mod common;

pub use interactive::{
	AuthorizationResponse, InteractivePrompt, InteractiveRequest, PromptBehavior, PromptFuture,
};

// self
use crate::{
	_prelude::*,
	auth::{
		ClientCredential, ClientId, DeviceCodeResult, ResolvedUser, ResourceId, TokenSecret,
		UserAssertion, UserCredential, UserInfo,
	},
	authority::{Authority, AuthorityResolver, ResolvedAuthority},
	cache::{self, CacheUser, MemoryTokenCache, TokenCache, TokenCacheEntry, TokenCacheKey},
	context::RequestContext,
	error::ConfigError,
	flows::common::{FlowGuards, Grant},
	http::{HttpExecutor, HttpTransport, TransportErrorMapper},
	oauth::{self, TokenResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	platform::{NoPlatformIdentity, PlatformIdentity},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Engine specialized for the crate's default reqwest transport stack.
pub type ReqwestEngine = Engine<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Hosts trusted without instance discovery.
pub const DEFAULT_TRUSTED_HOSTS: &[&str] = &[
	"login.windows.net",
	"login.chinacloudapi.cn",
	"login.cloudgovapi.us",
	"login.microsoftonline.com",
	"login.microsoftonline.de",
	"login.microsoftonline.us",
	"login-us.microsoftonline.com",
];
/// Audience requested from WS-Trust when realm discovery names none.
pub const DEFAULT_AUDIENCE_URN: &str = "urn:federation:MicrosoftOnline";

/// Engine-wide configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
	/// Validate non-trusted authority hosts through instance discovery.
	pub validate_authority: bool,
	/// Tolerance subtracted from cached expiries.
	pub clock_skew: Duration,
	/// Emit PII-bearing log variants.
	pub log_pii: bool,
	/// Host serving instance discovery.
	pub instance_discovery_host: String,
	/// Hosts accepted without instance discovery; compared case-insensitively.
	pub trusted_hosts: Vec<String>,
	/// Audience requested from WS-Trust when realm discovery names none.
	pub default_audience_urn: String,
	/// Lifetime of the WS-Trust security header timestamp.
	pub ws_trust_lifetime: Duration,
	/// Reject WS-Trust token types other than SAML 1.1 and SAML 2.0.
	pub strict_token_type: bool,
}
impl EngineOptions {
	/// Returns `true` when `host` is in [`trusted_hosts`](Self::trusted_hosts).
	pub fn is_trusted_host(&self, host: &str) -> bool {
		self.trusted_hosts.iter().any(|trusted| trusted.eq_ignore_ascii_case(host))
	}
}
impl Default for EngineOptions {
	fn default() -> Self {
		Self {
			validate_authority: true,
			clock_skew: Duration::minutes(5),
			log_pii: false,
			instance_discovery_host: "login.microsoftonline.com".into(),
			trusted_hosts: DEFAULT_TRUSTED_HOSTS.iter().map(|host| (*host).to_owned()).collect(),
			default_audience_urn: DEFAULT_AUDIENCE_URN.into(),
			ws_trust_lifetime: Duration::minutes(10),
			strict_token_type: false,
		}
	}
}

/// Immutable per-call descriptor.
#[derive(Clone, Debug)]
pub struct RequestData {
	authority: Authority,
	client_id: ClientId,
	resource: ResourceId,
	correlation_id: Uuid,
	client_credential: Option<ClientCredential>,
}
impl RequestData {
	/// Starts a request for `resource` on behalf of `client_id` against `authority`.
	pub fn builder(
		authority: impl Into<String>,
		client_id: impl Into<String>,
		resource: impl Into<String>,
	) -> RequestDataBuilder {
		RequestDataBuilder {
			authority: authority.into(),
			client_id: client_id.into(),
			resource: resource.into(),
			correlation_id: None,
			client_credential: None,
		}
	}

	/// Canonical authority.
	pub fn authority(&self) -> &Authority {
		&self.authority
	}

	/// Client identifier.
	pub fn client_id(&self) -> &ClientId {
		&self.client_id
	}

	/// Target resource.
	pub fn resource(&self) -> &ResourceId {
		&self.resource
	}

	/// Correlation id sent with every request of the attempt.
	pub fn correlation_id(&self) -> Uuid {
		self.correlation_id
	}

	/// Confidential client credential, if any.
	pub fn client_credential(&self) -> Option<&ClientCredential> {
		self.client_credential.as_ref()
	}

	fn cache_key(&self, user: CacheUser) -> TokenCacheKey {
		TokenCacheKey::new(
			self.authority.as_str(),
			self.resource.clone(),
			self.client_id.clone(),
			user,
		)
	}
}

/// Builder for [`RequestData`].
#[derive(Clone, Debug)]
pub struct RequestDataBuilder {
	authority: String,
	client_id: String,
	resource: String,
	correlation_id: Option<Uuid>,
	client_credential: Option<ClientCredential>,
}
impl RequestDataBuilder {
	/// Overrides the generated correlation id.
	pub fn correlation_id(mut self, correlation_id: Uuid) -> Self {
		self.correlation_id = Some(correlation_id);

		self
	}

	/// Attaches a confidential client credential.
	pub fn client_credential(mut self, credential: ClientCredential) -> Self {
		self.client_credential = Some(credential);

		self
	}

	/// Validates the inputs.
	pub fn build(self) -> Result<RequestData> {
		Ok(RequestData {
			authority: Authority::parse(&self.authority)?,
			client_id: ClientId::new(&self.client_id).map_err(ConfigError::from)?,
			resource: ResourceId::new(&self.resource).map_err(ConfigError::from)?,
			correlation_id: self.correlation_id.unwrap_or_else(Uuid::new_v4),
			client_credential: self.client_credential,
		})
	}
}

/// Flow strategy selecting how the caller proves identity.
#[derive(Clone, Debug)]
pub enum Flow {
	/// Username/password or integrated credential; federated accounts go through WS-Trust.
	UserCredential(UserCredential),
	/// Pre-obtained bearer assertion; realm discovery is skipped.
	UserAssertion(UserAssertion),
	/// Authorization code grant through an [`InteractivePrompt`].
	Interactive(InteractiveRequest),
	/// Explicit refresh token redemption.
	RefreshToken(TokenSecret),
	/// Confidential client acquiring a token for itself.
	ClientCredential,
	/// One polling attempt for a device code.
	DeviceCode(DeviceCodeResult),
}
impl Flow {
	/// Observability label of the flow.
	pub fn kind(&self) -> FlowKind {
		match self {
			Self::UserCredential(_) | Self::UserAssertion(_) => FlowKind::NonInteractive,
			Self::Interactive(_) => FlowKind::Interactive,
			Self::RefreshToken(_) => FlowKind::RefreshToken,
			Self::ClientCredential => FlowKind::ClientCredential,
			Self::DeviceCode(_) => FlowKind::DeviceCode,
		}
	}
}

/// Pipeline stage of one acquisition attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowState {
	/// Attempt constructed.
	Created,
	/// Inputs validated, authority resolved, cache consulted.
	PreRun,
	/// Flow-specific preparation (federation, interactive prompt).
	PreTokenRequest,
	/// Grant parameters assembled.
	RequestBuilt,
	/// Token request answered.
	Executed,
	/// Token returned to the caller.
	Succeeded,
	/// Error returned to the caller.
	Failed,
}
impl FlowState {
	/// Returns a stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Created => "created",
			Self::PreRun => "pre_run",
			Self::PreTokenRequest => "pre_token_request",
			Self::RequestBuilt => "request_built",
			Self::Executed => "executed",
			Self::Succeeded => "succeeded",
			Self::Failed => "failed",
		}
	}
}
impl Display for FlowState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Where a [`TokenResult`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenSource {
	/// Served from a still-usable cache entry.
	Cache,
	/// Issued by the token endpoint during this attempt.
	Network,
}

/// Successful acquisition.
#[derive(Clone, Debug)]
pub struct TokenResult {
	/// Cached token data.
	pub entry: TokenCacheEntry,
	/// Key the entry is stored under.
	pub key: TokenCacheKey,
	/// Origin of the entry.
	pub source: TokenSource,
	/// Correlation id of the attempt.
	pub correlation_id: Uuid,
}
impl TokenResult {
	/// Access token secret.
	pub fn access_token(&self) -> &TokenSecret {
		&self.entry.access_token
	}

	/// Expiry instant.
	pub fn expires_on(&self) -> OffsetDateTime {
		self.entry.expires_on
	}

	/// Identity claims from the id token, when issued.
	pub fn user_info(&self) -> Option<&UserInfo> {
		self.entry.user_info.as_ref()
	}
}

/// Flow input after pre-run validation; usernames are resolved and required inputs are present.
#[derive(Clone, Debug)]
pub(crate) enum Prepared {
	User(ResolvedUser),
	Assertion(UserAssertion),
	Interactive(InteractiveRequest),
	RefreshToken(TokenSecret),
	ClientCredential,
	DeviceCode(DeviceCodeResult),
}
impl Prepared {
	/// User the cache is consulted for before the request; `None` skips the lookup.
	fn lookup_user(&self) -> Option<CacheUser> {
		match self {
			Self::User(user) => Some(CacheUser::user(user.username())),
			Self::Assertion(assertion) => assertion.user_name().map(CacheUser::user),
			Self::Interactive(request) => request.cache_user(),
			Self::ClientCredential => Some(CacheUser::NoUser),
			Self::RefreshToken(_) | Self::DeviceCode(_) => None,
		}
	}
}

/// Token acquisition engine.
///
/// The engine owns the transport, the token cache, the authority cache, and the collaborators.
/// Attempts run fully in parallel; only attempts contending on the same cache key are
/// serialized.
pub struct Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http: HttpExecutor<C, M>,
	cache: Arc<dyn TokenCache>,
	authorities: Arc<AuthorityResolver>,
	platform: Arc<dyn PlatformIdentity>,
	prompt: Option<Arc<dyn InteractivePrompt>>,
	options: EngineOptions,
	flow_guards: Arc<FlowGuards<TokenCacheKey>>,
}
impl<C, M> Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an engine that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(http_client: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self {
		Self {
			http: HttpExecutor::new(http_client.into(), mapper.into()),
			cache: Arc::new(MemoryTokenCache::default()),
			authorities: Default::default(),
			platform: Arc::new(NoPlatformIdentity),
			prompt: None,
			options: EngineOptions::default(),
			flow_guards: Default::default(),
		}
	}

	/// Replaces the token cache.
	pub fn with_cache(mut self, cache: Arc<dyn TokenCache>) -> Self {
		self.cache = cache;

		self
	}

	/// Shares an authority cache with other engines.
	pub fn with_authority_resolver(mut self, authorities: Arc<AuthorityResolver>) -> Self {
		self.authorities = authorities;

		self
	}

	/// Sets the collaborator that fills missing usernames.
	pub fn with_platform_identity(mut self, platform: Arc<dyn PlatformIdentity>) -> Self {
		self.platform = platform;

		self
	}

	/// Sets the collaborator that shows the authorization UI.
	pub fn with_prompt(mut self, prompt: Arc<dyn InteractivePrompt>) -> Self {
		self.prompt = Some(prompt);

		self
	}

	/// Replaces the options.
	pub fn with_options(mut self, options: EngineOptions) -> Self {
		self.options = options;

		self
	}

	/// Engine options.
	pub fn options(&self) -> &EngineOptions {
		&self.options
	}

	/// Token cache.
	pub fn cache(&self) -> &Arc<dyn TokenCache> {
		&self.cache
	}

	/// Authority cache.
	pub fn authorities(&self) -> &Arc<AuthorityResolver> {
		&self.authorities
	}

	/// Runs one acquisition attempt.
	pub async fn acquire(&self, request: &RequestData, flow: Flow) -> Result<TokenResult> {
		self.acquire_with_cancellation(request, flow, CancellationToken::new()).await
	}

	/// Runs one acquisition attempt that `cancellation` aborts at any network call.
	pub async fn acquire_with_cancellation(
		&self,
		request: &RequestData,
		flow: Flow,
		cancellation: CancellationToken,
	) -> Result<TokenResult> {
		let kind = flow.kind();
		let ctx = RequestContext::new(request.correlation_id(), self.options.log_pii, cancellation);
		let span = FlowSpan::new(kind, "acquire", ctx.correlation_id);

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		let result = span.instrument(self.run(request, flow, &ctx)).await;

		match &result {
			Ok(token) if token.source == TokenSource::Cache => {
				transition(&ctx, FlowState::Succeeded);
				obs::record_flow_outcome(kind, FlowOutcome::CacheHit);
			},
			Ok(_) => {
				transition(&ctx, FlowState::Succeeded);
				obs::record_flow_outcome(kind, FlowOutcome::Success);
			},
			Err(err) => {
				transition(&ctx, FlowState::Failed);
				ctx.logger.warning(format_args!("Token acquisition failed: {err}"));
				obs::record_flow_outcome(kind, FlowOutcome::Failure);
			},
		}

		result
	}

	async fn run(
		&self,
		request: &RequestData,
		flow: Flow,
		ctx: &RequestContext,
	) -> Result<TokenResult> {
		transition(ctx, FlowState::Created);
		ctx.ensure_active()?;
		transition(ctx, FlowState::PreRun);

		let authority =
			self.authorities.resolve(&self.http, &self.options, request.authority(), ctx).await?;
		let prepared = self.pre_run(request, flow, ctx).await?;
		let lookup_key = prepared.lookup_user().map(|user| request.cache_key(user));
		let _singleflight = match &lookup_key {
			Some(key) => Some(self.flow_guards.lock(key.clone()).await),
			None => None,
		};

		if let Some(key) = lookup_key.as_ref().filter(|_| reads_cache(&prepared)) {
			if let Some(result) = self.from_cache(key, &authority, request, ctx).await? {
				return Ok(result);
			}
		}

		transition(ctx, FlowState::PreTokenRequest);

		// Interactive sign-in may pick a different account than the hint.
		let pinned_user = match &prepared {
			Prepared::Interactive(_) => None,
			_ => lookup_key.as_ref().map(|key| key.user.clone()),
		};
		let hinted_user = lookup_key.map(|key| key.user);
		let previous_refresh = match &prepared {
			Prepared::RefreshToken(token) => Some(token.clone()),
			_ => None,
		};
		let grant = self.pre_token_request(&authority, request, prepared, ctx).await?;
		let response = self.execute(&authority, request, &grant, ctx).await?;
		let entry = entry_from_response(response, previous_refresh)?;
		let user = pinned_user
			.or_else(|| entry.displayable_id().map(CacheUser::user))
			.or(hinted_user)
			.unwrap_or(if grant.has_user_context() {
				CacheUser::Unidentified
			} else {
				CacheUser::NoUser
			});
		let key = request.cache_key(user);

		if key.user.is_cacheable() {
			self.cache.store(key.clone(), entry.clone()).await?;
			ctx.logger.verbose("Token cache updated.");
			ctx.logger.verbose_pii(format_args!("Token cache updated for {:?}.", key.user));
		} else {
			ctx.logger.warning("Token response names no user; the token is not cached.");
		}

		Ok(TokenResult {
			entry,
			key,
			source: TokenSource::Network,
			correlation_id: ctx.correlation_id,
		})
	}

	async fn pre_run(
		&self,
		request: &RequestData,
		flow: Flow,
		ctx: &RequestContext,
	) -> Result<Prepared> {
		match flow {
			Flow::UserCredential(credential) =>
				non_interactive::resolve_user(&credential, self.platform.as_ref(), ctx)
					.await
					.map(Prepared::User),
			Flow::UserAssertion(assertion) => Ok(Prepared::Assertion(assertion)),
			Flow::Interactive(interactive) => {
				if interactive.prompt() != PromptBehavior::Never && self.prompt.is_none() {
					return Err(
						ConfigError::MissingCollaborator { collaborator: "interactive prompt" }.into()
					);
				}

				Ok(Prepared::Interactive(interactive))
			},
			Flow::RefreshToken(token) => refresh::validate(token).map(Prepared::RefreshToken),
			Flow::ClientCredential => {
				client_credential::validate(request)?;

				Ok(Prepared::ClientCredential)
			},
			Flow::DeviceCode(device_code) => {
				device_code::validate(&device_code, OffsetDateTime::now_utc())?;

				Ok(Prepared::DeviceCode(device_code))
			},
		}
	}

	async fn pre_token_request(
		&self,
		authority: &ResolvedAuthority,
		request: &RequestData,
		prepared: Prepared,
		ctx: &RequestContext,
	) -> Result<Grant> {
		match prepared {
			Prepared::User(user) =>
				non_interactive::prepare_grant(&self.http, &self.options, authority, user, ctx).await,
			Prepared::Assertion(assertion) => {
				ctx.logger.verbose("Using the supplied assertion; realm discovery is skipped.");

				Ok(Grant::Assertion(assertion))
			},
			Prepared::Interactive(interactive) =>
				interactive::authorize(self.prompt.as_deref(), authority, request, &interactive, ctx)
					.await,
			Prepared::RefreshToken(token) => Ok(Grant::RefreshToken(token)),
			Prepared::ClientCredential => Ok(Grant::ClientCredentials),
			Prepared::DeviceCode(device_code) => Ok(Grant::DeviceCode(device_code.device_code)),
		}
	}

	async fn execute(
		&self,
		authority: &ResolvedAuthority,
		request: &RequestData,
		grant: &Grant,
		ctx: &RequestContext,
	) -> Result<TokenResponse> {
		let params = grant.build_parameters(request)?;

		transition(ctx, FlowState::RequestBuilt);

		let response =
			oauth::send_token_request(&self.http, &authority.endpoints.token, &params, ctx).await?;

		transition(ctx, FlowState::Executed);

		Ok(response)
	}

	/// Serves a usable cache entry, or redeems the refresh token of an unusable one.
	///
	/// A service error from the refresh falls through to the flow's own grant; an `invalid_grant`
	/// additionally drops the stale entry.
	async fn from_cache(
		&self,
		key: &TokenCacheKey,
		authority: &ResolvedAuthority,
		request: &RequestData,
		ctx: &RequestContext,
	) -> Result<Option<TokenResult>> {
		let Some(entry) = self.cache.lookup(key).await? else {
			ctx.logger.verbose("No cached token.");

			return Ok(None);
		};

		if cache::is_usable(&entry, self.options.clock_skew, OffsetDateTime::now_utc()) {
			ctx.logger.info("Serving token from cache.");

			return Ok(Some(TokenResult {
				entry,
				key: key.clone(),
				source: TokenSource::Cache,
				correlation_id: ctx.correlation_id,
			}));
		}

		let Some(refresh_token) = entry.refresh_token else {
			ctx.logger.verbose("Cached token expired and carries no refresh token.");

			return Ok(None);
		};

		ctx.logger.info("Cached token expired; redeeming its refresh token.");

		let grant = Grant::RefreshToken(refresh_token.clone());

		match self.execute(authority, request, &grant, ctx).await {
			Ok(response) => {
				let entry = entry_from_response(response, Some(refresh_token))?;

				self.cache.store(key.clone(), entry.clone()).await?;

				Ok(Some(TokenResult {
					entry,
					key: key.clone(),
					source: TokenSource::Network,
					correlation_id: ctx.correlation_id,
				}))
			},
			Err(Error::Service(err)) => {
				ctx.logger.warning(format_args!(
					"Refreshing the cached token failed with `{}`; falling back to the flow grant.",
					err.code
				));

				if err.is_invalid_grant() {
					self.cache.remove(key).await?;
				}

				Ok(None)
			},
			Err(err) => Err(err),
		}
	}
}
#[cfg(feature = "reqwest")]
impl Engine<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates an engine that provisions its own reqwest-backed transport.
	pub fn new() -> Self {
		Self::with_http_client(ReqwestHttpClient::default(), Arc::new(ReqwestTransportErrorMapper))
	}
}
#[cfg(feature = "reqwest")]
impl Default for Engine<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	fn default() -> Self {
		Self::new()
	}
}
impl<C, M> Clone for Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			http: self.http.clone(),
			cache: self.cache.clone(),
			authorities: self.authorities.clone(),
			platform: self.platform.clone(),
			prompt: self.prompt.clone(),
			options: self.options.clone(),
			flow_guards: self.flow_guards.clone(),
		}
	}
}
impl<C, M> Debug for Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Engine")
			.field("options", &self.options)
			.field("authorities", &self.authorities)
			.field("prompt_set", &self.prompt.is_some())
			.finish()
	}
}

fn transition(ctx: &RequestContext, state: FlowState) {
	ctx.logger.verbose(format_args!("Flow state: {state}."));
}

fn reads_cache(prepared: &Prepared) -> bool {
	match prepared {
		Prepared::Interactive(request) => request.prompt() != PromptBehavior::Always,
		_ => true,
	}
}

/// Builds the cache entry; a response without a refresh token keeps `previous_refresh`.
fn entry_from_response(
	response: TokenResponse,
	previous_refresh: Option<TokenSecret>,
) -> Result<TokenCacheEntry> {
	let mut entry = TokenCacheEntry::from_response(response, OffsetDateTime::now_utc())?;

	if entry.refresh_token.is_none() {
		entry.refresh_token = previous_refresh;
	}

	Ok(entry)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn options_default_to_validation_with_trusted_public_clouds() {
		let options = EngineOptions::default();

		assert!(options.validate_authority);
		assert!(options.is_trusted_host("LOGIN.microsoftonline.com"));
		assert!(!options.is_trusted_host("login.contoso.com"));
		assert_eq!(options.clock_skew, Duration::minutes(5));
		assert_eq!(options.default_audience_urn, DEFAULT_AUDIENCE_URN);
	}

	#[test]
	fn options_deserialize_partially() {
		let options: EngineOptions =
			serde_json::from_str(r#"{"log_pii":true,"strict_token_type":true}"#)
				.expect("Partial options should deserialize.");

		assert!(options.log_pii);
		assert!(options.strict_token_type);
		assert!(options.validate_authority);
	}

	#[test]
	fn request_data_validates_inputs() {
		let request = RequestData::builder("https://login.microsoftonline.com/Contoso.com", "c", "r")
			.correlation_id(Uuid::nil())
			.build()
			.expect("Valid inputs should build.");

		assert_eq!(request.authority().as_str(), "https://login.microsoftonline.com/contoso.com/");
		assert_eq!(request.correlation_id(), Uuid::nil());

		let insecure = RequestData::builder("http://login.microsoftonline.com/x", "c", "r");
		let blank_client = RequestData::builder("https://login.microsoftonline.com/x", " ", "r");

		assert!(insecure.build().is_err());
		assert!(blank_client.build().is_err());
	}

	#[test]
	fn refresh_token_is_kept_when_the_response_omits_it() {
		let response: TokenResponse =
			serde_json::from_str(r#"{"access_token":"at","expires_in":3600}"#)
				.expect("Token response fixture should parse.");
		let entry = entry_from_response(response, Some(TokenSecret::new("rt")))
			.expect("Entry should build.");

		assert_eq!(entry.refresh_token.as_ref().map(TokenSecret::expose), Some("rt"));
	}

	#[test]
	fn lookup_user_follows_the_flow() {
		let user = UserCredential::password("pw").resolve("Alice@Contoso.com");

		assert_eq!(
			Prepared::User(user).lookup_user(),
			Some(CacheUser::User("alice@contoso.com".into()))
		);
		assert_eq!(Prepared::ClientCredential.lookup_user(), Some(CacheUser::NoUser));
		assert_eq!(Prepared::RefreshToken(TokenSecret::new("rt")).lookup_user(), None);
	}
}
