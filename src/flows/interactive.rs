//! Authorization code + PKCE acquisition through an interactive prompt.
//!
//! The engine builds the authorize URL (with `state` and an S256 PKCE challenge) and hands it to
//! the caller's [`InteractivePrompt`], which shows the UI and returns the redirect parameters.
//! The code is then redeemed at the token endpoint with the PKCE verifier.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{ClientId, ResourceId, TokenSecret},
	authority::ResolvedAuthority,
	cache::CacheUser,
	context::RequestContext,
	error::{ConfigError, ErrorKind, ServiceError},
	flows::{Engine, Flow, RequestData, TokenResult, common::Grant},
	http::{HttpTransport, TransportErrorMapper},
};

const STATE_LEN: usize = 32;
const PKCE_VERIFIER_LEN: usize = 64;

/// Future returned by [`InteractivePrompt::authorize`].
pub type PromptFuture<'a> =
	Pin<Box<dyn Future<Output = Result<AuthorizationResponse>> + 'a + Send>>;

/// Collaborator that shows the authorization UI.
pub trait InteractivePrompt
where
	Self: Send + Sync,
{
	/// Navigates the user to `authorize_url` and returns what the provider sent to
	/// `redirect_uri`.
	fn authorize<'a>(&'a self, authorize_url: &'a Url, redirect_uri: &'a Url) -> PromptFuture<'a>;
}

/// When the prompt may be shown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptBehavior {
	/// Serve from the cache when possible; prompt otherwise.
	#[default]
	Auto,
	/// Skip the cache and always prompt (`prompt=login`).
	Always,
	/// Never prompt; fail with `user_interaction_required` when the cache cannot serve.
	Never,
}

/// Inputs of an interactive acquisition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteractiveRequest {
	redirect_uri: Url,
	prompt: PromptBehavior,
	login_hint: Option<String>,
}
impl InteractiveRequest {
	/// Interactive request redirecting to `redirect_uri`.
	pub fn new(redirect_uri: Url) -> Self {
		Self { redirect_uri, prompt: PromptBehavior::Auto, login_hint: None }
	}

	/// Sets the prompt behavior.
	pub fn with_prompt(mut self, prompt: PromptBehavior) -> Self {
		self.prompt = prompt;

		self
	}

	/// Pre-fills the sign-in page and scopes the cache lookup to this user.
	pub fn with_login_hint(mut self, login_hint: impl Into<String>) -> Self {
		self.login_hint = Some(login_hint.into()).filter(|hint| !hint.trim().is_empty());

		self
	}

	/// Redirect URI registered for the client.
	pub fn redirect_uri(&self) -> &Url {
		&self.redirect_uri
	}

	/// Prompt behavior.
	pub fn prompt(&self) -> PromptBehavior {
		self.prompt
	}

	/// Login hint, if any.
	pub fn login_hint(&self) -> Option<&str> {
		self.login_hint.as_deref()
	}

	pub(crate) fn cache_user(&self) -> Option<CacheUser> {
		self.login_hint.as_deref().map(CacheUser::user)
	}
}

/// Parameters the provider appended to the redirect URI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationResponse {
	/// Authorization code.
	pub code: Option<String>,
	/// Returned `state`.
	pub state: Option<String>,
	/// Provider error code.
	pub error: Option<String>,
	/// Provider error description.
	pub error_description: Option<String>,
}
impl AuthorizationResponse {
	/// Reads the response from the query of the final redirect URL.
	pub fn from_redirect_url(url: &Url) -> Self {
		let mut response = Self::default();

		for (name, value) in url.query_pairs() {
			let slot = match &*name {
				"code" => &mut response.code,
				"state" => &mut response.state,
				"error" => &mut response.error,
				"error_description" => &mut response.error_description,
				_ => continue,
			};

			*slot = Some(value.into_owned());
		}

		response
	}
}

impl<C, M> Engine<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Acquires a token through the configured [`InteractivePrompt`].
	pub async fn acquire_interactive(
		&self,
		request: &RequestData,
		interactive: InteractiveRequest,
	) -> Result<TokenResult> {
		self.acquire(request, Flow::Interactive(interactive)).await
	}
}

/// Shows the prompt and turns its answer into an authorization code grant.
pub(crate) async fn authorize(
	prompt: Option<&dyn InteractivePrompt>,
	authority: &ResolvedAuthority,
	request: &RequestData,
	interactive: &InteractiveRequest,
	ctx: &RequestContext,
) -> Result<Grant> {
	if interactive.prompt() == PromptBehavior::Never {
		ctx.logger.warning("The cache cannot serve the request and prompting is disabled.");

		return Err(ErrorKind::UserInteractionRequired.into());
	}

	let prompt =
		prompt.ok_or(ConfigError::MissingCollaborator { collaborator: "interactive prompt" })?;
	let session = AuthorizationSession::new(
		&authority.endpoints.authorization,
		request.client_id(),
		request.resource(),
		interactive,
		ctx.correlation_id,
	);

	ctx.logger.verbose_pii(format_args!("Prompting at {}.", session.authorize_url));

	let response = tokio::select! {
		biased;
		_ = ctx.cancellation.cancelled() => return Err(Error::Cancelled),
		response = prompt.authorize(&session.authorize_url, &session.redirect_uri) => response?,
	};
	let code = session.validate(response)?;

	Ok(Grant::AuthorizationCode {
		code: TokenSecret::new(code),
		redirect_uri: session.redirect_uri,
		verifier: TokenSecret::new(session.pkce.verifier),
	})
}

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PkceCodeChallengeMethod {
	S256,
}
impl PkceCodeChallengeMethod {
	fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

#[derive(Clone)]
struct PkcePair {
	verifier: String,
	challenge: String,
	method: PkceCodeChallengeMethod,
}
impl PkcePair {
	fn generate() -> Self {
		let verifier = random_string(PKCE_VERIFIER_LEN);
		let challenge = compute_pkce_challenge(&verifier);

		Self { verifier, challenge, method: PkceCodeChallengeMethod::S256 }
	}
}

/// One authorize round trip: the URL shown to the user and the values its answer must match.
struct AuthorizationSession {
	state: String,
	redirect_uri: Url,
	authorize_url: Url,
	pkce: PkcePair,
}
impl AuthorizationSession {
	fn new(
		authorization_endpoint: &Url,
		client_id: &ClientId,
		resource: &ResourceId,
		interactive: &InteractiveRequest,
		correlation_id: Uuid,
	) -> Self {
		let state = random_string(STATE_LEN);
		let pkce = PkcePair::generate();
		let mut authorize_url = authorization_endpoint.clone();
		let mut pairs = authorize_url.query_pairs_mut();

		pairs.append_pair("response_type", "code");
		pairs.append_pair("client_id", client_id);
		pairs.append_pair("redirect_uri", interactive.redirect_uri.as_str());
		pairs.append_pair("resource", resource);
		pairs.append_pair("state", &state);
		pairs.append_pair("code_challenge", &pkce.challenge);
		pairs.append_pair("code_challenge_method", pkce.method.as_str());
		pairs.append_pair("client-request-id", &correlation_id.to_string());

		if let Some(hint) = interactive.login_hint() {
			pairs.append_pair("login_hint", hint);
		}
		if interactive.prompt() == PromptBehavior::Always {
			pairs.append_pair("prompt", "login");
		}

		drop(pairs);

		Self { state, redirect_uri: interactive.redirect_uri.clone(), authorize_url, pkce }
	}

	/// Checks the redirect parameters and returns the authorization code.
	fn validate(&self, response: AuthorizationResponse) -> Result<String> {
		if let Some(code) = response.error {
			let mut err = ServiceError::new(code);

			err.description = response.error_description;

			return Err(err.into());
		}
		if response.state.as_deref() != Some(self.state.as_str()) {
			return Err(ErrorKind::StateMismatch.into());
		}

		response
			.code
			.filter(|code| !code.trim().is_empty())
			.ok_or_else(|| ErrorKind::AuthorizationCodeMissing.into())
	}
}

fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

fn compute_pkce_challenge(verifier: &str) -> String {
	let mut hasher = Sha256::new();

	hasher.update(verifier.as_bytes());

	URL_SAFE_NO_PAD.encode(hasher.finalize())
}
