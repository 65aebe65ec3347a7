//! Authority parsing, endpoint derivation, and validated-authority caching.

// self
use crate::{
	_prelude::*,
	context::RequestContext,
	error::{AcquisitionError, ConfigError, ErrorKind},
	flows::{EngineOptions, common::FlowGuards},
	http::{self, EndpointKind, HttpExecutor, HttpTransport, TransportErrorMapper},
	oauth,
};

/// Error code returned by instance discovery for unknown authority hosts.
const INVALID_INSTANCE: &str = "invalid_instance";

/// Kind of identity provider behind an authority URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorityType {
	/// Managed cloud directory; the first path segment is the tenant.
	Aad,
	/// On-premises federation service (`/adfs`).
	Adfs,
	/// Business-to-consumer directory (`/tfp/{tenant}/{policy}`).
	B2c,
}

/// Canonical authority URL.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Authority {
	url: Url,
	kind: AuthorityType,
	tenant: String,
}
impl Authority {
	/// Parses and canonicalizes an authority URL.
	///
	/// The canonical form is lowercase HTTPS with exactly the identifying path segments and a
	/// trailing slash, so `https://Login.Example.com/Contoso.com` and
	/// `https://login.example.com/contoso.com/` name the same authority.
	pub fn parse(raw: &str) -> Result<Self> {
		let invalid = |reason| ConfigError::InvalidAuthority { authority: raw.to_owned(), reason };
		let url =
			Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidEndpoint { source })?;

		if url.scheme() != "https" {
			return Err(invalid("authority must use HTTPS").into());
		}
		if url.query().is_some() || url.fragment().is_some() {
			return Err(invalid("authority must not carry a query or fragment").into());
		}

		let host = url.host_str().ok_or_else(|| invalid("authority has no host"))?;
		let segments = url
			.path_segments()
			.map(|segments| {
				segments.filter(|segment| !segment.is_empty()).map(str::to_lowercase).collect()
			})
			.unwrap_or_else(Vec::<String>::new);
		let (kind, tenant, kept) = match segments.first().map(String::as_str) {
			None => return Err(invalid("authority must name a tenant").into()),
			Some("adfs") => (AuthorityType::Adfs, "adfs".to_owned(), 1),
			Some("tfp") => {
				if segments.len() < 3 {
					return Err(invalid("B2C authority must name a tenant and a policy").into());
				}

				(AuthorityType::B2c, segments[1].clone(), 3)
			},
			Some(tenant) => (AuthorityType::Aad, tenant.to_owned(), 1),
		};
		let port = url.port().map(|port| format!(":{port}")).unwrap_or_default();
		let canonical =
			format!("https://{}{port}/{}/", host.to_lowercase(), segments[..kept].join("/"));
		let url =
			Url::parse(&canonical).map_err(|source| ConfigError::InvalidEndpoint { source })?;

		Ok(Self { url, kind, tenant })
	}

	/// Canonical URL string, ending with `/`.
	pub fn as_str(&self) -> &str {
		self.url.as_str()
	}

	/// Canonical URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// Authority type.
	pub fn kind(&self) -> AuthorityType {
		self.kind
	}

	/// Tenant segment (`adfs` for ADFS authorities).
	pub fn tenant(&self) -> &str {
		&self.tenant
	}

	/// Host including the port, when one was given.
	pub fn host(&self) -> String {
		match (self.url.host_str(), self.url.port()) {
			(Some(host), Some(port)) => format!("{host}:{port}"),
			(Some(host), None) => host.to_owned(),
			_ => String::new(),
		}
	}

	/// Derives the endpoint set.
	pub fn endpoints(&self) -> Result<AuthorityEndpoints> {
		let join = |path: &str| {
			self.url
				.join(path)
				.map_err(|source| Error::from(ConfigError::InvalidEndpoint { source }))
		};
		let user_realm = Url::parse(&format!("https://{}/common/userrealm/", self.host()))
			.map_err(|source| ConfigError::InvalidEndpoint { source })?;

		Ok(AuthorityEndpoints {
			token: join("oauth2/token")?,
			authorization: join("oauth2/authorize")?,
			device_code: join("oauth2/devicecode")?,
			user_realm,
		})
	}
}
impl Debug for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Authority({}, {:?})", self.url, self.kind)
	}
}
impl Display for Authority {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Authority {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

/// Endpoints derived from an authority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorityEndpoints {
	/// OAuth 2.0 token endpoint.
	pub token: Url,
	/// OAuth 2.0 authorization endpoint.
	pub authorization: Url,
	/// Device authorization endpoint.
	pub device_code: Url,
	/// User-realm discovery endpoint; the username is appended as a path segment.
	pub user_realm: Url,
}

/// Authority together with its endpoints and validation status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedAuthority {
	/// Canonical authority.
	pub authority: Authority,
	/// Derived endpoints.
	pub endpoints: AuthorityEndpoints,
	/// Whether instance discovery (or the trusted host list) vouched for the host.
	pub validated: bool,
}

#[derive(Deserialize)]
struct InstanceDiscoveryResponse {
	#[serde(default)]
	tenant_discovery_endpoint: Option<String>,
}

/// Process-wide cache of resolved authorities.
///
/// Entries are keyed by canonical authority URL. A validated entry is never replaced, and
/// concurrent resolutions of the same authority share one discovery round trip.
#[derive(Debug, Default)]
pub struct AuthorityResolver {
	entries: RwLock<HashMap<String, Arc<ResolvedAuthority>>>,
	guards: FlowGuards<String>,
}
impl AuthorityResolver {
	/// Returns the cached resolution for `authority`, if any.
	pub fn cached(&self, authority: &Authority) -> Option<Arc<ResolvedAuthority>> {
		self.entries.read().get(authority.as_str()).cloned()
	}

	/// Number of cached authorities.
	pub fn len(&self) -> usize {
		self.entries.read().len()
	}

	/// Returns `true` when nothing is cached.
	pub fn is_empty(&self) -> bool {
		self.entries.read().is_empty()
	}

	fn reusable(&self, authority: &Authority, validate: bool) -> Option<Arc<ResolvedAuthority>> {
		self.cached(authority).filter(|entry| entry.validated || !validate)
	}

	pub(crate) async fn resolve<C, M>(
		&self,
		http: &HttpExecutor<C, M>,
		options: &EngineOptions,
		authority: &Authority,
		ctx: &RequestContext,
	) -> Result<Arc<ResolvedAuthority>>
	where
		C: ?Sized + HttpTransport,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		let validate = options.validate_authority;

		if validate && authority.kind() != AuthorityType::Aad {
			return Err(ErrorKind::UnsupportedAuthorityValidation.into());
		}
		if let Some(entry) = self.reusable(authority, validate) {
			return Ok(entry);
		}

		let _lease = self.guards.lock(authority.as_str().to_owned()).await;

		if let Some(entry) = self.reusable(authority, validate) {
			return Ok(entry);
		}

		let endpoints = authority.endpoints()?;

		if validate {
			if options.is_trusted_host(&authority.host()) {
				ctx.logger.verbose("Authority host is trusted; skipping instance discovery.");
			} else {
				discover_instance(http, options, &endpoints, ctx).await?;
			}
		}

		let entry = Arc::new(ResolvedAuthority {
			authority: authority.clone(),
			endpoints,
			validated: validate,
		});

		self.entries.write().insert(authority.as_str().to_owned(), Arc::clone(&entry));

		Ok(entry)
	}
}

async fn discover_instance<C, M>(
	http: &HttpExecutor<C, M>,
	options: &EngineOptions,
	endpoints: &AuthorityEndpoints,
	ctx: &RequestContext,
) -> Result<()>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let mut url = Url::parse(&format!(
		"https://{}/common/discovery/instance",
		options.instance_discovery_host
	))
	.map_err(|source| ConfigError::InvalidEndpoint { source })?;

	url.query_pairs_mut()
		.append_pair("api-version", "1.1")
		.append_pair("authorization_endpoint", endpoints.authorization.as_str());
	ctx.logger.verbose_pii(format_args!("Running instance discovery at {url}."));

	let outcome = async {
		let request = http::get(&url, ctx)?;
		let response = http.execute(EndpointKind::InstanceDiscovery, request, ctx).await?;

		oauth::parse_json_response::<InstanceDiscoveryResponse>(&response)
	}
	.await;

	match outcome {
		Ok(InstanceDiscoveryResponse { tenant_discovery_endpoint: Some(_) }) => Ok(()),
		Ok(_) => Err(AcquisitionError::with_message(
			ErrorKind::AuthorityValidationFailed,
			"Instance discovery returned no tenant discovery endpoint.",
		)
		.into()),
		Err(Error::Service(err)) if err.code == INVALID_INSTANCE => {
			ctx.logger.warning("Authority is not in the list of valid hosts.");

			Err(Error::from(err).wrap_as(ErrorKind::AuthorityNotInValidList))
		},
		Err(err) => Err(err.wrap_as(ErrorKind::AuthorityValidationFailed)),
	}
}
