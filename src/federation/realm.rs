//! Home-realm (user realm) discovery.

// self
use crate::{
	_prelude::*,
	context::RequestContext,
	error::{ConfigError, ErrorKind},
	http::{self, EndpointKind, HttpExecutor, HttpTransport, TransportErrorMapper},
	oauth,
};

/// Account classification returned by realm discovery; compared case-insensitively.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccountType {
	/// Authentication is delegated to a federation service.
	Federated,
	/// Authentication is handled by the cloud directory.
	Managed,
	/// Any other value, kept verbatim.
	Unknown(String),
}
impl AccountType {
	/// Classifies a raw `account_type` value.
	pub fn parse(raw: &str) -> Self {
		if raw.eq_ignore_ascii_case("federated") {
			Self::Federated
		} else if raw.eq_ignore_ascii_case("managed") {
			Self::Managed
		} else {
			Self::Unknown(raw.to_owned())
		}
	}
}

/// Realm discovery answer for one username.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct UserRealmDiscoveryResponse {
	/// Response format version.
	#[serde(default)]
	pub ver: Option<String>,
	/// Raw account type.
	#[serde(default)]
	pub account_type: String,
	/// Domain the username belongs to.
	#[serde(default)]
	pub domain_name: Option<String>,
	/// Federation protocol, typically `WSTrust`.
	#[serde(default)]
	pub federation_protocol: Option<String>,
	/// Federation metadata (MEX) URL for federated accounts.
	#[serde(default)]
	pub federation_metadata_url: Option<String>,
	/// Active authentication URL advertised by the federation service.
	#[serde(default)]
	pub federation_active_auth_url: Option<String>,
	/// Cloud instance name.
	#[serde(default)]
	pub cloud_instance_name: Option<String>,
	/// Audience URN the WS-Trust token must be issued for.
	#[serde(default)]
	pub cloud_audience_urn: Option<String>,
}
impl UserRealmDiscoveryResponse {
	/// Classified account type.
	pub fn account_type(&self) -> AccountType {
		AccountType::parse(&self.account_type)
	}

	/// Federation metadata URL when present and non-blank.
	pub fn federation_metadata_url(&self) -> Option<&str> {
		self.federation_metadata_url.as_deref().filter(|value| !value.trim().is_empty())
	}
}

/// Queries the realm discovery endpoint for `username`.
pub(crate) async fn discover_user_realm<C, M>(
	http: &HttpExecutor<C, M>,
	user_realm_endpoint: &Url,
	username: &str,
	ctx: &RequestContext,
) -> Result<UserRealmDiscoveryResponse>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let outcome = async {
		let url = realm_url(user_realm_endpoint, username)?;
		let request = http::get(&url, ctx)?;
		let response = http.execute(EndpointKind::UserRealm, request, ctx).await?;

		oauth::parse_json_response::<UserRealmDiscoveryResponse>(&response)
	}
	.await;

	match outcome {
		Ok(realm) => {
			ctx.logger.info(format_args!(
				"User realm discovery returned account type `{}`.",
				realm.account_type
			));
			ctx.logger.info_pii(format_args!(
				"User realm discovery for `{username}` returned account type `{}`.",
				realm.account_type
			));

			Ok(realm)
		},
		Err(err) => {
			ctx.logger.warning("User realm discovery failed.");

			Err(err.wrap_as(ErrorKind::UserRealmDiscoveryFailed))
		},
	}
}

fn realm_url(user_realm_endpoint: &Url, username: &str) -> Result<Url> {
	let mut url = user_realm_endpoint.clone();

	url.path_segments_mut()
		.map_err(|_| ConfigError::InvalidAuthority {
			authority: user_realm_endpoint.to_string(),
			reason: "user realm endpoint cannot carry path segments",
		})?
		.pop_if_empty()
		.push(username);
	url.query_pairs_mut().append_pair("api-version", "1.0");

	Ok(url)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn account_type_is_case_insensitive() {
		assert_eq!(AccountType::parse("Federated"), AccountType::Federated);
		assert_eq!(AccountType::parse("MANAGED"), AccountType::Managed);
		assert_eq!(AccountType::parse("Unknown"), AccountType::Unknown("Unknown".into()));
		assert_eq!(AccountType::parse(""), AccountType::Unknown(String::new()));
	}

	#[test]
	fn realm_url_appends_username_segment() {
		let endpoint = Url::parse("https://login.microsoftonline.com/common/userrealm/")
			.expect("Static URL should parse.");
		let url = realm_url(&endpoint, "alice@contoso.com").expect("Realm URL should build.");

		assert_eq!(
			url.as_str(),
			"https://login.microsoftonline.com/common/userrealm/alice@contoso.com?api-version=1.0"
		);
	}

	#[test]
	fn response_fields_deserialize() {
		let realm: UserRealmDiscoveryResponse = serde_json::from_str(
			r#"{"ver":"1.0","account_type":"Federated","domain_name":"contoso.com",
			"federation_protocol":"WSTrust","federation_metadata_url":"https://fs.contoso.com/adfs/services/trust/mex",
			"cloud_audience_urn":"urn:federation:MicrosoftOnline"}"#,
		)
		.expect("Realm response should deserialize.");

		assert_eq!(realm.account_type(), AccountType::Federated);
		assert_eq!(
			realm.federation_metadata_url(),
			Some("https://fs.contoso.com/adfs/services/trust/mex")
		);
		assert_eq!(realm.cloud_audience_urn.as_deref(), Some("urn:federation:MicrosoftOnline"));
	}
}
