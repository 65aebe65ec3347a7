//! Identity claims decoded from an OpenID Connect id token.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::_prelude::*;

/// User identity attached to a token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
	/// Stable object identifier (`oid`, else `sub`).
	pub unique_id: Option<String>,
	/// Human-readable identifier (`upn`, else `email`, else `unique_name`).
	pub displayable_id: Option<String>,
	/// Given name.
	pub given_name: Option<String>,
	/// Family name.
	pub family_name: Option<String>,
	/// Issuing identity provider (`idp`, else `iss`).
	pub identity_provider: Option<String>,
}

/// Decoded id token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdToken {
	/// User identity claims.
	pub user_info: UserInfo,
	/// Tenant identifier (`tid`).
	pub tenant_id: Option<String>,
}
impl IdToken {
	/// Decodes the payload segment of a compact JWT without verifying the signature.
	///
	/// Returns `None` when the value is not a decodable JWT.
	pub fn parse(raw: &str) -> Option<Self> {
		let payload = raw.split('.').nth(1)?;
		let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
		let claims = serde_json::from_slice::<IdTokenClaims>(&bytes).ok()?;

		Some(Self {
			user_info: UserInfo {
				unique_id: claims.oid.or(claims.sub),
				displayable_id: claims.upn.or(claims.email).or(claims.unique_name),
				given_name: claims.given_name,
				family_name: claims.family_name,
				identity_provider: claims.idp.or(claims.iss),
			},
			tenant_id: claims.tid,
		})
	}
}

#[derive(Deserialize)]
struct IdTokenClaims {
	oid: Option<String>,
	sub: Option<String>,
	upn: Option<String>,
	email: Option<String>,
	unique_name: Option<String>,
	given_name: Option<String>,
	family_name: Option<String>,
	idp: Option<String>,
	iss: Option<String>,
	tid: Option<String>,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn jwt(claims: serde_json::Value) -> String {
		format!("eyJhbGciOiJub25lIn0.{}.", URL_SAFE_NO_PAD.encode(claims.to_string()))
	}

	#[test]
	fn claims_prefer_oid_and_upn() {
		let token = IdToken::parse(&jwt(serde_json::json!({
			"oid": "obj-1",
			"sub": "sub-1",
			"upn": "alice@contoso.com",
			"email": "alice@mail.contoso.com",
			"given_name": "Alice",
			"iss": "https://sts.windows.net/tenant-1/",
			"tid": "tenant-1"
		})))
		.expect("Well-formed id token should decode.");

		assert_eq!(token.user_info.unique_id.as_deref(), Some("obj-1"));
		assert_eq!(token.user_info.displayable_id.as_deref(), Some("alice@contoso.com"));
		assert_eq!(token.user_info.given_name.as_deref(), Some("Alice"));
		assert_eq!(
			token.user_info.identity_provider.as_deref(),
			Some("https://sts.windows.net/tenant-1/")
		);
		assert_eq!(token.tenant_id.as_deref(), Some("tenant-1"));
	}

	#[test]
	fn claims_fall_back_to_sub_and_email() {
		let token = IdToken::parse(&jwt(serde_json::json!({
			"sub": "sub-1",
			"email": "alice@mail.contoso.com"
		})))
		.expect("Well-formed id token should decode.");

		assert_eq!(token.user_info.unique_id.as_deref(), Some("sub-1"));
		assert_eq!(token.user_info.displayable_id.as_deref(), Some("alice@mail.contoso.com"));
	}

	#[test]
	fn undecodable_tokens_yield_none() {
		assert!(IdToken::parse("not-a-jwt").is_none());
		assert!(IdToken::parse("a.%%%.c").is_none());
		assert!(IdToken::parse(&format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2]"))).is_none());
	}
}
