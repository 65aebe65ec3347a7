//! WS-MetadataExchange document parsing.

// crates.io
use quick_xml::{
	Reader,
	events::{BytesStart, Event},
};
// self
use crate::{
	_prelude::*,
	auth::UserAuthType,
	context::RequestContext,
	error::{ConfigError, DocumentError, ErrorKind},
	http::{self, EndpointKind, HttpExecutor, HttpTransport, TransportErrorMapper},
	oauth,
};

const DOCUMENT: &str = "metadata exchange";
const SOAP_HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";
const WS_TRUST_13_ISSUE: &str = "http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue";
const WS_TRUST_2005_ISSUE: &str = "http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue";

/// WS-Trust protocol version of an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WsTrustVersion {
	/// WS-Trust 1.3 (`http://docs.oasis-open.org/ws-sx/ws-trust/200512`).
	WsTrust13,
	/// WS-Trust February 2005 (`http://schemas.xmlsoap.org/ws/2005/02/trust`).
	WsTrust2005,
}
impl WsTrustVersion {
	fn from_soap_action(action: &str) -> Option<Self> {
		if action.eq_ignore_ascii_case(WS_TRUST_13_ISSUE) {
			Some(Self::WsTrust13)
		} else if action.eq_ignore_ascii_case(WS_TRUST_2005_ISSUE) {
			Some(Self::WsTrust2005)
		} else {
			None
		}
	}
}

/// WS-Trust endpoint selected from a metadata document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsTrustAddress {
	/// Endpoint URI.
	pub uri: Url,
	/// Protocol version spoken by the endpoint.
	pub version: WsTrustVersion,
}

/// Endpoints advertised by a metadata document, grouped by auth type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MexDocument {
	username_password: Vec<WsTrustAddress>,
	integrated: Vec<WsTrustAddress>,
}
impl MexDocument {
	/// Parses a metadata document.
	pub fn parse(xml: &str) -> Result<Self, DocumentError> {
		let mut parser = MexParser::default();

		parser.run(xml)?;

		Ok(parser.finish())
	}

	/// Returns the preferred endpoint for `auth_type`: WS-Trust 1.3 first, then 2005.
	pub fn endpoint(&self, auth_type: UserAuthType) -> Option<&WsTrustAddress> {
		let candidates = match auth_type {
			UserAuthType::UsernamePassword => &self.username_password,
			UserAuthType::IntegratedAuth => &self.integrated,
		};

		candidates
			.iter()
			.find(|address| address.version == WsTrustVersion::WsTrust13)
			.or_else(|| candidates.first())
	}
}

/// Fetches the metadata document at `url` and selects the endpoint for `auth_type`.
pub(crate) async fn fetch_ws_trust_address<C, M>(
	http: &HttpExecutor<C, M>,
	url: &str,
	auth_type: UserAuthType,
	ctx: &RequestContext,
) -> Result<WsTrustAddress>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let url = Url::parse(url).map_err(|source| ConfigError::InvalidEndpoint { source })?;
	let request = http::get(&url, ctx)?;
	let response = http.execute(EndpointKind::MetadataExchange, request, ctx).await?;

	if !http::is_success(&response) {
		return Err(oauth::service_error_from_body(&response).into());
	}

	let document = MexDocument::parse(&http::body_text(&response))?;

	document.endpoint(auth_type).cloned().ok_or_else(|| {
		ctx.logger.warning("No WS-Trust endpoint matches the requested auth type.");

		ErrorKind::WsTrustEndpointNotFoundInMetadataDocument.into()
	})
}

#[derive(Default)]
struct BindingDraft {
	name: String,
	policy: Option<String>,
	soap_http: bool,
	version: Option<WsTrustVersion>,
	depth: usize,
}

#[derive(Default)]
struct PortDraft {
	binding: String,
	location: Option<String>,
	reference: Option<String>,
	depth: usize,
}

struct BindingInfo {
	policy: Option<String>,
	version: Option<WsTrustVersion>,
}

#[derive(Default)]
struct MexParser {
	root: Option<String>,
	stack: Vec<String>,
	policy: Option<(String, usize)>,
	policies: HashMap<String, UserAuthType>,
	binding: Option<BindingDraft>,
	bindings: HashMap<String, BindingInfo>,
	port: Option<PortDraft>,
	ports: Vec<PortDraft>,
}
impl MexParser {
	fn run(&mut self, xml: &str) -> Result<(), DocumentError> {
		let mut reader = Reader::from_str(xml);

		reader.config_mut().trim_text(true);

		loop {
			let event = reader
				.read_event()
				.map_err(|source| DocumentError::Malformed { document: DOCUMENT, source })?;

			match event {
				Event::Start(e) => {
					let name = local_name(&e);

					self.enter_root(&name);
					self.open(&name, &e);
					self.stack.push(name);
				},
				Event::Empty(e) => {
					let name = local_name(&e);

					self.enter_root(&name);
					self.open(&name, &e);
					self.close(&name);
				},
				Event::End(_) => {
					if let Some(name) = self.stack.pop() {
						self.close(&name);
					}
				},
				Event::Text(t) => {
					if self.in_endpoint_reference_address() {
						let text = t.unescape().map_err(|source| DocumentError::Malformed {
							document: DOCUMENT,
							source,
						})?;

						if let Some(port) = self.port.as_mut() {
							port.reference = Some(text.trim().to_owned());
						}
					}
				},
				Event::Eof => break,
				_ => {},
			}
		}

		if !self.stack.is_empty() {
			return Err(invalid("the document ends inside an open element"));
		}
		if self.root.as_deref() != Some("definitions") {
			return Err(invalid("the root element is not `definitions`"));
		}

		Ok(())
	}

	fn enter_root(&mut self, name: &str) {
		if self.root.is_none() {
			self.root = Some(name.to_owned());
		}
	}

	fn parent(&self) -> Option<&str> {
		self.stack.last().map(String::as_str)
	}

	fn in_endpoint_reference_address(&self) -> bool {
		let len = self.stack.len();

		self.port.is_some()
			&& len >= 2 && self.stack[len - 1] == "Address"
			&& self.stack[len - 2] == "EndpointReference"
	}

	fn open(&mut self, name: &str, e: &BytesStart) {
		let depth = self.stack.len();
		let parent = self.parent().map(str::to_owned);

		match (name, parent.as_deref()) {
			("Policy", _) if self.policy.is_none() => {
				if let Some(id) = attribute(e, "Id") {
					self.policy = Some((id, depth));
				}
			},
			("NegotiateAuthentication", _) => {
				if let Some((id, _)) = &self.policy {
					self.policies.insert(id.clone(), UserAuthType::IntegratedAuth);
				}
			},
			("UsernameToken", _) => {
				if let Some((id, _)) = &self.policy {
					self.policies.entry(id.clone()).or_insert(UserAuthType::UsernamePassword);
				}
			},
			("binding", Some("definitions")) =>
				if let Some(name) = attribute(e, "name") {
					self.binding = Some(BindingDraft { name, depth, ..Default::default() });
				},
			("PolicyReference", _) =>
				if let (Some(binding), Some(uri)) = (self.binding.as_mut(), attribute(e, "URI")) {
					binding.policy = Some(uri.trim_start_matches('#').to_owned());
				},
			("binding", Some("binding")) =>
				if let Some(binding) = self.binding.as_mut() {
					binding.soap_http = attribute(e, "transport").is_some_and(|transport| {
						transport.eq_ignore_ascii_case(SOAP_HTTP_TRANSPORT)
					});
				},
			("operation", Some("operation")) =>
				if let Some(binding) = self.binding.as_mut() {
					if let Some(version) = attribute(e, "soapAction")
						.as_deref()
						.and_then(WsTrustVersion::from_soap_action)
					{
						binding.version = Some(version);
					}
				},
			("port", Some("service")) =>
				if let Some(binding) = attribute(e, "binding") {
					let binding = match binding.split_once(':') {
						Some((_, local)) => local.to_owned(),
						None => binding,
					};

					self.port = Some(PortDraft { binding, depth, ..Default::default() });
				},
			("address", Some("port")) =>
				if let (Some(port), Some(location)) = (self.port.as_mut(), attribute(e, "location"))
				{
					port.location = Some(location);
				},
			_ => {},
		}
	}

	fn close(&mut self, name: &str) {
		let depth = self.stack.len();

		if name == "Policy" && self.policy.as_ref().is_some_and(|(_, at)| *at == depth) {
			self.policy = None;
		}
		if name == "binding" && self.binding.as_ref().is_some_and(|draft| draft.depth == depth) {
			if let Some(draft) = self.binding.take() {
				if draft.soap_http {
					self.bindings.insert(draft.name, BindingInfo {
						policy: draft.policy,
						version: draft.version,
					});
				}
			}
		}
		if name == "port" && self.port.as_ref().is_some_and(|draft| draft.depth == depth) {
			if let Some(draft) = self.port.take() {
				self.ports.push(draft);
			}
		}
	}

	fn finish(self) -> MexDocument {
		let mut document = MexDocument::default();

		for port in self.ports {
			let Some(binding) = self.bindings.get(&port.binding) else { continue };
			let Some(version) = binding.version else { continue };
			let Some(auth_type) =
				binding.policy.as_ref().and_then(|policy| self.policies.get(policy))
			else {
				continue;
			};
			let Some(uri) = port
				.reference
				.or(port.location)
				.and_then(|raw| Url::parse(&raw).ok())
				.filter(|uri| uri.scheme() == "https")
			else {
				continue;
			};
			let address = WsTrustAddress { uri, version };

			match auth_type {
				UserAuthType::UsernamePassword => document.username_password.push(address),
				UserAuthType::IntegratedAuth => document.integrated.push(address),
			}
		}

		document
	}
}

fn invalid(reason: &'static str) -> DocumentError {
	DocumentError::Invalid { document: DOCUMENT, reason }
}

fn local_name(e: &BytesStart) -> String {
	String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart, local: &str) -> Option<String> {
	e.attributes().flatten().find_map(|attr| {
		if attr.key.local_name().as_ref() == local.as_bytes() {
			attr.unescape_value().ok().map(|value| value.into_owned())
		} else {
			None
		}
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn mex_document(
		username_uri: &str,
		integrated_uri: Option<&str>,
		include_2005: bool,
	) -> String {
		let integrated_port = integrated_uri
			.map(|uri| {
				format!(
					r#"<wsdl:port name="WindowsTransport" binding="tns:WindowsTransport_IWSTrust13Async">
					<soap12:address location="{uri}"/>
				</wsdl:port>"#
				)
			})
			.unwrap_or_default();
		let port_2005 = if include_2005 {
			r#"<wsdl:port name="UserNameMixed2005" binding="tns:UserNameWSTrustBinding_IWSTrustFeb2005Async">
				<soap12:address location="https://fs.contoso.com/adfs/services/trust/2005/usernamemixed"/>
			</wsdl:port>"#
		} else {
			""
		};

		format!(
			r##"<?xml version="1.0" encoding="utf-8"?>
<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/" xmlns:wsp="http://schemas.xmlsoap.org/ws/2004/09/policy" xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd" xmlns:sp="http://docs.oasis-open.org/ws-sx/ws-securitypolicy/200702" xmlns:http="http://schemas.microsoft.com/ws/06/2004/policy/http" xmlns:soap12="http://schemas.xmlsoap.org/wsdl/soap12/" xmlns:wsa10="http://www.w3.org/2005/08/addressing" xmlns:tns="http://schemas.microsoft.com/ws/2008/06/identity/securitytokenservice">
	<wsp:Policy wsu:Id="UserNameWSTrustBinding_IWSTrust13Async_policy">
		<wsp:ExactlyOne><wsp:All>
			<sp:SignedEncryptedSupportingTokens><wsp:Policy>
				<sp:UsernameToken sp:IncludeToken="http://docs.oasis-open.org/ws-sx/ws-securitypolicy/200702/IncludeToken/AlwaysToRecipient">
					<wsp:Policy><sp:WssUsernameToken10/></wsp:Policy>
				</sp:UsernameToken>
			</wsp:Policy></sp:SignedEncryptedSupportingTokens>
		</wsp:All></wsp:ExactlyOne>
	</wsp:Policy>
	<wsp:Policy wsu:Id="WindowsTransport_IWSTrust13Async_policy">
		<wsp:ExactlyOne><wsp:All>
			<http:NegotiateAuthentication/>
		</wsp:All></wsp:ExactlyOne>
	</wsp:Policy>
	<wsdl:binding name="UserNameWSTrustBinding_IWSTrust13Async" type="tns:IWSTrust13Async">
		<wsp:PolicyReference URI="#UserNameWSTrustBinding_IWSTrust13Async_policy"/>
		<soap12:binding transport="http://schemas.xmlsoap.org/soap/http"/>
		<wsdl:operation name="Trust13IssueAsync">
			<soap12:operation soapAction="http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue" style="document"/>
		</wsdl:operation>
	</wsdl:binding>
	<wsdl:binding name="UserNameWSTrustBinding_IWSTrustFeb2005Async" type="tns:IWSTrustFeb2005Async">
		<wsp:PolicyReference URI="#UserNameWSTrustBinding_IWSTrust13Async_policy"/>
		<soap12:binding transport="http://schemas.xmlsoap.org/soap/http"/>
		<wsdl:operation name="TrustFeb2005IssueAsync">
			<soap12:operation soapAction="http://schemas.xmlsoap.org/ws/2005/02/trust/RST/Issue" style="document"/>
		</wsdl:operation>
	</wsdl:binding>
	<wsdl:binding name="WindowsTransport_IWSTrust13Async" type="tns:IWSTrust13Async">
		<wsp:PolicyReference URI="#WindowsTransport_IWSTrust13Async_policy"/>
		<soap12:binding transport="http://schemas.xmlsoap.org/soap/http"/>
		<wsdl:operation name="Trust13IssueAsync">
			<soap12:operation soapAction="http://docs.oasis-open.org/ws-sx/ws-trust/200512/RST/Issue" style="document"/>
		</wsdl:operation>
	</wsdl:binding>
	<wsdl:service name="SecurityTokenService">
		{port_2005}
		<wsdl:port name="UserNameMixed" binding="tns:UserNameWSTrustBinding_IWSTrust13Async">
			<soap12:address location="https://fs.contoso.com/adfs/services/trust/13/ignored"/>
			<wsa10:EndpointReference><wsa10:Address>{username_uri}</wsa10:Address></wsa10:EndpointReference>
		</wsdl:port>
		{integrated_port}
	</wsdl:service>
</wsdl:definitions>"##
		)
	}

	#[test]
	fn selects_ws_trust_13_username_endpoint() {
		let xml =
			mex_document("https://fs.contoso.com/adfs/services/trust/13/usernamemixed", None, true);
		let document = MexDocument::parse(&xml).expect("Metadata fixture should parse.");
		let address = document
			.endpoint(UserAuthType::UsernamePassword)
			.expect("Username endpoint should be found.");

		assert_eq!(address.version, WsTrustVersion::WsTrust13);
		assert_eq!(
			address.uri.as_str(),
			"https://fs.contoso.com/adfs/services/trust/13/usernamemixed"
		);
		assert!(document.endpoint(UserAuthType::IntegratedAuth).is_none());
	}

	#[test]
	fn falls_back_to_ws_trust_2005_and_requires_https() {
		let xml =
			mex_document("http://fs.contoso.com/adfs/services/trust/13/usernamemixed", None, true);
		let document = MexDocument::parse(&xml).expect("Metadata fixture should parse.");
		let address = document
			.endpoint(UserAuthType::UsernamePassword)
			.expect("2005 endpoint should be used when 1.3 is not HTTPS.");

		assert_eq!(address.version, WsTrustVersion::WsTrust2005);
	}

	#[test]
	fn integrated_endpoint_uses_negotiate_policy() {
		let xml = mex_document(
			"https://fs.contoso.com/adfs/services/trust/13/usernamemixed",
			Some("https://fs.contoso.com/adfs/services/trust/13/windowstransport"),
			false,
		);
		let document = MexDocument::parse(&xml).expect("Metadata fixture should parse.");
		let address = document
			.endpoint(UserAuthType::IntegratedAuth)
			.expect("Integrated endpoint should be found.");

		assert_eq!(
			address.uri.as_str(),
			"https://fs.contoso.com/adfs/services/trust/13/windowstransport"
		);
	}

	#[test]
	fn malformed_xml_is_reported() {
		let err = MexDocument::parse("<wsdl:definitions><wsdl:binding></wsdl:definitions>")
			.expect_err("Mismatched tags should fail.");

		assert!(matches!(err, DocumentError::Malformed { document: "metadata exchange", .. }));
	}

	#[test]
	fn non_metadata_bodies_are_rejected() {
		for body in [
			"<html><body>Sign in",
			r#"{"not":"xml"}"#,
			"",
			"<html><body/></html>",
			"<wsdl:definitions><wsdl:binding name='x'>",
		] {
			let err = MexDocument::parse(body).expect_err("Non-metadata bodies should fail.");

			assert!(matches!(
				err,
				DocumentError::Invalid { document: "metadata exchange", .. }
					| DocumentError::Malformed { document: "metadata exchange", .. }
			));
		}
	}

	#[test]
	fn empty_definitions_parse_without_endpoints() {
		let document = MexDocument::parse(
			r#"<wsdl:definitions xmlns:wsdl="http://schemas.xmlsoap.org/wsdl/"/>"#,
		)
		.expect("An empty metadata document should parse.");

		assert!(document.endpoint(UserAuthType::UsernamePassword).is_none());
	}
}
