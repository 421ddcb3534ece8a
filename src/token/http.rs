//! TokenRequest calls over HTTPS to the Kubernetes API server.

use reqwest::{Certificate, Client, Identity, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

use crate::ambient::ConnectionFacts;
use crate::config::TransportConfig;
use crate::constants::{TOKEN_REQUEST_API_VERSION, TOKEN_REQUEST_KIND};
use crate::prelude::debug;
use crate::token::errors::IssuanceError;
use crate::token::{TokenRequestCaller, TokenRequestSpec, TokenStatus};

/// Credentials sent in the `Authorization` header.
///
/// A TLS client certificate is configured separately with
/// [`ApiServerClientBuilder::client_identity`] and may be combined with any of these.
#[derive(Clone, Default)]
#[non_exhaustive]
pub enum ClientAuth {
    /// No credentials.
    #[default]
    None,
    /// A bearer token.
    Bearer(Zeroizing<String>),
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: Zeroizing<String>,
    },
}

impl std::fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Authenticated client for the TokenRequest subresource of service accounts.
///
/// Every [`create_token`](TokenRequestCaller::create_token) call is a single `POST`; nothing is
/// retried.
#[derive(Clone)]
pub struct ApiServerClient {
    base: Url,
    http: Client,
    auth: ClientAuth,
    client_identity: bool,
}

impl std::fmt::Debug for ApiServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServerClient")
            .field("base", &self.base.as_str())
            .field("auth", &self.auth)
            .field("client_identity", &self.client_identity)
            .finish()
    }
}

/// Builder for [`ApiServerClient`].
pub struct ApiServerClientBuilder {
    base: Url,
    trust_anchor: Vec<u8>,
    auth: ClientAuth,
    identity_pem: Option<Zeroizing<Vec<u8>>>,
    insecure_skip_tls_verify: bool,
    transport: TransportConfig,
}

impl std::fmt::Debug for ApiServerClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServerClientBuilder")
            .field("base", &self.base.as_str())
            .field("auth", &self.auth)
            .field("client_identity", &self.identity_pem.is_some())
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .field("transport", &self.transport)
            .finish()
    }
}

impl ApiServerClient {
    /// Starts building a client for the endpoint and trust anchor of `facts`.
    pub fn builder(facts: &ConnectionFacts) -> ApiServerClientBuilder {
        ApiServerClientBuilder {
            base: facts.endpoint_url().clone(),
            trust_anchor: facts.trust_anchor().to_vec(),
            auth: ClientAuth::None,
            identity_pem: None,
            insecure_skip_tls_verify: false,
            transport: TransportConfig::default(),
        }
    }

    /// Returns `true` if the client presents a TLS client certificate.
    pub fn has_client_identity(&self) -> bool {
        self.client_identity
    }

    /// Returns the API server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Returns the URL of the TokenRequest subresource for a service account.
    pub fn token_url(&self, namespace: &str, service_account: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "api",
                "v1",
                "namespaces",
                namespace,
                "serviceaccounts",
                service_account,
                "token",
            ]);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            ClientAuth::Bearer(token) => request.bearer_auth(token.as_str()),
            ClientAuth::Basic { username, password } => {
                request.basic_auth(username, Some(password.as_str()))
            }
            ClientAuth::None => request,
        }
    }
}

impl ApiServerClientBuilder {
    /// Sets the credentials presented to the API server.
    pub fn auth(mut self, auth: ClientAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Presents a TLS client certificate: the PEM certificate chain followed by the PEM private
    /// key.
    pub fn client_identity(mut self, identity_pem: Zeroizing<Vec<u8>>) -> Self {
        self.identity_pem = Some(identity_pem);
        self
    }

    /// Disables server certificate verification.
    pub fn insecure_skip_tls_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_tls_verify = skip;
        self
    }

    /// Sets the connect and request timeouts.
    pub fn transport_config(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Builds the client.
    ///
    /// When a trust anchor is set, only its certificates are trusted.
    ///
    /// # Errors
    ///
    /// Returns a [`reqwest::Error`] if the trust anchor or client identity cannot be loaded.
    pub fn build(self) -> Result<ApiServerClient, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(self.transport.connect_timeout)
            .timeout(self.transport.request_timeout)
            .use_rustls_tls();

        if !self.trust_anchor.is_empty() {
            builder = builder.tls_built_in_root_certs(false);
            for certificate in Certificate::from_pem_bundle(&self.trust_anchor)? {
                builder = builder.add_root_certificate(certificate);
            }
        }
        if self.insecure_skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(identity_pem) = &self.identity_pem {
            builder = builder.identity(Identity::from_pem(identity_pem)?);
        }

        Ok(ApiServerClient {
            base: self.base,
            http: builder.build()?,
            auth: self.auth,
            client_identity: self.identity_pem.is_some(),
        })
    }
}

impl TokenRequestCaller for ApiServerClient {
    async fn create_token(&self, request: &TokenRequestSpec) -> Result<TokenStatus, IssuanceError> {
        let url = self.token_url(request.identity_namespace(), request.identity_name());
        let body = TokenRequestBody::from(request);

        debug!("POST {url}");
        let response = self
            .authorize(self.http.post(url))
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(rejection(response).await);
        }

        let token_request: TokenRequestResponse = response.json().await.map_err(classify)?;
        let token_status = token_request.status.unwrap_or_default();
        Ok(TokenStatus {
            token: token_status.token,
            expiration_timestamp: token_status.expiration_timestamp,
        })
    }
}

fn classify(error: reqwest::Error) -> IssuanceError {
    if error.is_timeout() {
        IssuanceError::Timeout(Box::new(error))
    } else if error.is_decode() {
        IssuanceError::MalformedResponse(Box::new(error))
    } else {
        IssuanceError::Transport(Box::new(error))
    }
}

async fn rejection(response: Response) -> IssuanceError {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return classify(e),
    };

    match serde_json::from_str::<ApiStatus>(&body) {
        Ok(api_status) if api_status.message.is_some() || api_status.reason.is_some() => {
            IssuanceError::Rejected {
                status: status.as_u16(),
                message: api_status
                    .message
                    .unwrap_or_else(|| status.to_string()),
                reason: api_status.reason,
            }
        }
        _ => IssuanceError::Rejected {
            status: status.as_u16(),
            reason: None,
            message: if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_owned()
            },
        },
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequestBody<'a> {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta<'a>,
    spec: TokenRequestSpecBody<'a>,
}

#[derive(Serialize)]
struct ObjectMeta<'a> {
    name: &'a str,
    namespace: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequestSpecBody<'a> {
    audiences: &'a [String],
    expiration_seconds: i64,
}

impl<'a> From<&'a TokenRequestSpec> for TokenRequestBody<'a> {
    fn from(spec: &'a TokenRequestSpec) -> Self {
        Self {
            api_version: TOKEN_REQUEST_API_VERSION,
            kind: TOKEN_REQUEST_KIND,
            metadata: ObjectMeta {
                name: spec.identity_name(),
                namespace: spec.identity_namespace(),
            },
            spec: TokenRequestSpecBody {
                audiences: spec.audiences(),
                expiration_seconds: spec.ttl_seconds(),
            },
        }
    }
}

#[derive(Deserialize)]
struct TokenRequestResponse {
    #[serde(default)]
    status: Option<TokenRequestStatus>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequestStatus {
    #[serde(default)]
    token: String,
    #[serde(default)]
    expiration_timestamp: Option<String>,
}

/// The `Status` object the API server returns with errors.
#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}
