use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const ACCOUNTS_BASE_URL: &str = "https://accounts-api.airthings.com";

/// Safety margin subtracted from a token's expiry when deciding whether it
/// is still usable, so a request never goes out with a token that lapses
/// mid-flight. Unit is seconds.
const DEFAULT_EXPIRY_MARGIN_SECS: i64 = 15;

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
}

/// Wire shape of the token endpoint response. `expires_in` is relative,
/// in seconds; extra fields the endpoint may return are ignored.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Client id/secret pair for the client-credentials grant. Supplied once at
/// construction and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Value for the `Authorization` header of the token request:
    /// `Basic base64(id:secret)`.
    pub fn basic_auth(&self) -> String {
        let encoded = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));
        format!("Basic {}", encoded)
    }
}

/// A bearer token with its absolute expiry instant. Replaced wholesale on
/// each refresh; there is no token history.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// True iff `expires_at - margin` is still in the future of `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - margin > now
    }
}

/// Caches at most one access token and refreshes it on demand.
///
/// Invariants:
/// - `token` is `None` until the first successful `refresh()`.
/// - A failed refresh never modifies the cached token.
/// - After a successful refresh, the cached token is the most recently
///   fetched one.
pub struct TokenManager {
    client: reqwest::Client,
    accounts_base_url: String,
    credentials: Credentials,
    token: Option<AccessToken>,
    expiry_margin: Duration,
}

impl TokenManager {
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self::with_base_url(client, credentials, ACCOUNTS_BASE_URL.to_string())
    }

    pub fn with_base_url(
        client: reqwest::Client,
        credentials: Credentials,
        accounts_base_url: String,
    ) -> Self {
        TokenManager {
            client,
            accounts_base_url,
            credentials,
            token: None,
            expiry_margin: Duration::seconds(DEFAULT_EXPIRY_MARGIN_SECS),
        }
    }

    /// Overrides the default 15-second expiry margin.
    pub fn with_expiry_margin(mut self, seconds: i64) -> Self {
        self.expiry_margin = Duration::seconds(seconds);
        self
    }

    /// Returns the cached token without checking validity. `None` until the
    /// first successful refresh.
    pub fn token(&self) -> Option<&AccessToken> {
        self.token.as_ref()
    }

    fn has_valid_token(&self) -> bool {
        match &self.token {
            Some(token) => token.is_valid_at(Utc::now(), self.expiry_margin),
            None => false,
        }
    }

    /// Refreshes the cached token unless it is still valid per the expiry
    /// margin. No-op when the token is valid.
    pub async fn ensure_token(&mut self) -> Result<()> {
        if self.has_valid_token() {
            return Ok(());
        }
        self.refresh().await
    }

    /// Performs the client-credentials exchange and caches the result.
    /// Every failure mode (transport, non-2xx, unparseable body) surfaces
    /// as `Error::Auth` and leaves the previously cached token in place.
    pub async fn refresh(&mut self) -> Result<()> {
        let url = format!("{}/v1/token", self.accounts_base_url);
        debug!("Requesting access token from {}", url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.credentials.basic_auth())
            .json(&TokenRequest {
                grant_type: "client_credentials",
            })
            .send()
            .await
            .map_err(|e| {
                error!("Token request failed: {}", e);
                Error::Auth(format!("token request failed: {}", e))
            })?;

        // Read the body before the status check so the endpoint's error
        // detail ends up in the message instead of being discarded.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Auth(format!("failed to read token response: {}", e)))?;

        if !status.is_success() {
            error!("Token request rejected with status {}: {}", status, body);
            return Err(Error::Auth(format!(
                "token request failed ({}): {}",
                status, body
            )));
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            error!("Failed to parse token response: {}", e);
            Error::Auth(format!("failed to parse token response: {}", e))
        })?;

        debug!(
            "Access token acquired, expires in {}s",
            token_response.expires_in
        );
        // An expires_in large enough to overflow the expiry arithmetic is a
        // broken response, not a usable token.
        let expires_at = Duration::try_seconds(token_response.expires_in)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                Error::Auth(format!(
                    "token response has unusable expires_in: {}",
                    token_response.expires_in
                ))
            })?;
        self.token = Some(AccessToken {
            token: token_response.access_token,
            token_type: token_response.token_type,
            expires_at,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_fetched_at(fetched_at: DateTime<Utc>, expires_in: i64) -> AccessToken {
        AccessToken {
            token: "abc".to_string(),
            token_type: "Bearer".to_string(),
            expires_at: fetched_at + Duration::seconds(expires_in),
        }
    }

    fn manager_with_token(token: Option<AccessToken>) -> TokenManager {
        TokenManager {
            client: reqwest::Client::new(),
            accounts_base_url: ACCOUNTS_BASE_URL.to_string(),
            credentials: Credentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
            },
            token,
            expiry_margin: Duration::seconds(DEFAULT_EXPIRY_MARGIN_SECS),
        }
    }

    #[test]
    fn test_basic_auth_header_encoding() {
        let credentials = Credentials {
            client_id: "my-client".to_string(),
            client_secret: "my-secret".to_string(),
        };

        // base64("my-client:my-secret")
        assert_eq!(
            credentials.basic_auth(),
            "Basic bXktY2xpZW50Om15LXNlY3JldA=="
        );
    }

    #[test]
    fn test_token_request_body() {
        let request = TokenRequest {
            grant_type: "client_credentials",
        };

        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(json, r#"{"grant_type":"client_credentials"}"#);
    }

    #[test]
    fn test_token_response_parsing() {
        let json = r#"{"access_token":"abc","token_type":"Bearer","expires_in":3600}"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "abc");
        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
    }

    #[test]
    fn test_token_response_ignores_unknown_fields() {
        let json = r#"{"access_token":"abc","token_type":"Bearer","expires_in":3600,"scope":"read"}"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "abc");
    }

    #[test]
    fn test_token_valid_until_expiry_without_margin() {
        let fetched_at = Utc::now();
        let token = token_fetched_at(fetched_at, 3600);

        // With no margin the token is usable right up to, but not at, T+3600.
        assert!(token.is_valid_at(fetched_at + Duration::seconds(3599), Duration::zero()));
        assert!(!token.is_valid_at(fetched_at + Duration::seconds(3600), Duration::zero()));
        assert!(!token.is_valid_at(fetched_at + Duration::seconds(3601), Duration::zero()));
    }

    #[test]
    fn test_token_margin_moves_the_boundary() {
        let fetched_at = Utc::now();
        let token = token_fetched_at(fetched_at, 3600);
        let margin = Duration::seconds(15);

        assert!(token.is_valid_at(fetched_at + Duration::seconds(3584), margin));
        assert!(!token.is_valid_at(fetched_at + Duration::seconds(3585), margin));
    }

    #[test]
    fn test_manager_starts_without_token() {
        let manager = manager_with_token(None);

        assert!(manager.token().is_none());
        assert!(!manager.has_valid_token());
    }

    #[test]
    fn test_manager_with_fresh_token_is_valid() {
        let manager = manager_with_token(Some(token_fetched_at(Utc::now(), 3600)));

        assert!(manager.has_valid_token());
    }

    #[test]
    fn test_manager_with_expired_token_is_invalid() {
        let fetched_at = Utc::now() - Duration::seconds(7200);
        let manager = manager_with_token(Some(token_fetched_at(fetched_at, 3600)));

        assert!(!manager.has_valid_token());
        // The stale token stays cached until a refresh replaces it.
        assert!(manager.token().is_some());
    }

    #[test]
    fn test_manager_token_inside_margin_is_invalid() {
        // 3600s lifetime with the default 15s margin leaves 3585s of use.
        let fetched_at = Utc::now() - Duration::seconds(3590);
        let manager = manager_with_token(Some(token_fetched_at(fetched_at, 3600)));

        assert!(!manager.has_valid_token());
    }

    #[test]
    fn test_custom_expiry_margin() {
        let fetched_at = Utc::now() - Duration::seconds(3590);
        let manager = manager_with_token(Some(token_fetched_at(fetched_at, 3600)))
            .with_expiry_margin(0);

        assert!(manager.has_valid_token());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_token() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let expired = token_fetched_at(Utc::now() - Duration::seconds(7200), 3600);
        let mut manager = manager_with_token(Some(expired));
        manager.accounts_base_url = server.uri();

        let result = manager.refresh().await;
        assert!(matches!(result, Err(Error::Auth(_))));
        // The stale token survives the failed exchange unchanged.
        assert_eq!(manager.token().unwrap().token, "abc");
    }

    #[tokio::test]
    async fn test_refresh_rejects_overflowing_expires_in() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "abc",
                "token_type": "Bearer",
                "expires_in": i64::MAX
            })))
            .mount(&server)
            .await;

        let mut manager = manager_with_token(None);
        manager.accounts_base_url = server.uri();

        let result = manager.refresh().await;
        assert!(matches!(result, Err(Error::Auth(_))));
        assert!(manager.token().is_none());
    }
}
