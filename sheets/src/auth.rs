// service account authentication: a signed jwt assertion exchanged for a bearer token.
use std::{fs, path::Path, sync::Mutex};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::debug;
use reqwest::{Client, StatusCode};

use crate::{
    errors::{Result, SheetsError},
    types::{Claims, ServiceAccountKey, TokenResponse, JWT_BEARER_GRANT, SPREADSHEETS_SCOPE},
};

const TOKEN_LIFETIME_SECS: i64 = 3600;
// refresh a little before google expires the token
const EXPIRY_MARGIN_SECS: i64 = 60;

struct CachedToken {
    access_token: String,
    expires_at: i64,
}

pub struct Authenticator {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: Client,
    scope: String,
    cached: Mutex<Option<CachedToken>>,
}

impl Authenticator {
    pub fn from_file(path: &Path, client: Client) -> Result<Self> {
        let display = path.display().to_string();
        if !path.exists() {
            return Err(SheetsError::invalid_credentials(
                &display,
                "credentials file not found",
            ));
        }
        let raw = fs::read_to_string(path)?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| SheetsError::invalid_credentials(&display, e))?;
        Self::new(key, client)
    }

    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self> {
        if key.client_email.is_empty() {
            return Err(SheetsError::invalid_argument("client_email"));
        }
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;

        Ok(Authenticator {
            key,
            encoding_key,
            client,
            scope: SPREADSHEETS_SCOPE.into(),
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn assertion(&self, now: i64) -> Result<String> {
        let mut header = Header::new(Algorithm::RS256);
        if !self.key.private_key_id.is_empty() {
            header.kid = Some(self.key.private_key_id.clone());
        }
        let claims = build_claims(&self.key, &self.scope, now);
        Ok(encode(&header, &claims, &self.encoding_key)?)
    }

    /// Returns a bearer token, reusing the cached one until it is about to expire.
    pub async fn token(&self) -> Result<String> {
        let now = chrono::Utc::now().timestamp();
        if let Ok(cached) = self.cached.lock() {
            if let Some(t) = cached.as_ref() {
                if t.expires_at - EXPIRY_MARGIN_SECS > now {
                    return Ok(t.access_token.clone());
                }
            }
        }

        debug!("requesting access token for {}", self.key.client_email);
        let assertion = self.assertion(now)?;
        let res = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await?;

        if res.status() != StatusCode::OK {
            return Err(SheetsError::ApiError {
                status: res.status().as_u16(),
                body: res.text().await?,
            });
        }
        let token = res.json::<TokenResponse>().await?;

        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(CachedToken {
                access_token: token.access_token.clone(),
                expires_at: now + token.expires_in,
            });
        }
        Ok(token.access_token)
    }
}

pub fn build_claims(key: &ServiceAccountKey, scope: &str, now: i64) -> Claims {
    Claims {
        iss: key.client_email.clone(),
        scope: scope.into(),
        aud: key.token_uri.clone(),
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    }
}
