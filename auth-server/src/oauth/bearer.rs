//! Bearer token extraction and validation

use crate::models::TokenRecord;
use crate::store::{RecordStore, StoreError};
use chrono::Utc;
use http::{header::AUTHORIZATION, HeaderMap, Uri};
use log::{debug, warn};

/// What the validator made of a request's credentials
#[derive(Debug, Clone, PartialEq)]
pub enum BearerOutcome {
    /// No bearer token presented; the request proceeds anonymously
    Absent,
    /// A token was presented but is unknown or expired
    Invalid,
    Valid(TokenRecord),
}

#[derive(Clone)]
pub struct BearerValidator {
    tokens: RecordStore<TokenRecord>,
}

impl BearerValidator {
    pub fn new(tokens: RecordStore<TokenRecord>) -> Self {
        Self { tokens }
    }

    /// Validate whatever bearer token the request carries.
    ///
    /// Only persistence failures are errors; absent and invalid tokens are outcomes.
    pub async fn validate(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
    ) -> Result<BearerOutcome, StoreError> {
        match extract_token(headers, uri) {
            Some(token) => self.validate_token(&token).await,
            None => Ok(BearerOutcome::Absent),
        }
    }

    pub async fn validate_token(&self, token: &str) -> Result<BearerOutcome, StoreError> {
        let record = match self.tokens.get_by_access(token).await {
            Ok(record) => record,
            Err(err) if err.is_not_found() => {
                debug!("Presented bearer token is unknown");
                return Ok(BearerOutcome::Invalid);
            }
            Err(err) => return Err(err),
        };

        if record.is_expired(Utc::now()) {
            debug!("Token {} has expired, purging it", record.id);
            if let Err(err) = self.tokens.delete_by_id(&record.id).await {
                warn!("Failed to purge expired token {}: {}", record.id, err);
            }
            return Ok(BearerOutcome::Invalid);
        }

        Ok(BearerOutcome::Valid(record))
    }
}

/// Pull the token from the Authorization header, falling back to the
/// `access_token` query parameter when no Authorization header is sent.
pub fn extract_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION) {
        let value = value.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        return (!token.is_empty()).then(|| token.to_string());
    }

    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}
