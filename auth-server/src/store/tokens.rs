use super::{Record, RecordStore, StoreBackend, StoreError};
use crate::models::TokenRecord;
use std::time::Duration;

impl RecordStore<TokenRecord> {
    fn tombstone_key(code: &str) -> String {
        format!("{}:redeemed:{}", TokenRecord::KIND, code)
    }

    pub async fn get_by_access(&self, access_token: &str) -> Result<TokenRecord, StoreError> {
        self.get_where("access", access_token).await
    }

    pub async fn get_by_refresh(&self, refresh_token: &str) -> Result<TokenRecord, StoreError> {
        self.get_where("refresh", refresh_token).await
    }

    /// Claim an authorization code exactly once.
    ///
    /// The code record is removed as part of the claim. A code that was already
    /// claimed within `tombstone_ttl` yields `StoreError::Conflict`; a code that
    /// was never issued (or whose memory has lapsed) yields `StoreError::NotFound`.
    pub async fn redeem_code(
        &self,
        code: &str,
        tombstone_ttl: Duration,
    ) -> Result<TokenRecord, StoreError> {
        match self.take_where("code", code).await {
            Ok(record) => {
                self.backend
                    .set(&Self::tombstone_key(code), &record.id, Some(tombstone_ttl))
                    .await?;
                Ok(record)
            }
            Err(StoreError::NotFound) => {
                let redeemed: Option<String> =
                    self.backend.get(&Self::tombstone_key(code)).await?;
                match redeemed {
                    Some(_) => Err(StoreError::Conflict),
                    None => Err(StoreError::NotFound),
                }
            }
            Err(err) => Err(err),
        }
    }
}
