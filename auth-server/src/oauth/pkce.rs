//! Proof Key for Code Exchange, `plain` method only

use super::GrantError;
use subtle::ConstantTimeEq;

/// Supported code challenge methods. S256 is not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    Plain,
}

impl CodeChallengeMethod {
    /// Parse the `code_challenge_method` parameter; absent means `plain`
    pub fn parse(method: Option<&str>) -> Result<Self, GrantError> {
        match method {
            None | Some("plain") => Ok(CodeChallengeMethod::Plain),
            Some(other) => Err(GrantError::InvalidRequest(format!(
                "Unsupported code_challenge_method '{}', only 'plain' is supported",
                other
            ))),
        }
    }
}

/// Check a presented verifier against the stored challenge.
///
/// A code issued without a challenge accepts any (or no) verifier.
pub fn verify(challenge: Option<&str>, verifier: Option<&str>) -> Result<(), GrantError> {
    let Some(challenge) = challenge else {
        return Ok(());
    };
    let verifier = verifier
        .ok_or_else(|| GrantError::invalid_grant("code_verifier is required for this code"))?;
    if bool::from(challenge.as_bytes().ct_eq(verifier.as_bytes())) {
        Ok(())
    } else {
        Err(GrantError::invalid_grant("PKCE verification failed"))
    }
}
