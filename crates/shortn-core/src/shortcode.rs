use crate::error::CoreError;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Display;

/// Number of characters kept from the encoded digest.
pub const SHORT_CODE_LENGTH: usize = 7;

/// The storage key and public path segment of a shortened URL.
///
/// A short code is the first seven characters of the URL-safe base64
/// encoding of the SHA-256 digest of the destination URL. The same URL
/// therefore always maps to the same code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShortCode(String);

impl ShortCode {
    /// Derives the short code for a destination URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use shortn_core::ShortCode;
    ///
    /// let first = ShortCode::derive("https://example.com/x");
    /// let second = ShortCode::derive("https://example.com/x");
    /// assert_eq!(first, second);
    /// assert_eq!(first.as_str().len(), 7);
    /// ```
    pub fn derive(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        let mut encoded = URL_SAFE.encode(digest);
        encoded.truncate(SHORT_CODE_LENGTH);
        Self(encoded)
    }

    /// Parses a short code received from the outside (e.g. a request path).
    ///
    /// Valid codes are exactly seven characters of `[A-Za-z0-9_-]`.
    pub fn parse(code: impl Into<String>) -> Result<Self, CoreError> {
        let code = code.into();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Returns the public short link, the code prefixed with `/`.
    pub fn to_link(&self) -> String {
        format!("/{}", self.0)
    }

    /// Returns the short code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), CoreError> {
        if code.len() != SHORT_CODE_LENGTH {
            return Err(CoreError::InvalidShortCode(format!(
                "length must be {}, got {}",
                SHORT_CODE_LENGTH,
                code.len()
            )));
        }

        if !code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CoreError::InvalidShortCode(format!(
                "must contain only url-safe base64 characters: '{}'",
                code
            )));
        }

        Ok(())
    }
}

impl TryFrom<String> for ShortCode {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ShortCode> for String {
    fn from(code: ShortCode) -> Self {
        code.0
    }
}

impl Display for ShortCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
