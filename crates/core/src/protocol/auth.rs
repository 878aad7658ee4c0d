//! Digest authentication (RFC 2617 §3.2.2, without `qop`).
//!
//! ```text
//! HA1      = MD5(username ":" realm ":" password)
//! HA2      = MD5(method ":" uri)
//! response = MD5(HA1 ":" nonce ":" HA2)
//! ```
//!
//! Each stage is rendered as lowercase hex before it feeds the next one.

use crate::protocol::RtspResponse;

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

/// Compute the digest `response` value for one request.
pub fn challenge_response(
    username: &str,
    password: &str,
    realm: &str,
    nonce: &str,
    method: &str,
    uri: &str,
) -> String {
    let ha1 = md5_hex(&format!("{username}:{realm}:{password}"));
    let ha2 = md5_hex(&format!("{method}:{uri}"));
    md5_hex(&format!("{ha1}:{nonce}:{ha2}"))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Per-session digest state: credentials plus the last challenge seen.
///
/// Holds at most one realm/nonce pair; a newer challenge overwrites it.
#[derive(Debug, Clone, Default)]
pub struct DigestAuth {
    credentials: Option<Credentials>,
    realm: String,
    nonce: String,
}

impl DigestAuth {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            credentials,
            ..Self::default()
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Update the cache from a `WWW-Authenticate` value.
    ///
    /// Fields are comma-separated `key="value"` pairs. `realm` sets the
    /// realm; every other field is taken as the nonce, so the last
    /// non-realm field wins. Returns `true` when a nonce was found.
    pub fn apply_challenge(&mut self, header: &str) -> bool {
        let fields = header.trim();
        let fields = fields.strip_prefix("Digest").unwrap_or(fields);

        let mut found = false;
        for field in fields.split(',') {
            let Some((key, value)) = field.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_string();
            if key.trim().eq_ignore_ascii_case("realm") {
                self.realm = value;
            } else {
                self.nonce = value;
                found = true;
            }
        }
        if found {
            tracing::debug!(realm = %self.realm, nonce = %self.nonce, "digest challenge cached");
        }
        found
    }

    /// Cache the challenge carried by a 401 response.
    ///
    /// Only `WWW-Authenticate` values using the `Digest` scheme are used;
    /// `Basic` offers are skipped.
    pub fn observe(&mut self, response: &RtspResponse) -> bool {
        let mut found = false;
        for value in response.headers.get_all("WWW-Authenticate") {
            if value.trim_start().starts_with("Digest") {
                found |= self.apply_challenge(value);
            }
        }
        found
    }

    /// `Authorization` header value for a request, or `None` until a
    /// challenge has been observed.
    pub fn authorization(&self, method: &str, uri: &str) -> Option<String> {
        if self.nonce.is_empty() {
            return None;
        }
        let (username, password) = self
            .credentials
            .as_ref()
            .map(|c| (c.username.as_str(), c.password.as_str()))
            .unwrap_or(("", ""));
        let response = challenge_response(username, password, &self.realm, &self.nonce, method, uri);
        Some(format!(
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            username, self.realm, self.nonce, uri, response
        ))
    }
}
