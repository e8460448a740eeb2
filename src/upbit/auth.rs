//! JWT authentication for the Upbit API
//!
//! Every private request carries `Authorization: Bearer <jwt>`, an HS256 token
//! signed with the secret key. Requests with parameters also include the
//! hex SHA-512 of their query string so the server can bind the token to them.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256, Sha512};

use crate::common::errors::{Result, TraderError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize)]
struct JwtHeader {
    alg: &'static str,
    typ: &'static str,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    access_key: &'a str,
    nonce: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query_hash_alg: Option<&'static str>,
}

/// Hex SHA-512 of a url-encoded query string
pub fn query_hash(query: &str) -> String {
    hex::encode(Sha512::digest(query.as_bytes()))
}

/// Build a signed token with an explicit nonce
///
/// # Arguments
/// * `access_key` - API access key
/// * `secret_key` - API secret key (raw string, not base64)
/// * `nonce` - Unique value per request
/// * `query` - Url-encoded request parameters, if any
pub fn encode_token(
    access_key: &str,
    secret_key: &str,
    nonce: &str,
    query: Option<&str>,
) -> Result<String> {
    let header = JwtHeader {
        alg: "HS256",
        typ: "JWT",
    };
    let claims = JwtClaims {
        access_key,
        nonce,
        query_hash: query.map(query_hash),
        query_hash_alg: query.map(|_| "SHA512"),
    };

    let signing_input = format!(
        "{}.{}",
        BASE64_URL.encode(serde_json::to_vec(&header)?),
        BASE64_URL.encode(serde_json::to_vec(&claims)?)
    );

    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .map_err(|e| TraderError::Authentication(format!("Failed to create HMAC: {}", e)))?;
    mac.update(signing_input.as_bytes());
    let signature = BASE64_URL.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", signing_input, signature))
}

/// `Authorization` header value for a request, with a fresh UUID nonce
pub fn authorization_header(
    access_key: &str,
    secret_key: &str,
    query: Option<&str>,
) -> Result<String> {
    let nonce = uuid::Uuid::new_v4().to_string();
    let token = encode_token(access_key, secret_key, &nonce, query)?;
    Ok(format!("Bearer {}", token))
}
