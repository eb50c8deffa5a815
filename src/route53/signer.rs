//! AWS Signature Version 4 request signing.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Static AWS credentials.
#[derive(Clone)]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
}

// Keep the secret out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .finish()
    }
}

/// The parts of an HTTP request that go into the signature.
///
/// `headers` must already contain `host` and `x-amz-date`; names are
/// expected in lowercase.
#[derive(Debug)]
pub struct SigningRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub headers: &'a [(&'a str, String)],
    pub payload: &'a [u8],
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }

    /// Compute the `Authorization` header value for `request`.
    pub fn authorization(
        &self,
        request: &SigningRequest<'_>,
        region: &str,
        service: &str,
        at: DateTime<Utc>,
    ) -> String {
        let date = at.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, region, service);

        let (canonical, signed_headers) = canonical_request(request);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date(at),
            scope,
            sha256_hex(canonical.as_bytes())
        );

        let key = signing_key(&self.secret_access_key, &date, region, service);
        let signature = hex::encode(hmac(&key, string_to_sign.as_bytes()));

        format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key_id, scope, signed_headers, signature
        )
    }
}

/// Timestamp in the `x-amz-date` format.
pub fn amz_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Build the canonical request and the signed header list.
fn canonical_request(request: &SigningRequest<'_>) -> (String, String) {
    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        uri_encode(request.path, false),
        canonical_query(request.query),
        canonical_headers,
        signed_headers,
        sha256_hex(request.payload)
    );

    (canonical, signed_headers)
}

/// Encode and sort query parameters the way both the signature and the
/// request line need them.
pub(crate) fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, true), uri_encode(v, true)))
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// RFC 3986 encoding with the AWS unreserved set.
pub(crate) fn uri_encode(input: &str, encode_slash: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b'/' if !encode_slash => out.push('/'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac(format!("AWS4{}", secret).as_bytes(), date.as_bytes());
    let k_region = hmac(&k_date, region.as_bytes());
    let k_service = hmac(&k_region, service.as_bytes());
    hmac(&k_service, b"aws4_request")
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // Published example from the AWS SigV4 documentation (IAM ListUsers).
    fn iam_example() -> (Vec<(String, String)>, Vec<(&'static str, String)>) {
        let query = vec![
            ("Version".to_string(), "2010-05-08".to_string()),
            ("Action".to_string(), "ListUsers".to_string()),
        ];
        let headers = vec![
            ("x-amz-date", "20150830T123600Z".to_string()),
            ("host", "iam.amazonaws.com".to_string()),
            (
                "content-type",
                "application/x-www-form-urlencoded; charset=utf-8".to_string(),
            ),
        ];
        (query, headers)
    }

    #[test]
    fn test_canonical_request_matches_aws_example() {
        let (query, headers) = iam_example();
        let request = SigningRequest {
            method: "GET",
            path: "/",
            query: &query,
            headers: &headers,
            payload: b"",
        };

        let (canonical, signed) = canonical_request(&request);

        assert_eq!(signed, "content-type;host;x-amz-date");
        assert_eq!(
            sha256_hex(canonical.as_bytes()),
            "f536975d06c0309214f805bb90ccff089219ecd68b2577efef23edd43b7e1a59"
        );
    }

    #[test]
    fn test_signing_key_matches_aws_example() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20150830",
            "us-east-1",
            "iam",
        );
        assert_eq!(
            hex::encode(key),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_authorization_matches_aws_example() {
        let (query, headers) = iam_example();
        let request = SigningRequest {
            method: "GET",
            path: "/",
            query: &query,
            headers: &headers,
            payload: b"",
        };
        let creds = Credentials::new("AKIDEXAMPLE", "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY");
        let at = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();

        let auth = creds.authorization(&request, "us-east-1", "iam", at);

        assert_eq!(
            auth,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, \
             SignedHeaders=content-type;host;x-amz-date, \
             Signature=5d672d79c15b13162d9279b0855cfba6789a8edb4c82c400e06b5924a6f2b5d7"
        );
    }

    #[test]
    fn test_uri_encode() {
        assert_eq!(uri_encode("a.example.com.", true), "a.example.com.");
        assert_eq!(uri_encode("\\052.example.com", true), "%5C052.example.com");
        assert_eq!(uri_encode("/2013-04-01/hostedzone", false), "/2013-04-01/hostedzone");
        assert_eq!(uri_encode("a/b c", true), "a%2Fb%20c");
    }

    #[test]
    fn test_canonical_query_sorted() {
        let query = vec![
            ("type".to_string(), "A".to_string()),
            ("name".to_string(), "b.example.com.".to_string()),
        ];
        assert_eq!(canonical_query(&query), "name=b.example.com.&type=A");
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = Credentials::new("AKID", "topsecret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("topsecret"));
    }
}
