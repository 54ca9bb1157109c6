use base64::Engine;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha1::Sha1;

use crate::PublishError;

/// Environment variables holding the app and user credentials
pub const CREDENTIAL_VARS: [&str; 4] = [
    "CONSUMER_KEY",
    "CONSUMER_KEY_SECRET",
    "ACCESS_TOKEN",
    "ACCESS_TOKEN_SECRET",
];

const NONCE_LEN: usize = 32;

/// App (consumer) and user (access token) credentials for OAuth 1.0a
#[derive(Clone)]
pub struct OAuthCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("consumer_key", &self.consumer_key)
            .field("access_token", &self.access_token)
            .finish_non_exhaustive()
    }
}

impl OAuthCredentials {
    pub fn from_env() -> Result<Self, PublishError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PublishError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = Vec::with_capacity(CREDENTIAL_VARS.len());
        let mut missing = Vec::new();
        for name in CREDENTIAL_VARS {
            match lookup(name).filter(|v| !v.trim().is_empty()) {
                Some(v) => values.push(v),
                None => missing.push(name),
            }
        }
        if !missing.is_empty() {
            return Err(PublishError::MissingCredentials(missing));
        }

        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        Ok(Self {
            consumer_key: next(),
            consumer_secret: next(),
            access_token: next(),
            access_token_secret: next(),
        })
    }
}

/// Signs requests with OAuth 1.0a HMAC-SHA1
#[derive(Debug, Clone)]
pub struct OAuthSigner {
    credentials: OAuthCredentials,
    fixed: Option<(String, i64)>,
}

impl OAuthSigner {
    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            fixed: None,
        }
    }

    /// Use a fixed nonce and timestamp instead of fresh ones
    pub fn with_fixed_nonce(mut self, nonce: impl Into<String>, timestamp: i64) -> Self {
        self.fixed = Some((nonce.into(), timestamp));
        self
    }

    /// `Authorization` header value for a request. `extra_params` are the
    /// query or form parameters that take part in the signature; a JSON body
    /// does not.
    pub fn authorization_header(
        &self,
        method: &str,
        url: &str,
        extra_params: &[(&str, &str)],
    ) -> String {
        let (nonce, timestamp) = match &self.fixed {
            Some((nonce, timestamp)) => (nonce.clone(), *timestamp),
            None => (generate_nonce(), chrono::Utc::now().timestamp()),
        };
        let timestamp = timestamp.to_string();

        let mut oauth_params = vec![
            ("oauth_consumer_key", self.credentials.consumer_key.as_str()),
            ("oauth_nonce", nonce.as_str()),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", timestamp.as_str()),
            ("oauth_token", self.credentials.access_token.as_str()),
            ("oauth_version", "1.0"),
        ];

        let mut all_params = oauth_params.clone();
        all_params.extend_from_slice(extra_params);
        let signature = self.signature(method, url, &all_params);

        oauth_params.push(("oauth_signature", signature.as_str()));
        oauth_params.sort();
        let fields: Vec<String> = oauth_params
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
            .collect();
        format!("OAuth {}", fields.join(", "))
    }

    /// Base64 HMAC-SHA1 over the signature base string
    pub fn signature(&self, method: &str, url: &str, params: &[(&str, &str)]) -> String {
        let base = signature_base_string(method, url, params);
        let key = format!(
            "{}&{}",
            encode(&self.credentials.consumer_secret),
            encode(&self.credentials.access_token_secret)
        );

        let mut mac =
            Hmac::<Sha1>::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
        mac.update(base.as_bytes());
        base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// `METHOD&enc(url)&enc(sorted params)`
fn signature_base_string(method: &str, url: &str, params: &[(&str, &str)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();
    let joined = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        encode(url),
        encode(&joined)
    )
}

/// RFC 3986 percent-encoding, unreserved characters kept
fn encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    // Worked example from the X developer documentation
    fn documented_credentials() -> OAuthCredentials {
        OAuthCredentials {
            consumer_key: "xvz1evFS4wEEPTGEFPHBog".into(),
            consumer_secret: "kAcSOqF21Fu85e7zjz7ZN2U4ZRhfV3WpwPAoE3Z7kBw".into(),
            access_token: "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb".into(),
            access_token_secret: "LswwdoUaIvS8ltyTt5jkRh4J50vUPVVHtR2YPi5kE".into(),
        }
    }

    const DOC_URL: &str = "https://api.twitter.com/1.1/statuses/update.json";
    const DOC_NONCE: &str = "kYjzVBB8Y0ZFabxSWbWovY3uYSQ2pTgmZeNu2VS4cg";
    const DOC_STATUS: &str = "Hello Ladies + Gentlemen, a signed OAuth request!";

    fn documented_params() -> Vec<(&'static str, &'static str)> {
        vec![
            ("status", DOC_STATUS),
            ("include_entities", "true"),
            ("oauth_consumer_key", "xvz1evFS4wEEPTGEFPHBog"),
            ("oauth_nonce", DOC_NONCE),
            ("oauth_signature_method", "HMAC-SHA1"),
            ("oauth_timestamp", "1318622958"),
            (
                "oauth_token",
                "370773112-GmHxMAgYyLbNEtIKZeRNFsMKPR9EyMZeS9weJAEb",
            ),
            ("oauth_version", "1.0"),
        ]
    }

    #[test]
    fn test_base_string_matches_documented_example() {
        let base = signature_base_string("post", DOC_URL, &documented_params());
        assert!(base.starts_with(
            "POST&https%3A%2F%2Fapi.twitter.com%2F1.1%2Fstatuses%2Fupdate.json&include_entities%3Dtrue%26oauth_consumer_key"
        ));
        assert!(base.ends_with(
            "status%3DHello%2520Ladies%2520%252B%2520Gentlemen%252C%2520a%2520signed%2520OAuth%2520request%2521"
        ));
    }

    #[test]
    fn test_signature_matches_documented_example() {
        let signer = OAuthSigner::new(documented_credentials());
        let signature = signer.signature("POST", DOC_URL, &documented_params());
        assert_eq!(signature, "hCtSmYh+iHYCEqBWrE7C7hYmtUk=");
    }

    #[test]
    fn test_header_uses_documented_signature() {
        let signer = OAuthSigner::new(documented_credentials())
            .with_fixed_nonce(DOC_NONCE, 1318622958);
        let header = signer.authorization_header(
            "POST",
            DOC_URL,
            &[("status", DOC_STATUS), ("include_entities", "true")],
        );

        assert!(header.starts_with("OAuth oauth_consumer_key=\"xvz1evFS4wEEPTGEFPHBog\""));
        assert!(header.contains("oauth_signature=\"hCtSmYh%2BiHYCEqBWrE7C7hYmtUk%3D\""));
        assert!(header.contains("oauth_version=\"1.0\""));
        // Request parameters are signed but not sent in the header
        assert!(!header.contains("status="));
    }

    #[test]
    fn test_fresh_nonce_per_header() {
        let signer = OAuthSigner::new(documented_credentials());
        let a = signer.authorization_header("POST", "https://api.x.com/2/tweets", &[]);
        let b = signer.authorization_header("POST", "https://api.x.com/2/tweets", &[]);
        assert_ne!(a, b);

        let nonce = generate_nonce();
        assert_eq!(nonce.len(), NONCE_LEN);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_credentials_report_every_missing_variable() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CONSUMER_KEY", "key"),
            ("CONSUMER_KEY_SECRET", "secret"),
            ("ACCESS_TOKEN", "  "),
        ]);
        let err =
            OAuthCredentials::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        match err {
            PublishError::MissingCredentials(missing) => {
                assert_eq!(missing, vec!["ACCESS_TOKEN", "ACCESS_TOKEN_SECRET"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_credentials_from_lookup() {
        let creds = OAuthCredentials::from_lookup(|k| Some(k.to_lowercase())).unwrap();
        assert_eq!(creds.consumer_key, "consumer_key");
        assert_eq!(creds.access_token_secret, "access_token_secret");
        assert!(!format!("{creds:?}").contains("access_token_secret"));
    }
}
