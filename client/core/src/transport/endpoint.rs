//! Endpoint URIs
//!
//! The service authorizes a connection through a `token` query parameter on
//! the websocket URI. Any `token` already present on the configured base
//! endpoint is replaced; other query parameters are kept.

use url::Url;

use crate::error::ChatError;
use crate::token::Token;

/// Build the connection URI for `token` on top of `base`
///
/// # Errors
///
/// Returns `ChatError::InvalidEndpoint` if `base` does not parse or is not a
/// `ws`/`wss` URI.
pub fn endpoint_uri(base: &str, token: &Token) -> Result<Url, ChatError> {
    let mut url =
        Url::parse(base).map_err(|e| ChatError::InvalidEndpoint(format!("{base}: {e}")))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(ChatError::InvalidEndpoint(format!(
                "{base}: scheme `{other}` is not ws or wss"
            )))
        }
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "token")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("token", token.as_str());

    Ok(url)
}

/// Render a connection URI for logs, without its query string
#[must_use]
pub fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn token(raw: &str) -> Token {
        Token::new(raw).unwrap()
    }

    #[test]
    fn test_token_appended() {
        let url = endpoint_uri("ws://localhost:8080/chat", &token("abc")).unwrap();
        assert_eq!(url.as_str(), "ws://localhost:8080/chat?token=abc");
    }

    #[test]
    fn test_token_is_percent_encoded() {
        let url = endpoint_uri("wss://chat.example.com/chat", &token("a+b/c=")).unwrap();
        assert_eq!(
            url.as_str(),
            "wss://chat.example.com/chat?token=a%2Bb%2Fc%3D"
        );
    }

    #[test]
    fn test_existing_token_replaced_other_params_kept() {
        let url = endpoint_uri("ws://host/chat?lang=en&token=old", &token("new")).unwrap();
        assert_eq!(url.as_str(), "ws://host/chat?lang=en&token=new");
    }

    #[test]
    fn test_rejects_non_websocket_scheme() {
        let err = endpoint_uri("https://host/chat", &token("t")).unwrap_err();
        assert!(matches!(err, ChatError::InvalidEndpoint(_)));

        let err = endpoint_uri("not a uri", &token("t")).unwrap_err();
        assert!(matches!(err, ChatError::InvalidEndpoint(_)));
    }

    #[test]
    fn test_redact_drops_token() {
        let url = endpoint_uri("ws://host:1/chat", &token("secret")).unwrap();
        let shown = redact(&url);
        assert_eq!(shown, "ws://host:1/chat");
        assert!(!shown.contains("secret"));
    }
}
