use std::collections::HashMap;

/// Session state carried across scenarios within one run.
///
/// Captured from responses (Set-Cookie headers, token-bearing bodies) and
/// replayed on subsequent requests. One fresh context per run; merges are
/// last-write-wins with no history kept.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    cookies: HashMap<String, String>,
    bearer: Option<String>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any session state (cookie or token) has been captured
    pub fn is_authenticated(&self) -> bool {
        !self.cookies.is_empty() || self.bearer.is_some()
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }

    /// Render captured cookies as a `Cookie` request header value
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        Some(pairs.join("; "))
    }

    /// Merge one `Set-Cookie` response header. Attributes (Path, HttpOnly,
    /// Max-Age, ...) are dropped; only the cookie pair is kept.
    pub fn absorb_set_cookie(&mut self, header: &str) {
        let Some(pair) = header.split(';').next() else {
            return;
        };
        if let Some((name, value)) = pair.split_once('=') {
            let name = name.trim();
            if !name.is_empty() {
                self.cookies.insert(name.to_string(), value.trim().to_string());
            }
        }
    }

    /// Merge a bearer token from a response body, when present. The target
    /// surfaces it as a top-level `token` field or under `data.token`.
    pub fn absorb_token(&mut self, body: &serde_json::Value) {
        let token = body
            .get("token")
            .or_else(|| body.pointer("/data/token"))
            .and_then(|v| v.as_str());
        if let Some(token) = token {
            self.bearer = Some(token.to_string());
        }
    }

    /// Drop all captured state (logout)
    pub fn clear(&mut self) {
        self.cookies.clear();
        self.bearer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbs_cookie_pair_and_drops_attributes() {
        let mut session = SessionContext::new();
        session.absorb_set_cookie("session=abc123; Path=/; HttpOnly; SameSite=Lax");
        assert!(session.is_authenticated());
        assert_eq!(session.cookie_header().unwrap(), "session=abc123");
    }

    #[test]
    fn cookie_merge_is_last_write_wins() {
        let mut session = SessionContext::new();
        session.absorb_set_cookie("session=first");
        session.absorb_set_cookie("session=second");
        assert_eq!(session.cookie_header().unwrap(), "session=second");
    }

    #[test]
    fn multiple_cookies_render_sorted() {
        let mut session = SessionContext::new();
        session.absorb_set_cookie("refresh=r1; Path=/");
        session.absorb_set_cookie("session=s1; Path=/");
        assert_eq!(session.cookie_header().unwrap(), "refresh=r1; session=s1");
    }

    #[test]
    fn absorbs_token_from_body() {
        let mut session = SessionContext::new();
        session.absorb_token(&serde_json::json!({"success": true, "token": "tok-1"}));
        assert_eq!(session.bearer(), Some("tok-1"));

        session.absorb_token(&serde_json::json!({"data": {"token": "tok-2"}}));
        assert_eq!(session.bearer(), Some("tok-2"));
    }

    #[test]
    fn body_without_token_leaves_state_untouched() {
        let mut session = SessionContext::new();
        session.absorb_token(&serde_json::json!({"success": true}));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn clear_drops_everything() {
        let mut session = SessionContext::new();
        session.absorb_set_cookie("session=abc");
        session.absorb_token(&serde_json::json!({"token": "t"}));
        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.cookie_header().is_none());
    }
}
