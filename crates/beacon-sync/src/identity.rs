//! Session identity
//!
//! The identity (user, room, locale) parameterizes the connection target.
//! [`SessionBinder`] tracks the bound identity and classifies updates: a
//! new user or room invalidates the session, a new locale only needs an
//! in-band notice on the live transport.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{SyncError, SyncResult};

/// Routing classifier for the server-side room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Room {
    Admin,
    #[default]
    Standard,
}

impl Room {
    pub fn as_str(&self) -> &'static str {
        match self {
            Room::Admin => "admin",
            Room::Standard => "standard",
        }
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Room {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Room::Admin),
            "standard" | "user" => Ok(Room::Standard),
            other => Err(format!("Invalid room: {}", other)),
        }
    }
}

/// Who the connection is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user identifier
    pub user_id: String,
    /// Room classifier
    pub room: Room,
    /// Current locale (e.g. "en", "vi")
    pub locale: String,
}

impl Identity {
    /// Identity with the default locale
    pub fn new(user_id: impl Into<String>, room: Room) -> Self {
        Self {
            user_id: user_id.into(),
            room,
            locale: "en".to_string(),
        }
    }

    /// Set the locale
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// A connection needs at least a user id
    pub fn is_complete(&self) -> bool {
        !self.user_id.trim().is_empty()
    }

    /// Same user and room, locale aside
    pub fn same_session(&self, other: &Identity) -> bool {
        self.user_id == other.user_id && self.room == other.room
    }
}

/// Classification of an identity update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    /// Nothing changed
    Unchanged,
    /// Only the locale changed
    Locale(String),
    /// User or room changed (or no identity was bound before)
    Session,
}

/// Tracks the bound identity
#[derive(Debug, Clone, Default)]
pub struct SessionBinder {
    current: Option<Identity>,
}

impl SessionBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `next` and report what changed
    pub fn bind(&mut self, next: Identity) -> IdentityChange {
        let change = match &self.current {
            None => IdentityChange::Session,
            Some(current) if !current.same_session(&next) => IdentityChange::Session,
            Some(current) if current.locale != next.locale => {
                IdentityChange::Locale(next.locale.clone())
            }
            Some(_) => IdentityChange::Unchanged,
        };
        self.current = Some(next);
        change
    }

    /// Update only the locale. Returns `false` when nothing is bound or
    /// the locale is unchanged.
    pub fn set_locale(&mut self, locale: &str) -> bool {
        match self.current.as_mut() {
            Some(identity) if identity.locale != locale => {
                identity.locale = locale.to_string();
                true
            }
            _ => false,
        }
    }

    /// Forget the bound identity
    pub fn clear(&mut self) -> Option<Identity> {
        self.current.take()
    }

    /// Currently bound identity
    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    /// Locale of the bound identity
    pub fn locale(&self) -> Option<&str> {
        self.current.as_ref().map(|identity| identity.locale.as_str())
    }
}

/// WebSocket endpoint derived from the HTTP API base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    /// Translate an HTTP API base (`https://host/api`) into the WebSocket
    /// endpoint at `ws_path` (`wss://host/ws`). A relative `ws_path` is
    /// appended to the API path instead of replacing it.
    pub fn from_api_base(api_base: &str, ws_path: &str) -> SyncResult<Self> {
        let mut url = Url::parse(api_base.trim())?;

        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(SyncError::UnsupportedScheme(other.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|_| SyncError::UnsupportedScheme(url.scheme().to_string()))?;

        if ws_path.starts_with('/') {
            url.set_path(ws_path);
        } else if !ws_path.is_empty() {
            let joined = format!("{}/{}", url.path().trim_end_matches('/'), ws_path);
            url.set_path(&joined);
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { base: url })
    }

    /// Endpoint without identity parameters
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Full connection target for `identity`
    pub fn target(&self, identity: &Identity) -> SyncResult<Url> {
        if !identity.is_complete() {
            return Err(SyncError::IncompleteIdentity);
        }
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("room", identity.room.as_str())
            .append_pair("user_id", &identity.user_id)
            .append_pair("lang", &identity.locale);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binder_classifies_changes() {
        let mut binder = SessionBinder::new();
        let admin = Identity::new("42", Room::Admin);

        assert_eq!(binder.bind(admin.clone()), IdentityChange::Session);
        assert_eq!(binder.bind(admin.clone()), IdentityChange::Unchanged);
        assert_eq!(
            binder.bind(admin.clone().with_locale("vi")),
            IdentityChange::Locale("vi".to_string())
        );
        assert_eq!(
            binder.bind(Identity::new("42", Room::Standard).with_locale("vi")),
            IdentityChange::Session
        );
        assert_eq!(
            binder.bind(Identity::new("43", Room::Standard).with_locale("vi")),
            IdentityChange::Session
        );
    }

    #[test]
    fn test_binder_set_locale() {
        let mut binder = SessionBinder::new();
        assert!(!binder.set_locale("vi"));

        binder.bind(Identity::new("42", Room::Admin));
        assert!(binder.set_locale("vi"));
        assert!(!binder.set_locale("vi"));
        assert_eq!(binder.locale(), Some("vi"));

        assert!(binder.clear().is_some());
        assert!(binder.current().is_none());
    }

    #[test]
    fn test_endpoint_scheme_translation() {
        let http = Endpoint::from_api_base("http://localhost:8000/api", "/ws").unwrap();
        assert_eq!(http.base().as_str(), "ws://localhost:8000/ws");

        let https = Endpoint::from_api_base("https://admin.example.com/api/v1/", "/ws").unwrap();
        assert_eq!(https.base().as_str(), "wss://admin.example.com/ws");

        let ws = Endpoint::from_api_base("wss://admin.example.com", "/events").unwrap();
        assert_eq!(ws.base().as_str(), "wss://admin.example.com/events");
    }

    #[test]
    fn test_endpoint_relative_path_is_appended() {
        let endpoint = Endpoint::from_api_base("https://admin.example.com/api/", "ws").unwrap();
        assert_eq!(endpoint.base().as_str(), "wss://admin.example.com/api/ws");
    }

    #[test]
    fn test_endpoint_rejects_other_schemes() {
        assert!(matches!(
            Endpoint::from_api_base("ftp://example.com", "/ws"),
            Err(SyncError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Endpoint::from_api_base("not a url", "/ws"),
            Err(SyncError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_target_carries_identity() {
        let endpoint = Endpoint::from_api_base("https://admin.example.com/api", "/ws").unwrap();
        let url = endpoint
            .target(&Identity::new("user 7", Room::Admin).with_locale("vi"))
            .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("room".to_string(), "admin".to_string()),
                ("user_id".to_string(), "user 7".to_string()),
                ("lang".to_string(), "vi".to_string()),
            ]
        );
    }

    #[test]
    fn test_target_requires_user_id() {
        let endpoint = Endpoint::from_api_base("https://admin.example.com", "/ws").unwrap();
        assert!(matches!(
            endpoint.target(&Identity::new("  ", Room::Admin)),
            Err(SyncError::IncompleteIdentity)
        ));
    }

    #[test]
    fn test_room_parsing() {
        assert_eq!("ADMIN".parse::<Room>().unwrap(), Room::Admin);
        assert_eq!("user".parse::<Room>().unwrap(), Room::Standard);
        assert!("guest".parse::<Room>().is_err());
    }
}
