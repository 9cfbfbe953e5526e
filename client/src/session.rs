use marketchat_messaging::UserId;
use std::fmt;

/// Bearer token issued by the marketplace login endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank tokens.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            None
        } else {
            Some(Self(token))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Who is chatting, passed explicitly to every channel.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub credential: Option<Credential>,
}

impl Session {
    pub fn new(user_id: UserId, token: Option<String>) -> Self {
        Self {
            user_id,
            credential: token.and_then(Credential::new),
        }
    }

    pub fn authenticated(user_id: UserId, token: impl Into<String>) -> Self {
        Self::new(user_id, Some(token.into()))
    }

    pub fn anonymous(user_id: UserId) -> Self {
        Self::new(user_id, None)
    }

    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some()
    }
}
