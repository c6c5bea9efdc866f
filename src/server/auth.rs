use std::collections::HashMap;

use headers::authorization::Basic;
use headers::{Authorization, HeaderMapExt};
use http::HeaderMap;

/// Identity provider.
///
/// Checks a username/password pair and returns the user id that
/// partitions the property store, or `None` if the credentials are bad.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, username: &str, password: &str) -> Option<String>;
}

/// Fixed set of users kept in memory. The user id is the username.
#[derive(Debug, Clone, Default)]
pub struct UserTable {
    users: HashMap<String, String>,
}

impl UserTable {
    pub fn new() -> UserTable {
        UserTable::default()
    }

    pub fn user(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        let mut this = self;
        this.users.insert(username.into(), password.into());
        this
    }
}

impl Authenticator for UserTable {
    fn authenticate(&self, username: &str, password: &str) -> Option<String> {
        match self.users.get(username) {
            Some(p) if p == password => Some(username.to_string()),
            _ => None,
        }
    }
}

// Resolve the Authorization: Basic header to a user id.
pub(crate) fn basic_user(headers: &HeaderMap, auth: &dyn Authenticator) -> Option<String> {
    let Authorization(basic) = headers.typed_get::<Authorization<Basic>>()?;
    let user = auth.authenticate(basic.username(), basic.password());
    if user.is_none() {
        warn!("authentication failed for user {:?}", basic.username());
    }
    user
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_table() {
        let users = UserTable::new().user("alice", "secret");
        assert_eq!(users.authenticate("alice", "secret").as_deref(), Some("alice"));
        assert_eq!(users.authenticate("alice", "wrong"), None);
        assert_eq!(users.authenticate("bob", "secret"), None);
    }

    #[test]
    fn test_basic_header() {
        let users = UserTable::new().user("alice", "secret");
        let mut headers = HeaderMap::new();
        assert_eq!(basic_user(&headers, &users), None);

        headers.typed_insert(Authorization::basic("alice", "secret"));
        assert_eq!(basic_user(&headers, &users).as_deref(), Some("alice"));

        headers.typed_insert(Authorization::basic("alice", "nope"));
        assert_eq!(basic_user(&headers, &users), None);
    }
}
