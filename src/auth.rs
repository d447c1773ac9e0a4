use crate::config::CatalogConfig;

const SESSION_TOKEN_CONTEXT: &str = "inventory_core 2026-01 admin session token";

/// Decides who may run admin commands.
pub trait Authorizer: Send + Sync {
    /// Returns a session token for valid credentials.
    fn login(&self, username: &str, password: &str) -> Option<String>;

    fn is_authorized(&self, token: Option<&str>) -> bool;
}

/// Single configured administrator. The session token is derived from the
/// credentials, so changing the password invalidates issued tokens.
pub struct AdminAuthorizer {
    token: blake3::Hash,
}

impl AdminAuthorizer {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            token: session_token(username, password),
        }
    }
}

fn session_token(username: &str, password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new_derive_key(SESSION_TOKEN_CONTEXT);
    hasher.update(&(username.len() as u64).to_le_bytes());
    hasher.update(username.as_bytes());
    hasher.update(password.as_bytes());
    hasher.finalize()
}

impl Authorizer for AdminAuthorizer {
    fn login(&self, username: &str, password: &str) -> Option<String> {
        // blake3::Hash equality is constant-time.
        if session_token(username, password) == self.token {
            Some(self.token.to_hex().to_string())
        } else {
            None
        }
    }

    fn is_authorized(&self, token: Option<&str>) -> bool {
        token
            .and_then(|token| blake3::Hash::from_hex(token.trim()).ok())
            .map(|token| token == self.token)
            .unwrap_or(false)
    }
}

pub struct DenyAll;

impl Authorizer for DenyAll {
    fn login(&self, _username: &str, _password: &str) -> Option<String> {
        None
    }

    fn is_authorized(&self, _token: Option<&str>) -> bool {
        false
    }
}

pub(crate) fn authorizer_from_config(config: &CatalogConfig) -> Box<dyn Authorizer> {
    match (&config.admin_username, &config.admin_password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            Box::new(AdminAuthorizer::new(username, password))
        }
        _ => {
            tracing::warn!("No admin credentials configured; admin commands are disabled");
            Box::new(DenyAll)
        }
    }
}
