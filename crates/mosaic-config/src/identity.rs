use serde::Deserialize;

/// How the current user is identified
///
/// Identity itself is established by a fronting proxy; Mosaic only reads
/// the header it sets and points anonymous callers at the sign-in page.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Header carrying the authenticated user id
    #[serde(default = "default_header")]
    pub user_header: String,
    /// Sign-in page anonymous callers are sent to
    #[serde(default = "default_sign_in_url")]
    pub sign_in_url: String,
    /// Paths reachable without an identity
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_header: default_header(),
            sign_in_url: default_sign_in_url(),
            public_paths: default_public_paths(),
        }
    }
}

fn default_header() -> String {
    "x-user-id".to_string()
}

fn default_sign_in_url() -> String {
    "/sign-in".to_string()
}

fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string()]
}
