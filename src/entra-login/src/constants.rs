//! Constants for the entra-login crate.

use std::time::Duration;

/// Authority host for the Azure public cloud.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Environment variable overriding the authority host.
pub const AUTHORITY_ENV_VAR: &str = "ENTRA_TOKEN_AUTHORITY";

/// Environment variable selecting the sealer backend (`user` or `keyring`).
pub const SEALER_ENV_VAR: &str = "ENTRA_TOKEN_SEALER";

/// Path component of the loopback redirect URI.
pub const REDIRECT_PATH: &str = "/callback";

/// Scope that makes the provider issue a refresh token.
pub const OFFLINE_ACCESS_SCOPE: &str = "offline_access";

/// Service name for the keyring-held cache key.
pub const KEYRING_SERVICE: &str = "entra-token";

/// Account name for the keyring-held cache key.
pub const KEYRING_ACCOUNT: &str = "cache-key";

/// User-Agent string for HTTP requests.
pub const USER_AGENT: &str = concat!("entra-token/", env!("CARGO_PKG_VERSION"));

/// Timeout for individual HTTP requests.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum time to wait for the user to finish the browser login.
pub const LOGIN_TIMEOUT_SECS: u64 = 180;

/// Tokens expiring within this window are treated as already expired,
/// so a token handed out is usable for at least this long.
pub const CLOCK_SKEW_SECS: i64 = 300;
