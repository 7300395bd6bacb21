//! Forum login.
//!
//! Produces the [`AuthContext`] every task unit sends its requests under,
//! and the `authenticated` flag that gates authenticated actions such as
//! leaving a thanks.

use crate::config::Config;
use crate::error::Result;
use crate::transport::{AuthContext, PreparedRequest, Transport};
use crate::utils::format_error_chain;

/// Cookie set by the forum once a login succeeded
pub const SESSION_COOKIE: &str = "vg_userid";

/// Session state handed to task units
#[derive(Clone, Debug)]
pub struct AuthSession {
    /// Cookie-carrying HTTP session
    pub context: AuthContext,
    /// Whether the forum accepted the login
    pub authenticated: bool,
}

impl AuthSession {
    /// A fresh, unauthenticated session
    pub fn anonymous(config: &Config) -> Result<Self> {
        Ok(Self {
            context: AuthContext::new(&config.connection)?,
            authenticated: false,
        })
    }
}

/// Performs the forum login
pub struct AuthService;

impl AuthService {
    /// Log in with the configured account
    ///
    /// Returns an anonymous session when login is disabled. A rejected or
    /// failed login is logged and also yields `authenticated = false`; only
    /// failing to build the HTTP client is an error.
    pub async fn login(config: &Config, transport: &dyn Transport) -> Result<AuthSession> {
        let mut session = AuthSession::anonymous(config)?;
        if !config.viper.login {
            tracing::debug!("Login disabled, using anonymous session");
            return Ok(session);
        }

        let host = &config.viper.host;
        let digest = format!("{:x}", md5::compute(config.viper.password.as_bytes()));
        let request = PreparedRequest::post(format!("{}/login.php?do=login", host))
            .header("Referer", host.as_str())
            .form(&[
                ("vb_login_username", config.viper.username.as_str()),
                ("cookieuser", "1"),
                ("do", "login"),
                ("vb_login_md5password", digest.as_str()),
                ("vb_login_md5password_utf", digest.as_str()),
            ]);

        match transport.execute(request, &session.context).await {
            Ok(response) => {
                session.authenticated = session.context.has_cookie(host, SESSION_COOKIE);
                if session.authenticated {
                    tracing::info!(username = %config.viper.username, "Logged in");
                } else {
                    tracing::warn!(
                        username = %config.viper.username,
                        status = response.status,
                        "Login rejected: no session cookie received"
                    );
                }
            }
            Err(e) => {
                tracing::error!(
                    username = %config.viper.username,
                    error = %format_error_chain(&e),
                    "Login request failed"
                );
            }
        }

        Ok(session)
    }
}
