//! Session cookies and startup authentication.
//!
//! The platform identifies a logged-in user by two cookies, `GCID` and
//! `GCESS`. [`establish_session`] verifies them once, rebuilds the cookie
//! jar with hardened attributes on failure, and gives up after that single
//! retry.

use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, info, warn};
use url::Url;

use super::client::{HttpCourseApi, PlatformEndpoints};
use super::error::ApiError;
use super::CourseApi;
use crate::download::HttpTimeouts;

pub const GCID: &str = "GCID";
pub const GCESS: &str = "GCESS";

/// Lifetime of the standard cookies (180 days).
const COOKIE_MAX_AGE_SECS: u64 = 180 * 24 * 60 * 60;

/// The two session cookie values a user copies from the browser.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub gcid: String,
    pub gcess: String,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("gcid", &redact(&self.gcid))
            .field("gcess", &redact(&self.gcess))
            .finish()
    }
}

fn redact(value: &str) -> String {
    let prefix: String = value.chars().take(4).collect();
    format!("{prefix}…")
}

/// Cookie attribute sets tried during authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieFlavor {
    /// `Path=/; HttpOnly` with a 180-day lifetime.
    Standard,
    /// `Path=/; Secure; HttpOnly` session cookies, used on the retry.
    Hardened,
}

/// Builds the `Set-Cookie` strings for one flavor.
///
/// `domain` is emitted only when it applies to `origin_host`, so host-only
/// cookies are used against non-platform hosts (e.g. a local mock server).
#[must_use]
pub fn session_cookie_strings(
    credentials: &SessionCredentials,
    cookie_domain: &str,
    origin_host: &str,
    flavor: CookieFlavor,
) -> Vec<String> {
    let bare_domain = cookie_domain.trim_start_matches('.');
    let domain_attr = if !bare_domain.is_empty()
        && (origin_host == bare_domain || origin_host.ends_with(&format!(".{bare_domain}")))
    {
        format!("; Domain={cookie_domain}")
    } else {
        String::new()
    };
    let flavor_attrs = match flavor {
        CookieFlavor::Standard => format!("; HttpOnly; Max-Age={COOKIE_MAX_AGE_SECS}"),
        CookieFlavor::Hardened => "; Secure; HttpOnly".to_string(),
    };

    [(GCID, &credentials.gcid), (GCESS, &credentials.gcess)]
        .into_iter()
        .map(|(name, value)| format!("{name}={value}{domain_attr}; Path=/{flavor_attrs}"))
        .collect()
}

/// Builds a cookie jar holding the session cookies for every platform origin.
#[must_use]
pub fn build_cookie_jar(
    credentials: &SessionCredentials,
    endpoints: &PlatformEndpoints,
    flavor: CookieFlavor,
) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());
    for origin in endpoints.origins() {
        let Ok(url) = Url::parse(origin) else {
            warn!(origin, "skipping cookies for unparseable origin");
            continue;
        };
        let host = url.host_str().unwrap_or_default().to_string();
        for cookie in session_cookie_strings(credentials, &endpoints.cookie_domain, &host, flavor) {
            jar.add_cookie_str(&cookie, &url);
        }
        debug!(origin, ?flavor, "loaded session cookies");
    }
    jar
}

/// Verifies the credentials and returns an authenticated API client.
///
/// A rejected session is retried once with [`CookieFlavor::Hardened`]
/// cookies; a second rejection is returned to the caller as fatal.
///
/// # Errors
///
/// Returns [`ApiError`] when the client cannot be built or both
/// verification attempts fail.
pub async fn establish_session(
    credentials: &SessionCredentials,
    endpoints: PlatformEndpoints,
    timeouts: HttpTimeouts,
) -> Result<HttpCourseApi, ApiError> {
    info!("verifying session");
    let jar = build_cookie_jar(credentials, &endpoints, CookieFlavor::Standard);
    let api = HttpCourseApi::new(endpoints.clone(), jar, timeouts)?;
    match api.verify_session().await {
        Ok(()) => {
            info!("session verified");
            return Ok(api);
        }
        Err(error) => warn!(%error, "session verification failed; rebuilding cookies"),
    }

    let jar = build_cookie_jar(credentials, &endpoints, CookieFlavor::Hardened);
    let api = HttpCourseApi::new(endpoints, jar, timeouts)?;
    api.verify_session().await?;
    info!("session verified");
    Ok(api)
}
