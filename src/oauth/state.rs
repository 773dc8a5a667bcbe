//! `oauthstate` cookie: correlates a callback with the redirect that started it.

use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::Duration;

pub const STATE_COOKIE: &str = "oauthstate";

/// Only the OAuth endpoints ever see the cookie
const STATE_COOKIE_PATH: &str = "/auth";

const STATE_COOKIE_MAX_AGE: Duration = Duration::minutes(5);

/// Cookie carrying the state value for 5 minutes
pub fn state_cookie(value: String) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE, value))
        .path(STATE_COOKIE_PATH)
        .max_age(STATE_COOKIE_MAX_AGE)
        .http_only(true)
        .build()
}

/// State value from the request, if present and non-empty
pub fn read_state(jar: &CookieJar) -> Option<String> {
    jar.get(STATE_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// Jar with the state cookie expired on the client
pub fn clear_state(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(STATE_COOKIE).path(STATE_COOKIE_PATH))
}
