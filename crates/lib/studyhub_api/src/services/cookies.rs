//! Auth cookie for browser sessions.

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie name for the access token.
pub const ACCESS_COOKIE: &str = "studyhub_access";

/// Build a httpOnly cookie carrying the access token.
pub fn access_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((ACCESS_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(max_age_secs.max(0)))
        .build()
}

/// Build an expired cookie to clear auth state.
pub fn clear_access_cookie() -> Cookie<'static> {
    Cookie::build((ACCESS_COOKIE.to_string(), String::new()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_cookie_is_http_only() {
        let cookie = access_cookie("tok", 3600, true);
        assert_eq!(cookie.name(), ACCESS_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::seconds(3600)));
    }

    #[test]
    fn clearing_cookie_expires_immediately() {
        let cookie = clear_access_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }
}
