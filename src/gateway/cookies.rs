use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use super::config::CookieSettings;
use crate::types::TokenGrant;

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";
/// Older deployments stored the access token under this name.
const LEGACY_ACCESS_COOKIE_NAME: &str = "token";

fn token_cookie(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Create the access-token cookie. Max-age follows `expires_in` when positive.
pub(super) fn access_cookie(
    token: &str,
    expires_in: Option<i64>,
    settings: &CookieSettings,
) -> Cookie<'static> {
    let max_age = expires_in
        .filter(|secs| *secs > 0)
        .map_or(settings.access_fallback_ttl, Duration::seconds);
    token_cookie(ACCESS_COOKIE_NAME, token.to_owned(), max_age, settings.secure)
}

/// Create the refresh-token cookie (fixed lifetime).
pub(super) fn refresh_cookie(token: &str, settings: &CookieSettings) -> Cookie<'static> {
    token_cookie(
        REFRESH_COOKIE_NAME,
        token.to_owned(),
        settings.refresh_ttl,
        settings.secure,
    )
}

/// Add the cookies for a token grant: always the access cookie, and the
/// refresh cookie only when the grant carries one.
pub(super) fn store_grant(jar: CookieJar, grant: &TokenGrant, access_token: &str, settings: &CookieSettings) -> CookieJar {
    let jar = jar.add(access_cookie(access_token, grant.expires_in, settings));
    match &grant.refresh_token {
        Some(refresh) => jar.add(refresh_cookie(refresh, settings)),
        None => jar,
    }
}

/// Expire both session cookies.
///
/// Uses `add` with max-age 0 rather than `CookieJar::remove`, so the clearing
/// headers are sent even when the request carried no cookies.
pub(super) fn clear_session(jar: CookieJar, settings: &CookieSettings) -> CookieJar {
    jar.add(token_cookie(
        ACCESS_COOKIE_NAME,
        String::new(),
        Duration::ZERO,
        settings.secure,
    ))
    .add(token_cookie(
        REFRESH_COOKIE_NAME,
        String::new(),
        Duration::ZERO,
        settings.secure,
    ))
}

/// Get the access token from cookies.
pub(super) fn get_access_token(jar: &CookieJar) -> Option<String> {
    [ACCESS_COOKIE_NAME, LEGACY_ACCESS_COOKIE_NAME]
        .into_iter()
        .filter_map(|name| jar.get(name))
        .map(|c| c.value().to_owned())
        .find(|v| !v.is_empty())
}

/// Get the refresh token from cookies.
pub(super) fn get_refresh_token(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_COOKIE_NAME)
        .map(|c| c.value().to_owned())
        .filter(|v| !v.is_empty())
}
