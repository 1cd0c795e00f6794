//! Routes exempt from bearer authentication and refresh handling

pub const LOGIN_PATH: &str = "/auth/login";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/forgot-password";
pub const REFRESH_TOKEN_PATH: &str = "/auth/refresh-token";

/// Path suffixes that never carry an `Authorization` header and never
/// trigger a token refresh.
pub const PUBLIC_ENDPOINTS: &[&str] = &[LOGIN_PATH, FORGOT_PASSWORD_PATH, REFRESH_TOKEN_PATH];

/// Whether `path` is a public route. Query strings, fragments and a trailing
/// slash are ignored.
pub fn is_public_endpoint(path: &str) -> bool {
    let path = route(path);
    PUBLIC_ENDPOINTS.iter().any(|suffix| path.ends_with(suffix))
}

/// Whether `path` is the login route. A 401 here means rejected credentials,
/// not an expired session.
pub fn is_login_endpoint(path: &str) -> bool {
    route(path).ends_with(LOGIN_PATH)
}

fn route(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path.get(..end).unwrap_or(path).trim_end_matches('/')
}
