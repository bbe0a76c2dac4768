//! Static route classification

use axum::http::Method;

/// Which side of the authentication gate a request falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Public,
    Protected,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Public => "public",
            Zone::Protected => "protected",
        }
    }
}

/// Allow-list of routes that skip authentication.
///
/// Everything not listed is protected, unknown paths included, so a request
/// for a route that does not exist is rejected with 401 before it can 404.
#[derive(Debug, Clone)]
pub struct RouteTable {
    public: Vec<(Method, &'static str)>,
}

impl RouteTable {
    pub fn new(public: Vec<(Method, &'static str)>) -> Self {
        Self { public }
    }

    /// Registration and login are the only public routes
    pub fn standard() -> Self {
        Self::new(vec![(Method::POST, "/signup"), (Method::POST, "/signin")])
    }

    pub fn classify(&self, method: &Method, path: &str) -> Zone {
        if self
            .public
            .iter()
            .any(|(m, p)| m == method && *p == path)
        {
            Zone::Public
        } else {
            Zone::Protected
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}
