// Start of file: /src/utils/request_meta.rs

/*
    * Request context for audit records: client IP, user agent, method and path.
*/

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{
        header::USER_AGENT, request::Parts, Extensions, HeaderMap, Method, Uri,
    },
};

use crate::models::RequestMeta;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// First `X-Forwarded-For` entry, falling back to the socket peer
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let forwarded: Option<IpAddr> = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok());

    forwarded.or_else(|| {
        extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    })
}

pub fn capture(method: &Method, uri: &Uri, headers: &HeaderMap, extensions: &Extensions) -> RequestMeta {
    RequestMeta {
        ip_address: client_ip(headers, extensions),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string(),
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(capture(&parts.method, &parts.uri, &parts.headers, &parts.extensions))
    }
}


// End of file: /src/utils/request_meta.rs
