// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client network address as recorded on access attempts.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

use crate::state::AppState;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const UNKNOWN_ADDR: &str = "unknown";

/// Peer address, or the first `X-Forwarded-For` hop when the deployment
/// trusts its proxy. Never rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr(pub String);

impl FromRequestParts<AppState> for ClientAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(resolve(&parts.headers, peer, state.config.trust_forwarded_for))
    }
}

fn resolve(headers: &HeaderMap, peer: Option<String>, trust_forwarded_for: bool) -> ClientAddr {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(hop) = forwarded {
            return ClientAddr(hop.to_string());
        }
    }
    ClientAddr(peer.unwrap_or_else(|| UNKNOWN_ADDR.to_string()))
}
