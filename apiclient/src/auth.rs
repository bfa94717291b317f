// SPDX-FileCopyrightText: 2026 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Authentication plumbing for the API client.
//!
//! The client itself does not manage sessions; it asks an injected provider
//! for the current bearer token on every request. The provider is typically
//! backed by the durable client store, with an in-memory cache.

use std::sync::Arc;

use async_trait::async_trait;

/// Source of the current bearer token.
///
/// Returning `None` sends the request unauthenticated.
#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    async fn auth_token(&self) -> Option<String>;
}

/// Provider for unauthenticated clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuth;

#[async_trait]
impl AuthTokenProvider for NoAuth {
    async fn auth_token(&self) -> Option<String> {
        None
    }
}

/// Fixed-token provider, mainly useful in tests.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AuthTokenProvider for StaticToken {
    async fn auth_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Callback invoked when the server answers 401.
///
/// Host apps use this to drop their cached session and route to the login
/// screen. The callback must not block.
pub type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;
