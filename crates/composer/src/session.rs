use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

/// Opaque credential proving an authenticated session.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Returns `None` for blank input so an empty setting never counts as signed in.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("SessionToken(<redacted>)")
    }
}

/// Answers whether a usable credential is present right now.
pub trait SessionSource: Send + Sync {
    fn token(&self) -> Option<SessionToken>;
}

/// Lock-free holder for the current session, swapped on sign-in and sign-out.
#[derive(Default)]
pub struct SessionSlot {
    current: ArcSwapOption<SessionToken>,
}

impl SessionSlot {
    pub fn new(token: Option<SessionToken>) -> Self {
        Self {
            current: ArcSwapOption::new(token.map(Arc::new)),
        }
    }

    pub fn sign_in(&self, token: SessionToken) {
        self.current.store(Some(Arc::new(token)));
        tracing::info!("session credential installed");
    }

    pub fn sign_out(&self) {
        if self.current.swap(None).is_some() {
            tracing::info!("session credential cleared");
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.load().is_some()
    }
}

impl SessionSource for SessionSlot {
    fn token(&self) -> Option<SessionToken> {
        self.current.load_full().map(|token| token.as_ref().clone())
    }
}
