//! Authentication gate for protected navigation targets.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use shared::domain::AuthSession;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::form_urlencoded;

use crate::{
    bridge::CommandBridge,
    observable::{Observable, SubscriptionId},
};

/// Where the gate sends the user after a rejected navigation.
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// Navigator that only remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<String> {
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<String> {
        self.history().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        info!(target, "auth: navigating");
        self.visited
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Pending,
    Authenticated,
    Unauthenticated,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Authenticated => "authenticated",
            Self::Unauthenticated => "unauthenticated",
        };
        f.write_str(label)
    }
}

/// Outcome of gating one navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthResolution {
    pub target: String,
    pub state: AuthState,
    pub session: Option<AuthSession>,
    pub redirect: Option<String>,
}

impl AuthResolution {
    fn pending(target: &str) -> Self {
        Self {
            target: target.to_string(),
            ..Self::default()
        }
    }

    fn authenticated(target: &str, session: AuthSession) -> Self {
        Self {
            target: target.to_string(),
            state: AuthState::Authenticated,
            session: Some(session),
            redirect: None,
        }
    }

    fn unauthenticated(target: &str, redirect: String) -> Self {
        Self {
            target: target.to_string(),
            state: AuthState::Unauthenticated,
            session: None,
            redirect: Some(redirect),
        }
    }

    /// Protected content renders only once the session is known.
    pub fn may_render(&self) -> bool {
        self.state == AuthState::Authenticated
    }
}

/// `{entry_path}?redirect={key}` with the key's leading slashes removed.
pub fn redirect_target(entry_path: &str, key: &str) -> String {
    let key = encode_component(key.trim_start_matches('/'));
    format!("{entry_path}?redirect={key}")
}

/// URI-component encoding: a space becomes `%20` and `!~'()` stay literal.
fn encode_component(raw: &str) -> String {
    // form_urlencoded escapes a literal `+` and `%`, so every `+` it emits is
    // a space and every `%XX` below is one of its own escapes.
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace("%21", "!")
        .replace("%27", "'")
        .replace("%28", "(")
        .replace("%29", ")")
        .replace("%7E", "~")
}

/// Reads the `redirect` parameter back out of a redirect URL.
pub fn redirect_param(url: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == "redirect")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Destination after a successful sign-in: the redirect as an absolute path,
/// or `/`.
pub fn return_path(redirect: Option<&str>) -> String {
    match redirect.map(|redirect| redirect.trim_start_matches('/')) {
        Some(path) if !path.is_empty() => format!("/{path}"),
        _ => "/".to_string(),
    }
}

struct Memo {
    key: String,
    cell: Arc<OnceCell<AuthResolution>>,
}

/// Decides whether a navigation target may render.
///
/// Resolution is memoized for the most recent key only: asking again for the
/// same key reuses the first answer (concurrent callers share one bridge
/// round-trip), while a new key discards it. An answer that arrives after the
/// key moved on is returned to its caller but never published and never
/// triggers a redirect.
pub struct AuthGate {
    bridge: Arc<dyn CommandBridge>,
    navigator: Arc<dyn Navigator>,
    entry_path: String,
    memo: Mutex<Option<Memo>>,
    resolution: Observable<AuthResolution>,
}

impl AuthGate {
    pub fn new(
        bridge: Arc<dyn CommandBridge>,
        navigator: Arc<dyn Navigator>,
        entry_path: impl Into<String>,
    ) -> Self {
        Self {
            bridge,
            navigator,
            entry_path: entry_path.into(),
            memo: Mutex::new(None),
            resolution: Observable::default(),
        }
    }

    fn memo(&self) -> MutexGuard<'_, Option<Memo>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, cell: &Arc<OnceCell<AuthResolution>>) -> bool {
        self.memo()
            .as_ref()
            .is_some_and(|memo| Arc::ptr_eq(&memo.cell, cell))
    }

    pub fn current(&self) -> AuthResolution {
        self.resolution.get()
    }

    pub fn subscribe(
        &self,
        subscriber: impl Fn(&AuthResolution) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.resolution.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.resolution.unsubscribe(id)
    }

    pub async fn resolve(&self, key: &str) -> AuthResolution {
        let (cell, fresh) = {
            let mut memo = self.memo();
            match memo.as_ref() {
                Some(existing) if existing.key == key => (Arc::clone(&existing.cell), false),
                _ => {
                    let cell = Arc::new(OnceCell::new());
                    *memo = Some(Memo {
                        key: key.to_string(),
                        cell: Arc::clone(&cell),
                    });
                    (cell, true)
                }
            }
        };
        if fresh {
            debug!(key, "auth: new key, resolving");
            self.resolution
                .set_if(AuthResolution::pending(key), |_| self.is_current(&cell));
        }

        cell.get_or_init(|| async {
            let resolution = self.evaluate(key).await;
            self.publish(&cell, &resolution);
            resolution
        })
        .await
        .clone()
    }

    fn publish(&self, cell: &Arc<OnceCell<AuthResolution>>, resolution: &AuthResolution) {
        let published = self
            .resolution
            .set_if(resolution.clone(), |_| self.is_current(cell));
        if !published {
            debug!(key = %resolution.target, "auth: dropping resolution for stale key");
            return;
        }
        if let Some(redirect) = &resolution.redirect {
            self.navigator.navigate(redirect);
        }
    }

    async fn evaluate(&self, key: &str) -> AuthResolution {
        let redirect = || redirect_target(&self.entry_path, key);

        match self.bridge.verify_token().await {
            Ok(result) if result.is_authorized() => {}
            Ok(result) => {
                info!(key, ?result, "auth: not authenticated, redirecting");
                return AuthResolution::unauthenticated(key, redirect());
            }
            Err(err) => {
                warn!(key, "auth: token verification failed: {err:#}");
                return AuthResolution::unauthenticated(key, redirect());
            }
        }

        match self.bridge.my_info().await.map(|info| info.into_session()) {
            Ok(Some(session)) => {
                info!(key, user_id = %session.id, "auth: resolved authenticated");
                AuthResolution::authenticated(key, session)
            }
            Ok(None) => {
                warn!(key, "auth: identity lookup failed after verification");
                AuthResolution::unauthenticated(key, redirect())
            }
            Err(err) => {
                warn!(key, "auth: identity lookup errored: {err:#}");
                AuthResolution::unauthenticated(key, redirect())
            }
        }
    }

    /// Forgets the memoized answer so the next `resolve` queries again.
    pub fn invalidate(&self) {
        let Some(memo) = self.memo().take() else {
            return;
        };
        debug!(key = %memo.key, "auth: invalidated");
        self.resolution.set(AuthResolution::pending(&memo.key));
    }

    /// Invalidates and resolves the last key again, e.g. after a logout.
    pub async fn refresh(&self) -> Option<AuthResolution> {
        let key = self.memo().take().map(|memo| memo.key)?;
        self.resolution.set(AuthResolution::pending(&key));
        Some(self.resolve(&key).await)
    }
}

#[cfg(test)]
#[path = "tests/auth_gate_tests.rs"]
mod tests;
