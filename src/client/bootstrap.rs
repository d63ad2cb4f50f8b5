use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;
use tracing::debug;

use super::{ProfileError, ProfileSource};
use crate::auth::repo_types::User;

pub const LOGIN_PATH: &str = "/login";

/// Paths rendered without asking the backend.
const PUBLIC_PATHS: &[&str] = &[LOGIN_PATH, "/register", "/"];

/// Paths that fall back to the login view without a known user.
const PROTECTED_PATHS: &[&str] = &["/dashboard"];

#[derive(Debug, Clone, PartialEq)]
pub struct AuthSnapshot {
    pub user: Option<User>,
    pub loading: bool,
    pub error: Option<String>,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
            error: None,
        }
    }
}

/// What the caller should do after a navigation was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Stay,
    Redirect(&'static str),
    /// A newer navigation started before this one's check finished; its
    /// result was dropped.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteView {
    Requested,
    Login,
}

pub struct AuthBootstrap<P> {
    source: P,
    state: watch::Sender<AuthSnapshot>,
    generation: AtomicU64,
}

impl<P: ProfileSource> AuthBootstrap<P> {
    pub fn new(source: P) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        Self {
            source,
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.state.borrow().clone()
    }

    /// Re-establishes the session for `path`.
    pub async fn navigate(&self, path: &str) -> Navigation {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if PUBLIC_PATHS.contains(&path) {
            self.state.send_modify(|s| s.loading = false);
            return Navigation::Stay;
        }

        let result = self.source.fetch_profile().await;

        // Checked under the channel lock: a newer check's result is never
        // overwritten by this one.
        let mut next = Navigation::Superseded;
        self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != ticket {
                return false;
            }
            next = Navigation::Stay;
            s.loading = false;
            match result {
                Ok(user) => {
                    s.user = Some(user);
                    s.error = None;
                }
                Err(ProfileError::Unauthorized) => {
                    s.user = None;
                    if path != LOGIN_PATH {
                        next = Navigation::Redirect(LOGIN_PATH);
                    }
                }
                Err(e) => {
                    s.user = None;
                    s.error = Some(e.to_string());
                }
            }
            true
        });
        if next == Navigation::Superseded {
            debug!(path, "auth check superseded");
        }
        next
    }

    pub fn guard(&self, path: &str) -> RouteView {
        if PROTECTED_PATHS.contains(&path) && self.state.borrow().user.is_none() {
            RouteView::Login
        } else {
            RouteView::Requested
        }
    }
}
