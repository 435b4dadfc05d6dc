//! Session Manager - authentication state machine
//!
//! Drives `idle → authenticating → authenticated | unauthenticated | error`
//! on top of the request executor, the token store and the role policy.
//! Concurrent `authenticate()` calls share one in-flight run; every state
//! change is published through a `watch` channel.

use crate::executor::{RequestExecutor, RequestOptions};
use crate::navigator::{Navigator, TracingNavigator};
use crate::normalize::{extract_token_pair, extract_user_id, normalize_role_status, RoleStatusInfo};
use crate::policy::RoleAuthorizationPolicy;
use crate::token_store::{FileTokenStore, TokenStore};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tradelink_core::{
    performance::measure_async, AuthState, ClientConfig, ErrorContext, RedirectTarget,
    RequiredAction, RoleStatus, TradelinkError, TradelinkResult, UserRole,
};

/// Immutable view of the session published to observers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: AuthState,
    pub user_role: Option<UserRole>,
    pub role_status: Option<RoleStatus>,
    /// Message of the last unrecovered failure
    pub error: Option<String>,
    /// Last decision taken for the current page, if any
    pub required_action: Option<RequiredAction>,
    /// Requirement of the page currently using the session
    pub policy: RoleAuthorizationPolicy,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Nothing decided yet, or authenticated with a status this client does
    /// not recognise
    pub fn loading(&self) -> bool {
        match self.state {
            AuthState::Idle | AuthState::Authenticating => true,
            AuthState::Authenticated => self.role_status.is_none(),
            AuthState::Unauthenticated | AuthState::Error => false,
        }
    }
}

type AuthFlight = Shared<BoxFuture<'static, SessionSnapshot>>;

#[derive(Default)]
struct FlightState {
    /// Shared future of the running authentication, if any
    in_flight: Option<AuthFlight>,
    /// Set once a run completed; cleared by logout and OTP login
    has_authenticated: bool,
    /// Role and status come from a successful role-status query
    resolved: bool,
    /// Bumped whenever the session is reset; runs of older generations are stale
    generation: u64,
}

impl FlightState {
    fn reset(&mut self) {
        self.generation += 1;
        self.in_flight = None;
        self.has_authenticated = false;
        self.resolved = false;
    }
}

struct SessionInner {
    executor: RequestExecutor,
    store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<SessionSnapshot>,
    flight: Mutex<FlightState>,
    alive: AtomicBool,
}

fn refresh_failed(message: &str, source: Option<TradelinkError>) -> TradelinkError {
    TradelinkError::RefreshFailed {
        message: message.to_string(),
        source: source.map(Box::new),
        context: ErrorContext::new("session_manager")
            .with_operation("refresh")
            .with_suggestion("Sign in again"),
    }
}

impl SessionInner {
    fn lock_flight(&self) -> MutexGuard<'_, FlightState> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Apply a state change unless the run is stale or the manager is defunct
    fn update(&self, generation: u64, apply: impl FnOnce(&mut SessionSnapshot)) -> bool {
        let flight = self.lock_flight();
        if !self.is_alive() || flight.generation != generation {
            debug!(generation = generation, "Skipping stale session update");
            return false;
        }
        self.state.send_modify(apply);
        true
    }

    fn navigate(&self, target: RedirectTarget) {
        let route = self.executor.config().route_for(target);
        self.navigator.navigate(target, route);
    }

    async fn run_authentication(self: Arc<Self>, generation: u64) -> SessionSnapshot {
        self.update(generation, |s| {
            s.state = AuthState::Authenticating;
            s.error = None;
            s.required_action = None;
        });

        let access = self
            .store
            .get()
            .access_token
            .filter(|token| !token.is_empty());

        match access {
            None => {
                info!("No access token stored, login required");
                let applied = self.update(generation, |s| {
                    s.state = AuthState::Unauthenticated;
                    s.user_role = None;
                    s.role_status = None;
                    s.required_action = Some(RequiredAction::Redirect(RedirectTarget::Login));
                });
                if applied {
                    self.navigate(RedirectTarget::Login);
                }
            }
            Some(access) => {
                let outcome = match self.query_role_status(&access).await {
                    Err(e) if e.is_unauthorized() => {
                        warn!(
                            status = ?e.status(),
                            error = %e,
                            "Access token rejected, refreshing"
                        );
                        self.refresh_and_retry(generation).await
                    }
                    other => other,
                };

                match outcome {
                    Ok(info) => self.resolve(generation, info),
                    Err(e) => self.fail(generation, e),
                }
            }
        }

        {
            let mut flight = self.lock_flight();
            if flight.generation == generation {
                flight.in_flight = None;
                flight.has_authenticated = true;
            }
        }

        let snapshot = self.state.borrow().clone();
        snapshot
    }

    async fn query_role_status(&self, access: &str) -> TradelinkResult<RoleStatusInfo> {
        let endpoint = &self.executor.config().endpoints.role_status;
        let body = self
            .executor
            .execute(endpoint, RequestOptions::get().bearer(access))
            .await?;

        let info = normalize_role_status(&body);
        debug!(role = ?info.role, status = ?info.status, "Role status resolved");
        Ok(info)
    }

    /// The single refresh cycle allowed per authentication run
    async fn refresh_and_retry(&self, generation: u64) -> TradelinkResult<RoleStatusInfo> {
        let refresh = self
            .store
            .get()
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| refresh_failed("No refresh token stored", None))?;

        let endpoint = &self.executor.config().endpoints.refresh;
        let body = self
            .executor
            .execute(
                endpoint,
                RequestOptions::post_json(json!({ "refresh": refresh })).bearer(&refresh),
            )
            .await
            .map_err(|e| refresh_failed("Refresh request failed", Some(e)))?;

        let pair = extract_token_pair(&body).ok_or_else(|| {
            refresh_failed("Refresh response did not contain an access token", None)
        })?;

        let refresh = pair.refresh.unwrap_or(refresh);
        {
            let flight = self.lock_flight();
            if !self.is_alive() || flight.generation != generation {
                return Err(TradelinkError::Internal {
                    message: "Session was reset during authentication".to_string(),
                    context: ErrorContext::new("session_manager").with_operation("refresh"),
                });
            }
            self.store.set(&pair.access, &refresh)?;
        }
        info!("Access token refreshed");

        self.query_role_status(&pair.access)
            .await
            .map_err(|e| refresh_failed("Role status query failed after refresh", Some(e)))
    }

    fn resolve(&self, generation: u64, info: RoleStatusInfo) {
        {
            let mut flight = self.lock_flight();
            if !self.is_alive() || flight.generation != generation {
                return;
            }
            flight.resolved = true;
            self.state.send_modify(|s| {
                s.state = AuthState::Authenticated;
                s.user_role = info.role;
                s.role_status = info.status;
                s.error = None;
            });
        }

        info!(role = ?info.role, status = ?info.status, "Session authenticated");
        self.apply_guard(true);
    }

    fn fail(&self, generation: u64, error: TradelinkError) {
        error.log();
        let message = error.to_string();

        {
            let flight = self.lock_flight();
            if !self.is_alive() || flight.generation != generation {
                return;
            }
            if let Err(e) = self.store.clear() {
                e.log();
            }
            self.state.send_modify(|s| {
                s.state = AuthState::Error;
                s.user_role = None;
                s.role_status = None;
                s.error = Some(message);
                s.required_action = Some(RequiredAction::Redirect(RedirectTarget::Login));
            });
        }

        self.navigate(RedirectTarget::Login);
    }

    /// Re-run the role policy against the cached role and status
    ///
    /// A redirect is handed to the navigator when the decision changed or
    /// `renotify` is set (the page requirement changed).
    fn apply_guard(&self, renotify: bool) -> Option<RequiredAction> {
        let (action, changed) = {
            let flight = self.lock_flight();
            if !self.is_alive() || !flight.resolved {
                return None;
            }

            let current = self.state.borrow().clone();
            let action = current
                .policy
                .decide(current.user_role, current.role_status);
            let changed = current.required_action != Some(action);

            self.state.send_modify(|s| {
                s.required_action = Some(action);
                s.state = if action.is_allowed() {
                    AuthState::Authenticated
                } else {
                    AuthState::Unauthenticated
                };
            });

            (action, changed)
        };

        if let RequiredAction::Redirect(target) = action {
            if changed || renotify {
                info!(redirect = %target, "Role requirement not met");
                self.navigate(target);
            }
        }

        Some(action)
    }
}

/// Authentication state machine shared by every page of a client
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    /// Create a session manager
    pub fn new(
        executor: RequestExecutor,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());

        Self {
            inner: Arc::new(SessionInner {
                executor,
                store,
                navigator,
                state,
                flight: Mutex::new(FlightState::default()),
                alive: AtomicBool::new(true),
            }),
        }
    }

    /// Session manager over `reqwest`, the on-disk token store and a logging
    /// navigator
    pub fn from_config(config: ClientConfig) -> TradelinkResult<Self> {
        config.validate()?;
        let store = FileTokenStore::new(config.token_file_path()?);
        let executor = RequestExecutor::new(config)?;

        Ok(Self::new(
            executor,
            Arc::new(store),
            Arc::new(TracingNavigator),
        ))
    }

    /// Authenticate the stored session
    ///
    /// Concurrent calls join the running authentication instead of issuing
    /// their own requests. Once a run has completed, later calls only
    /// re-check the role policy until [`logout`](Self::logout) or
    /// [`verify_otp`](Self::verify_otp) resets the session.
    pub async fn authenticate(&self) -> SessionSnapshot {
        let flight = {
            let mut flight = self.inner.lock_flight();
            if flight.has_authenticated {
                None
            } else if let Some(in_flight) = &flight.in_flight {
                debug!("Joining in-flight authentication");
                Some(in_flight.clone())
            } else {
                let generation = flight.generation;
                let run = Arc::clone(&self.inner)
                    .run_authentication(generation)
                    .boxed()
                    .shared();
                flight.in_flight = Some(run.clone());
                Some(run)
            }
        };

        match flight {
            Some(run) => measure_async("authenticate", run).await,
            None => {
                self.inner.apply_guard(false);
                self.snapshot()
            }
        }
    }

    /// Change the requirement of the page using the session
    ///
    /// Re-evaluates the role policy immediately when a role status is cached.
    pub fn set_required_role(&self, policy: RoleAuthorizationPolicy) -> Option<RequiredAction> {
        if !self.inner.is_alive() {
            return None;
        }

        let changed = self.inner.state.send_if_modified(|s| {
            if s.policy == policy {
                false
            } else {
                s.policy = policy;
                true
            }
        });

        if changed {
            self.inner.apply_guard(true)
        } else {
            self.snapshot().required_action
        }
    }

    /// Clear the session and send the user to the login page
    pub fn logout(&self) {
        info!("Logging out");
        self.inner.lock_flight().reset();

        if let Err(e) = self.inner.store.clear() {
            e.log();
        }

        if !self.inner.is_alive() {
            return;
        }

        self.inner.state.send_modify(|s| {
            s.state = AuthState::Unauthenticated;
            s.user_role = None;
            s.role_status = None;
            s.error = None;
            s.required_action = Some(RequiredAction::Redirect(RedirectTarget::Login));
        });
        self.inner.navigate(RedirectTarget::Login);
    }

    /// Ask the backend to send a one-time password
    pub async fn request_otp(&self, phone: &str) -> TradelinkResult<Value> {
        let endpoint = &self.inner.executor.config().endpoints.otp_request;
        self.inner
            .executor
            .execute(endpoint, RequestOptions::post_json(json!({ "phone": phone })))
            .await
    }

    /// Exchange a one-time password for a session
    ///
    /// Stores the token pair and user id; the next `authenticate()` performs
    /// the full round trip.
    pub async fn verify_otp(&self, phone: &str, code: &str) -> TradelinkResult<()> {
        let endpoint = &self.inner.executor.config().endpoints.otp_verify;
        let body = self
            .inner
            .executor
            .execute(
                endpoint,
                RequestOptions::post_json(json!({ "phone": phone, "code": code })),
            )
            .await?;

        let (access, refresh) = extract_token_pair(&body)
            .and_then(|pair| pair.refresh.map(|refresh| (pair.access, refresh)))
            .ok_or_else(|| TradelinkError::Internal {
                message: "Login response did not contain a token pair".to_string(),
                context: ErrorContext::new("session_manager").with_operation("verify_otp"),
            })?;

        {
            let mut flight = self.inner.lock_flight();
            flight.reset();
            self.inner.store.set(&access, &refresh)?;
            if let Some(user_id) = extract_user_id(&body) {
                self.inner.store.set_user_id(&user_id)?;
            }
        }

        if self.inner.is_alive() {
            self.inner.state.send_modify(|s| {
                *s = SessionSnapshot {
                    policy: s.policy,
                    ..Default::default()
                };
            });
        }

        info!("One-time password verified, session stored");
        Ok(())
    }

    /// Call a feature endpoint with the current bearer token
    pub async fn authorized_request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> TradelinkResult<Value> {
        let token = self.get_token().ok_or_else(|| TradelinkError::AuthExpired {
            message: "No access token stored".to_string(),
            context: ErrorContext::new("session_manager")
                .with_operation("authorized_request")
                .with_suggestion("Authenticate before calling feature endpoints"),
        })?;

        self.inner
            .executor
            .execute(endpoint, options.bearer(&token))
            .await
    }

    /// Mark the manager defunct; pending runs stop mutating state
    pub fn shutdown(&self) {
        debug!("Session manager shut down");
        self.inner.alive.store(false, Ordering::SeqCst);
    }

    pub fn get_token(&self) -> Option<String> {
        self.inner
            .store
            .get()
            .access_token
            .filter(|token| !token.is_empty())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Observe state changes, e.g. the outcome of a run started elsewhere
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn user_role(&self) -> Option<UserRole> {
        self.inner.state.borrow().user_role
    }

    pub fn role_status(&self) -> Option<RoleStatus> {
        self.inner.state.borrow().role_status
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading()
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.borrow().error.clone()
    }
}
