use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::api::{
    ApiRequest, ApiResponse, GatewayApi, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REFRESH_PATH,
    REGISTER_PATH,
};
use super::error::ClientError;
use super::policy::{RenewalPolicy, plan_renewal};
use crate::types::{Credentials, Profile, Registration};
use crate::validation;

type RenewalFuture = Shared<BoxFuture<'static, Result<(), ClientError>>>;

/// Client-side view of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Startup, before the first profile check finished.
    Loading,
    Unauthenticated,
    /// `exp` is the access-token expiry in epoch milliseconds, when known.
    Authenticated { user: Value, exp: Option<i64> },
}

impl SessionState {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    #[must_use]
    pub fn user(&self) -> Option<&Value> {
        match self {
            Self::Authenticated { user, .. } => Some(user),
            _ => None,
        }
    }
}

#[derive(Default)]
struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    fn cancel(&mut self) {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[derive(Default)]
struct RenewalSlot {
    /// Renewal in flight, tagged with the epoch it started in.
    inflight: Option<(u64, RenewalFuture)>,
    last: Option<(Instant, Result<(), ClientError>)>,
}

impl RenewalSlot {
    fn clear_inflight(&mut self, epoch: u64) {
        if self.inflight.as_ref().is_some_and(|(started, _)| *started == epoch) {
            self.inflight = None;
        }
    }
}

struct Inner<A> {
    api: A,
    policy: RenewalPolicy,
    state: watch::Sender<SessionState>,
    /// Bumped when a session starts or ends; work begun under an older
    /// epoch never writes state.
    epoch: AtomicU64,
    timer: Mutex<TimerSlot>,
    renewal: Mutex<RenewalSlot>,
}

impl<A> Drop for Inner<A> {
    fn drop(&mut self) {
        self.timer
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

impl<A: GatewayApi> Inner<A> {
    async fn fetch_profile(&self) -> Result<Profile, ClientError> {
        let body = self.api.send(ApiRequest::get(ME_PATH)).await?.into_result()?;
        Ok(serde_json::from_value(body)?)
    }

    /// Starts a new epoch: cancels the timer and forgets both the last and
    /// the in-flight renewal.
    fn next_epoch(&self) -> u64 {
        let epoch = {
            let mut timer = lock(&self.timer);
            timer.cancel();
            self.epoch.fetch_add(1, Ordering::SeqCst) + 1
        };
        let mut slot = lock(&self.renewal);
        slot.last = None;
        slot.inflight = None;
        epoch
    }

    /// Publishes an authenticated state and schedules the next renewal,
    /// unless `epoch` has been superseded.
    fn apply_profile(self: &Arc<Self>, epoch: u64, profile: Profile) -> bool {
        let mut timer = lock(&self.timer);
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!("Discarding profile from a superseded session");
            return false;
        }

        let exp = profile.exp;
        self.state.send_replace(SessionState::Authenticated {
            user: profile.user,
            exp,
        });
        self.schedule_locked(&mut timer, exp);
        true
    }

    fn end_session(&self, epoch: u64) {
        let mut timer = lock(&self.timer);
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return;
        }
        timer.cancel();
        self.state.send_replace(SessionState::Unauthenticated);
    }

    fn schedule_locked(self: &Arc<Self>, timer: &mut TimerSlot, exp: Option<i64>) {
        let delay = plan_renewal(exp, now_millis(), &self.policy).delay();
        self.arm_locked(timer, delay);
    }

    fn arm_locked(self: &Arc<Self>, timer: &mut TimerSlot, delay: Duration) {
        timer.cancel();
        let generation = timer.generation;

        tracing::debug!(delay_secs = delay.as_secs(), "Token renewal scheduled");
        timer.handle = Some(tokio::spawn(Self::fire_after(
            Arc::downgrade(self),
            generation,
            delay,
        )));
    }

    async fn fire_after(weak: Weak<Self>, generation: u64, delay: Duration) {
        tokio::time::sleep(delay).await;
        let Some(inner) = weak.upgrade() else {
            return;
        };
        {
            let mut timer = lock(&inner.timer);
            if timer.generation != generation {
                return;
            }
            // Detach, so rescheduling after this renewal does not abort us.
            timer.handle = None;
        }

        tracing::debug!("Renewal timer fired");
        match inner.renew().await {
            Ok(()) => inner.rearm_if_idle(generation),
            Err(e) => tracing::debug!(error = %e, "Scheduled renewal failed"),
        }
    }

    /// Re-arms the timer when the renewal it triggered did not: the outcome
    /// came from the debounce record, or a renewal shared with another
    /// caller had already applied its profile.
    fn rearm_if_idle(self: &Arc<Self>, generation: u64) {
        let mut timer = lock(&self.timer);
        if timer.generation != generation {
            return;
        }
        let SessionState::Authenticated { exp, .. } = *self.state.borrow() else {
            return;
        };
        // Not sooner than the debounce window, which would answer again
        // without renewing.
        let delay = plan_renewal(exp, now_millis(), &self.policy)
            .delay()
            .max(self.policy.debounce);
        self.arm_locked(&mut timer, delay);
    }

    /// Single-flight renewal; every concurrent caller gets the same outcome.
    async fn renew(self: &Arc<Self>) -> Result<(), ClientError> {
        let renewal = {
            let mut slot = lock(&self.renewal);
            if let Some((finished, outcome)) = &slot.last {
                if finished.elapsed() < self.policy.debounce {
                    tracing::debug!(ok = outcome.is_ok(), "Renewal debounced; reusing last outcome");
                    return outcome.clone();
                }
            }

            let epoch = self.epoch.load(Ordering::SeqCst);
            let joined = slot
                .inflight
                .as_ref()
                .filter(|(started, _)| *started == epoch)
                .map(|(_, renewal)| renewal.clone());
            match joined {
                Some(renewal) => renewal,
                None => {
                    let task = tokio::spawn(Arc::clone(self).run_renewal(epoch));
                    let weak = Arc::downgrade(self);
                    let renewal = async move {
                        task.await.unwrap_or_else(|e| {
                            if let Some(inner) = weak.upgrade() {
                                lock(&inner.renewal).clear_inflight(epoch);
                            }
                            Err(ClientError::Aborted(e.to_string()))
                        })
                    }
                    .boxed()
                    .shared();
                    slot.inflight = Some((epoch, renewal.clone()));
                    renewal
                }
            }
        };

        renewal.await
    }

    async fn run_renewal(self: Arc<Self>, epoch: u64) -> Result<(), ClientError> {
        let outcome = self.refresh_and_load(epoch).await;
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "Session renewal failed");
            self.end_session(epoch);
        }

        let mut slot = lock(&self.renewal);
        slot.clear_inflight(epoch);
        if self.epoch.load(Ordering::SeqCst) == epoch {
            slot.last = Some((Instant::now(), outcome.clone()));
        }
        outcome
    }

    async fn refresh_and_load(self: &Arc<Self>, epoch: u64) -> Result<(), ClientError> {
        self.api
            .send(ApiRequest::post(REFRESH_PATH))
            .await?
            .into_result()?;
        let profile = self.fetch_profile().await?;
        self.apply_profile(epoch, profile);
        Ok(())
    }
}

/// Keeps a browser-style session alive against the session gateway.
///
/// Publishes [`SessionState`] through a watch channel; the manager is the
/// only writer. Renews the access token shortly before it expires, and once
/// on demand when a request comes back `401`. Cloning is cheap and clones
/// share the session. Dropping the last clone cancels the renewal timer.
///
/// # Example
///
/// ```rust,ignore
/// let api = HttpGateway::new(&"http://localhost:3000".parse()?)?;
/// let session = SessionManager::new(api);
/// session.init().await;
/// session.login(&Credentials::new("ana@gov.co", "correcta123")).await?;
/// let page = session.list_documents(PageRequest::default()).await?;
/// ```
pub struct SessionManager<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for SessionManager<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: GatewayApi> SessionManager<A> {
    #[must_use]
    pub fn new(api: A) -> Self {
        Self::with_policy(api, RenewalPolicy::default())
    }

    #[must_use]
    pub fn with_policy(api: A, policy: RenewalPolicy) -> Self {
        let (state, _) = watch::channel(SessionState::Loading);
        Self {
            inner: Arc::new(Inner {
                api,
                policy,
                state,
                epoch: AtomicU64::new(0),
                timer: Mutex::new(TimerSlot::default()),
                renewal: Mutex::new(RenewalSlot::default()),
            }),
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    #[must_use]
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    #[must_use]
    pub fn policy(&self) -> &RenewalPolicy {
        &self.inner.policy
    }

    /// Resolves the startup state from the gateway's profile endpoint.
    pub async fn init(&self) -> SessionState {
        let epoch = self.inner.epoch.load(Ordering::SeqCst);
        match self.inner.fetch_profile().await {
            Ok(profile) => {
                self.inner.apply_profile(epoch, profile);
            }
            Err(e) => {
                tracing::debug!(error = %e, "No active session");
                self.inner.end_session(epoch);
            }
        }
        self.state()
    }

    /// Logs in and loads the profile. Returns the gateway's login body.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] before any request when the form is
    /// invalid; otherwise the gateway's rejection or a transport error.
    pub async fn login(&self, credentials: &Credentials) -> Result<Value, ClientError> {
        validation::validate_login_form(&credentials.email, &credentials.password)?;

        let request = ApiRequest::post(LOGIN_PATH).with_json(json!({
            "email": credentials.email,
            "password": credentials.password,
        }));
        let body = self.inner.api.send(request).await?.into_result()?;
        let profile = self.inner.fetch_profile().await?;

        let epoch = self.inner.next_epoch();
        self.inner.apply_profile(epoch, profile);
        tracing::info!("Logged in");
        Ok(body)
    }

    /// Creates an account. The session is unchanged; log in afterwards.
    ///
    /// # Errors
    ///
    /// See [`login`](Self::login).
    pub async fn register(&self, registration: &Registration) -> Result<Value, ClientError> {
        validation::validate_register_form(
            &registration.email,
            &registration.password,
            &registration.name,
            registration.id_citizen,
        )?;

        let request = ApiRequest::post(REGISTER_PATH).with_json(serde_json::to_value(registration)?);
        self.inner.api.send(request).await?.into_result()
    }

    /// Ends the session. The state becomes unauthenticated even when the
    /// gateway call fails; that failure is still returned.
    ///
    /// # Errors
    ///
    /// The gateway's rejection or a transport error.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.inner.next_epoch();

        let result = match self.inner.api.send(ApiRequest::post(LOGOUT_PATH)).await {
            Ok(response) => response.into_result().map(drop),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            tracing::warn!(error = %e, "Gateway logout failed; session cleared locally");
        }

        self.inner.state.send_replace(SessionState::Unauthenticated);
        result
    }

    /// Renews the access token now, sharing an in-flight renewal if any.
    ///
    /// # Errors
    ///
    /// The real outcome of the (possibly shared or recently finished)
    /// renewal. On failure the state is already unauthenticated.
    pub async fn renew(&self) -> Result<(), ClientError> {
        self.inner.renew().await
    }

    /// Sends `request`; on `401` renews once and replays it.
    ///
    /// When the renewal fails the original `401` response is returned.
    ///
    /// # Errors
    ///
    /// Only transport errors; HTTP errors come back as responses.
    pub async fn fetch_with_refresh(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let response = self.inner.api.send(request.clone()).await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        match self.renew().await {
            Ok(()) => self.inner.api.send(request).await,
            Err(e) => {
                tracing::debug!(error = %e, path = %request.path, "Renewal after 401 failed");
                Ok(response)
            }
        }
    }
}

#[cfg(test)]
pub(super) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize};

    use super::*;
    use crate::session::api::{DOCUMENTS_PATH, RequestBody};

    pub(in crate::session) const PASSWORD: &str = "correcta123";

    #[derive(Default)]
    pub(in crate::session) struct FakeState {
        pub authenticated: AtomicBool,
        pub stale: AtomicBool,
        pub refresh_fails: AtomicBool,
        pub logout_fails: AtomicBool,
        /// Expiry reported by `/me`; 0 means unknown.
        pub exp_ms: AtomicI64,
        /// When non-zero, `/me` reports an expiry this far from now instead.
        pub ttl_ms: AtomicI64,
        pub refreshes: AtomicUsize,
        pub document_calls: AtomicUsize,
        pub requests: AtomicUsize,
        pub last_request: Mutex<Option<ApiRequest>>,
        pub documents_body: Mutex<Value>,
    }

    /// In-memory gateway: a session flag stands in for the cookie jar.
    #[derive(Clone, Default)]
    pub(in crate::session) struct FakeApi(pub Arc<FakeState>);

    fn reply(status: StatusCode, body: Value) -> Result<ApiResponse, ClientError> {
        Ok(ApiResponse { status, body })
    }

    impl GatewayApi for FakeApi {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
            let s = &self.0;
            s.requests.fetch_add(1, Ordering::SeqCst);
            *lock(&s.last_request) = Some(request.clone());

            let path = request.path.split('?').next().unwrap_or_default().to_owned();
            match (request.method.as_str(), path.as_str()) {
                ("POST", LOGIN_PATH) => {
                    let RequestBody::Json(body) = &request.body else {
                        return reply(StatusCode::BAD_REQUEST, json!({"code": "VALIDATION_ERROR"}));
                    };
                    if body["password"] != PASSWORD {
                        return reply(
                            StatusCode::UNAUTHORIZED,
                            json!({"error": "Invalid credentials", "code": "INVALID_CREDENTIALS"}),
                        );
                    }
                    s.authenticated.store(true, Ordering::SeqCst);
                    reply(StatusCode::OK, json!({"access_token": "a1", "token_type": "Bearer"}))
                }
                ("GET", ME_PATH) => {
                    if !s.authenticated.load(Ordering::SeqCst) {
                        return reply(StatusCode::UNAUTHORIZED, json!({"code": "INVALID_TOKEN"}));
                    }
                    let ttl = s.ttl_ms.load(Ordering::SeqCst);
                    let exp = if ttl == 0 {
                        s.exp_ms.load(Ordering::SeqCst)
                    } else {
                        now_millis() + ttl
                    };
                    reply(
                        StatusCode::OK,
                        json!({
                            "user": {"email": "ana@gov.co"},
                            "exp": if exp > 0 { json!(exp) } else { Value::Null },
                        }),
                    )
                }
                ("POST", REFRESH_PATH) => {
                    s.refreshes.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    if s.refresh_fails.load(Ordering::SeqCst) {
                        s.authenticated.store(false, Ordering::SeqCst);
                        return reply(StatusCode::UNAUTHORIZED, json!({"code": "API_ERROR"}));
                    }
                    s.authenticated.store(true, Ordering::SeqCst);
                    s.stale.store(false, Ordering::SeqCst);
                    reply(StatusCode::OK, json!({"access_token": "a2"}))
                }
                ("POST", LOGOUT_PATH) => {
                    s.authenticated.store(false, Ordering::SeqCst);
                    if s.logout_fails.load(Ordering::SeqCst) {
                        return Err(ClientError::Transport("connection refused".into()));
                    }
                    reply(StatusCode::OK, json!({"message": "logged out"}))
                }
                (_, p) if p.starts_with(DOCUMENTS_PATH) => {
                    s.document_calls.fetch_add(1, Ordering::SeqCst);
                    if s.stale.load(Ordering::SeqCst) {
                        return reply(StatusCode::UNAUTHORIZED, json!({"code": "INVALID_TOKEN"}));
                    }
                    reply(StatusCode::OK, lock(&s.documents_body).clone())
                }
                _ => reply(StatusCode::NOT_FOUND, json!({"error": "not found"})),
            }
        }
    }

    pub(in crate::session) fn manager() -> (SessionManager<FakeApi>, Arc<FakeState>) {
        let api = FakeApi::default();
        let state = api.0.clone();
        (SessionManager::new(api), state)
    }

    pub(in crate::session) async fn logged_in() -> (SessionManager<FakeApi>, Arc<FakeState>) {
        let (session, state) = manager();
        session
            .login(&Credentials::new("ana@gov.co", PASSWORD))
            .await
            .unwrap();
        (session, state)
    }

    fn in_minutes(minutes: i64) -> i64 {
        now_millis() + minutes * 60_000
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_authenticated_schedules_renewal() {
        let (session, state) = manager();
        state.authenticated.store(true, Ordering::SeqCst);
        state.exp_ms.store(in_minutes(60), Ordering::SeqCst);

        assert!(session.init().await.is_authenticated());

        tokio::time::sleep(Duration::from_secs(54 * 60)).await;
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
        assert!(session.state().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_init_without_session() {
        let (session, state) = manager();
        assert_eq!(session.state(), SessionState::Loading);
        assert_eq!(session.init().await, SessionState::Unauthenticated);

        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_expiry_uses_fallback_interval() {
        let (session, state) = logged_in().await;
        assert_eq!(
            session.state().user().unwrap()["email"],
            json!("ana@gov.co")
        );

        tokio::time::sleep(Duration::from_secs(59 * 60)).await;
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2 * 60)).await;
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_lived_token_keeps_renewing() {
        let (session, state) = manager();
        // Every token lives 4 minutes, inside the 5 minute lead time.
        state.ttl_ms.store(4 * 60_000, Ordering::SeqCst);
        session
            .login(&Credentials::new("ana@gov.co", PASSWORD))
            .await
            .unwrap();

        let mut seen = 0;
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_secs(2 * 60 + 1)).await;
            let refreshes = state.refreshes.load(Ordering::SeqCst);
            assert!(refreshes > seen, "renewals stopped at {refreshes}");
            assert!(session.state().is_authenticated());
            seen = refreshes;
        }
        // One renewal per `min_delay`, not a burst.
        assert!(seen <= 11, "{seen} renewals");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_renews_at_debounce_pace() {
        let (session, state) = manager();
        // Every token comes back already expired.
        state.ttl_ms.store(-60_000, Ordering::SeqCst);
        session
            .login(&Credentials::new("ana@gov.co", PASSWORD))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(5 * 60)).await;
        let refreshes = state.refreshes.load(Ordering::SeqCst);
        // Roughly one per 30 s debounce window: the chain neither stops nor spins.
        assert!((5..=12).contains(&refreshes), "{refreshes} renewals");
        assert!(session.state().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_failure_ends_session() {
        let (session, state) = logged_in().await;
        state.refresh_fails.store(true, Ordering::SeqCst);
        let mut changes = session.subscribe();

        tokio::time::sleep(Duration::from_secs(61 * 60)).await;
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(changes.has_changed().unwrap());

        // No retry after a failed scheduled renewal.
        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_401s_share_one_renewal() {
        let (session, state) = logged_in().await;
        state.stale.store(true, Ordering::SeqCst);

        let get = || session.fetch_with_refresh(ApiRequest::get(DOCUMENTS_PATH));
        let (a, b, c) = tokio::join!(get(), get(), get());

        for response in [a, b, c] {
            assert_eq!(response.unwrap().status, StatusCode::OK);
        }
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
        // Three originals plus exactly one replay each.
        assert_eq!(state.document_calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_triggers_within_debounce_hit_upstream_once() {
        let (session, state) = logged_in().await;

        session.renew().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        session.renew().await.unwrap();
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(31)).await;
        session.renew().await.unwrap();
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_reports_real_failure() {
        let (session, state) = logged_in().await;
        state.refresh_fails.store(true, Ordering::SeqCst);

        assert!(session.renew().await.is_err());
        assert!(session.renew().await.is_err());
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_renewal_returns_original_401() {
        let (session, state) = logged_in().await;
        state.stale.store(true, Ordering::SeqCst);
        state.refresh_fails.store(true, Ordering::SeqCst);

        let response = session
            .fetch_with_refresh(ApiRequest::get(DOCUMENTS_PATH))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
        assert_eq!(state.document_calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_cancels_timer_even_when_call_fails() {
        let (session, state) = logged_in().await;
        state.logout_fails.store(true, Ordering::SeqCst);

        assert!(matches!(
            session.logout().await,
            Err(ClientError::Transport(_))
        ));
        assert_eq!(session.state(), SessionState::Unauthenticated);

        tokio::time::sleep(Duration::from_secs(3 * 3600)).await;
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_renewal_does_not_reauthenticate() {
        let (session, state) = logged_in().await;

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.renew().await }
        });
        // Wait until the renewal has reached the gateway.
        while state.refreshes.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        session.logout().await.unwrap();
        let _ = pending.await.unwrap();

        assert_eq!(state.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_session_starts_its_own_renewal() {
        let (session, state) = logged_in().await;

        let pending = tokio::spawn({
            let session = session.clone();
            async move { session.renew().await }
        });
        while state.refreshes.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        // Log out and back in while the old renewal is still in flight.
        session.logout().await.unwrap();
        session
            .login(&Credentials::new("ana@gov.co", PASSWORD))
            .await
            .unwrap();
        state.stale.store(true, Ordering::SeqCst);

        let response = session
            .fetch_with_refresh(ApiRequest::get(DOCUMENTS_PATH))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(state.refreshes.load(Ordering::SeqCst), 2);

        let _ = pending.await.unwrap();
        assert!(session.state().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_validates_before_sending() {
        let (session, state) = manager();
        let err = session
            .login(&Credentials::new("not-an-email", PASSWORD))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(state.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_rejected_keeps_state() {
        let (session, _) = manager();
        session.init().await;

        let err = session
            .login(&Credentials::new("ana@gov.co", "incorrecta1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("INVALID_CREDENTIALS"));
        assert_eq!(session.state(), SessionState::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_sends_form() {
        let (session, state) = manager();
        let registration = Registration {
            email: "ana@gov.co".into(),
            password: PASSWORD.into(),
            name: "Ana".into(),
            id_citizen: 1_234_567,
        };
        // The fake has no register route; the request shape is what matters.
        let _ = session.register(&registration).await;

        let sent = lock(&state.last_request).clone().unwrap();
        assert_eq!(sent.path, REGISTER_PATH);
        assert_eq!(
            sent.body,
            RequestBody::Json(json!({
                "email": "ana@gov.co",
                "password": PASSWORD,
                "name": "Ana",
                "id_citizen": 1_234_567,
            }))
        );
    }
}
