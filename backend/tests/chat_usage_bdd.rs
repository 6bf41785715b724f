//! Behaviour tests for the chat usage flow.
//!
//! Scenarios drive `UsageService` through its driving ports with an
//! in-memory store and a frozen clock, so quota behaviour is checked end to
//! end without a database or an upstream provider.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use chat_usage::domain::ports::{
    ChatSessionGrant, ChatUsageCommand, FixtureChatSessionProvider, StaticUsageLimitsSource,
    UsageStatusQuery,
};
use chat_usage::domain::{
    ChatProviderSettings, DEFAULT_LIMITS_TTL, Error, ErrorCode, IdentityResolver, UsageLimitsResolver,
    UsageSalt, UsageService, VisitorSignals,
};
use chat_usage::test_support::{InMemoryUsageStore, MutableClock};
use chrono::{TimeZone, Utc};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tokio::runtime::Runtime;

struct UsageWorld {
    runtime: Runtime,
    clock: Arc<MutableClock>,
    store: Arc<InMemoryUsageStore>,
    signals: RefCell<VisitorSignals>,
    provider_configured: Cell<bool>,
    outcomes: RefCell<Vec<Result<ChatSessionGrant, Error>>>,
}

impl UsageWorld {
    fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2025, 6, 15, 12, 0, 0)
            .single()
            .expect("valid start instant");
        let clock = Arc::new(MutableClock::new(start));
        Self {
            runtime: tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime"),
            store: Arc::new(InMemoryUsageStore::new(clock.clone())),
            clock,
            signals: RefCell::new(VisitorSignals {
                ip: "203.0.113.7".to_owned(),
                user_agent: "Mozilla/5.0 (X11; Linux x86_64)".to_owned(),
                visitor_id: "b8f1d1f4-6a0c-4a55-9f64-3c1b2a0d9e11".to_owned(),
                auth_user_id: None,
            }),
            provider_configured: Cell::new(true),
            outcomes: RefCell::new(Vec::new()),
        }
    }

    fn service(&self) -> UsageService {
        let provider = if self.provider_configured.get() {
            ChatProviderSettings::new(Some("sk-test".to_owned()), Some("wf_test".to_owned()))
        } else {
            ChatProviderSettings::default()
        };
        let limits = UsageLimitsResolver::new(
            Arc::new(StaticUsageLimitsSource::new(None)),
            self.clock.clone(),
            DEFAULT_LIMITS_TTL,
        );
        UsageService::new(
            IdentityResolver::new(UsageSalt::new("behaviour-test-salt")),
            Arc::new(limits),
            self.store.clone(),
            Arc::new(FixtureChatSessionProvider::default()),
            provider,
        )
    }

    fn last_error(&self) -> Error {
        match self.outcomes.borrow().last() {
            Some(Err(error)) => error.clone(),
            Some(Ok(_)) => panic!("expected the last request to fail"),
            None => panic!("no request was made"),
        }
    }
}

#[fixture]
fn world() -> UsageWorld {
    UsageWorld::new()
}

#[given("a guest visitor")]
fn a_guest_visitor(world: &UsageWorld) {
    world.signals.borrow_mut().auth_user_id = None;
}

#[given("a signed-in visitor")]
fn a_signed_in_visitor(world: &UsageWorld) {
    world.signals.borrow_mut().auth_user_id = Some("user-42".to_owned());
}

#[given("the chat provider is not configured")]
fn the_chat_provider_is_not_configured(world: &UsageWorld) {
    world.provider_configured.set(false);
}

#[when("the visitor starts {count} chat sessions")]
fn the_visitor_starts_chat_sessions(world: &UsageWorld, count: usize) {
    let service = world.service();
    let signals = world.signals.borrow().clone();
    for _ in 0..count {
        let outcome = world.runtime.block_on(service.create_session(&signals));
        world.outcomes.borrow_mut().push(outcome);
    }
}

#[when("a day passes")]
fn a_day_passes(world: &UsageWorld) {
    world.clock.advance_seconds(24 * 60 * 60);
}

#[then("every session is granted")]
fn every_session_is_granted(world: &UsageWorld) {
    for outcome in world.outcomes.borrow().iter() {
        let grant = outcome.as_ref().expect("session should be granted");
        assert_eq!(grant.client_secret, "fixture-client-secret");
    }
}

#[then("the last request is rejected as usage limited")]
fn the_last_request_is_rejected_as_usage_limited(world: &UsageWorld) {
    assert_eq!(world.last_error().code(), ErrorCode::UsageLimit);
}

#[then("the last request is rejected as service unavailable")]
fn the_last_request_is_rejected_as_service_unavailable(world: &UsageWorld) {
    let error = world.last_error();
    assert_eq!(error.code(), ErrorCode::ServiceUnavailable);
    assert_eq!(error.message(), "Missing OPENAI_API_KEY");
}

#[then("the rejection reports {count} sessions today")]
fn the_rejection_reports_sessions_today(world: &UsageWorld, count: u64) {
    let error = world.last_error();
    let details = error.details().expect("usage limit details");
    assert_eq!(details["status"]["sessionsToday"], count);
    assert_eq!(details["status"]["isSessionBlocked"], true);
}

#[then("the usage status shows {remaining} sessions remaining")]
fn the_usage_status_shows_sessions_remaining(world: &UsageWorld, remaining: u32) {
    let signals = world.signals.borrow().clone();
    let status = world
        .runtime
        .block_on(world.service().usage_status(&signals))
        .expect("usage status");
    assert_eq!(status.sessions_remaining, remaining);
}

#[scenario(
    path = "tests/features/chat_usage.feature",
    name = "A guest exhausts the daily session allowance"
)]
fn a_guest_exhausts_the_daily_session_allowance(world: UsageWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/chat_usage.feature",
    name = "Signing in raises the daily session allowance"
)]
fn signing_in_raises_the_daily_session_allowance(world: UsageWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/chat_usage.feature",
    name = "The allowance resets on the next local day"
)]
fn the_allowance_resets_on_the_next_local_day(world: UsageWorld) {
    drop(world);
}

#[scenario(
    path = "tests/features/chat_usage.feature",
    name = "An unconfigured provider fails without consuming quota"
)]
fn an_unconfigured_provider_fails_without_consuming_quota(world: UsageWorld) {
    drop(world);
}
