//! Tests for startup failures and the readiness deadline

use std::time::{Duration, Instant};
use test_utils::{
    ConfigBuilder, FixtureError, FixtureState, MockProvider, MockRuntime, ResultAssertions,
    RuntimeCall, TestContext,
};

#[test]
fn test_ready_after_retries() {
    let ctx = TestContext::new().with_provider(MockProvider::new().ready_after(3));
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().build());

    fixture.start().assert_ok();
    assert_eq!(ctx.provider().ping_count(), 4);
    assert_eq!(fixture.state(), FixtureState::Ready);
}

#[test]
fn test_launch_failure_is_startup_error() {
    let ctx = TestContext::new()
        .with_runtime(MockRuntime::new().with_failing_launch("manifest for mysql:0.0 not found"));
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().with_image("mysql:0.0").build());

    match fixture.start() {
        Err(FixtureError::Startup { image, message }) => {
            assert_eq!(image, "mysql:0.0");
            assert!(message.contains("manifest for mysql:0.0 not found"));
        }
        other => panic!("Expected Startup error, got {:?}", other),
    }
    assert_eq!(fixture.state(), FixtureState::Starting);
    assert!(ctx.provider().get_calls().is_empty());

    fixture.stop();
    assert_eq!(fixture.state(), FixtureState::Stopped);
    ctx.assert_no_leaks();
}

#[test]
fn test_slow_inspect_is_cut_off_at_deadline() {
    let timeout = Duration::from_millis(300);
    let ctx = TestContext::new().with_runtime(MockRuntime::new().with_slow_inspect(Duration::from_secs(3)));
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().with_timeout(timeout).build());

    let started = Instant::now();
    let result = fixture.start();
    let elapsed = started.elapsed();

    match result {
        Err(FixtureError::StartupTimeout { timeout: reported, .. }) => assert_eq!(reported, timeout),
        other => panic!("Expected StartupTimeout, got {:?}", other.map(|_| ())),
    }
    assert!(elapsed < Duration::from_secs(1), "start took {:?}", elapsed);
    // The provider is never reached while the runtime is stuck
    assert!(ctx.provider().get_calls().is_empty());
}

#[test]
fn test_slow_ping_is_cut_off_at_deadline() {
    let ctx = TestContext::new().with_provider(MockProvider::new().with_ping_delay(Duration::from_secs(3)));
    let mut fixture = ctx.fixture(
        ConfigBuilder::minimal()
            .with_timeout(Duration::from_millis(300))
            .build(),
    );

    let started = Instant::now();
    fixture.start().assert_err_contains("did not become ready");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(ctx.provider().ping_count(), 1);
}

#[test]
fn test_timeout_is_bounded() {
    let timeout = Duration::from_millis(200);
    let ctx = TestContext::new().with_provider(MockProvider::new().never_ready());
    let mut fixture = ctx.fixture(
        ConfigBuilder::minimal()
            .with_timeout(timeout)
            .with_poll_interval(Duration::from_millis(20))
            .build(),
    );

    let started = Instant::now();
    let result = fixture.start();
    let elapsed = started.elapsed();

    match result {
        Err(FixtureError::StartupTimeout {
            timeout: reported,
            last_error,
        }) => {
            assert_eq!(reported, timeout);
            assert!(last_error.contains("Connection refused"));
        }
        other => panic!("Expected StartupTimeout, got {:?}", other),
    }
    assert!(elapsed >= timeout);
    assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    assert!(ctx.provider().ping_count() > 1);
}

#[test]
fn test_timeout_then_stop_releases_container() {
    let ctx = TestContext::new().with_provider(MockProvider::new().never_ready());
    let mut fixture = ctx.fixture(
        ConfigBuilder::minimal()
            .with_timeout(Duration::from_millis(50))
            .build(),
    );

    assert!(fixture.start().is_err());
    assert_eq!(ctx.runtime().running_count(), 1);

    fixture.stop();
    assert_eq!(ctx.runtime().running_count(), 0);
}

#[test]
fn test_start_after_failed_start() {
    let ctx = TestContext::new().with_provider(MockProvider::new().never_ready());
    let mut fixture = ctx.fixture(
        ConfigBuilder::minimal()
            .with_timeout(Duration::from_millis(30))
            .build(),
    );

    assert!(fixture.start().is_err());
    fixture
        .start()
        .assert_err_contains("Cannot start while the fixture is starting");
    assert_eq!(ctx.runtime().launch_count(), 1);
}

#[test]
fn test_exited_container_fails_fast_with_logs() {
    let ctx = TestContext::new().with_runtime(
        MockRuntime::new()
            .with_exiting_container()
            .with_logs("Initializing database\n[ERROR] unknown variable 'bogus=1'\n"),
    );
    let mut fixture = ctx.fixture(
        ConfigBuilder::minimal()
            .with_timeout(Duration::from_secs(30))
            .build(),
    );

    let started = Instant::now();
    let err = fixture.start().unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(5));

    assert!(err.is_startup());
    let message = err.to_string();
    assert!(message.contains("exited before becoming ready"));
    assert!(message.contains("unknown variable 'bogus=1'"));
    // Readiness was never probed against a dead container
    assert_eq!(ctx.provider().ping_count(), 0);
}

#[test]
fn test_timeout_forwards_container_logs() {
    let ctx = TestContext::new()
        .with_runtime(MockRuntime::new().with_logs("mysqld: ready for connections\n"))
        .with_provider(MockProvider::new().never_ready());
    let mut fixture = ctx.fixture(
        ConfigBuilder::minimal()
            .with_timeout(Duration::from_millis(30))
            .with_container_logs()
            .build(),
    );

    let err = fixture.start().unwrap_err();
    assert!(err.is_startup());
    assert!(ctx
        .runtime()
        .get_calls()
        .iter()
        .any(|call| matches!(call, RuntimeCall::Logs { .. })));
}
