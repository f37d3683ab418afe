//! Tests for run_query and execute

use test_utils::{
    select_one_row, version_row, ConfigBuilder, FixtureError, FixtureState, MockProvider,
    MockQuery, ProviderCall, ResultAssertions, TestContext,
};

fn provider() -> MockProvider {
    MockProvider::new()
        .expect("SELECT 1", MockQuery::Row(select_one_row()))
        .expect("SELECT VERSION()", MockQuery::Row(version_row("5.6.51")))
        .expect("SELECT * FROM users WHERE 1 = 0", MockQuery::NoRows)
        .expect("CREATE TABLE t (id INT)", MockQuery::NoRows)
}

#[test]
fn test_select_one() {
    let ctx = TestContext::new().with_provider(provider());
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().build());
    fixture.start().assert_ok();

    let row = fixture.run_query("SELECT 1").assert_ok();
    assert_eq!(row.get_i64(0), Some(1));
}

#[test]
fn test_query_uses_ready_endpoint() {
    let ctx = TestContext::new().with_provider(provider());
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().build());
    let port = fixture.start().assert_ok().port;

    fixture.run_query("SELECT VERSION()").assert_ok();
    assert!(ctx.provider().get_calls().contains(&ProviderCall::FirstRow {
        port,
        sql: "SELECT VERSION()".to_string(),
    }));
}

#[test]
fn test_query_before_start() {
    let ctx = TestContext::new();
    let fixture = ctx.fixture(ConfigBuilder::minimal().build());

    let result = fixture.run_query("SELECT 1");
    assert!(matches!(
        result,
        Err(FixtureError::InvalidState {
            state: FixtureState::NotStarted,
            ..
        })
    ));
    // No connection attempted
    assert!(ctx.provider().get_calls().is_empty());
}

#[test]
fn test_query_after_stop() {
    let ctx = TestContext::new();
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().build());
    fixture.start().assert_ok();
    fixture.stop();

    fixture
        .run_query("SELECT 1")
        .assert_err_contains("while the fixture is stopped");
}

#[test]
fn test_syntax_error_keeps_fixture_usable() {
    let ctx = TestContext::new().with_provider(provider());
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().build());
    fixture.start().assert_ok();

    match fixture.run_query("SELEC 1") {
        Err(FixtureError::Query { sql, message }) => {
            assert_eq!(sql, "SELEC 1");
            assert!(message.contains("SQL syntax"));
        }
        other => panic!("Expected Query error, got {:?}", other),
    }

    assert_eq!(fixture.state(), FixtureState::Ready);
    assert_eq!(fixture.run_query("SELECT 1").assert_ok().get_i64(0), Some(1));
}

#[test]
fn test_empty_result_is_query_error() {
    let ctx = TestContext::new().with_provider(provider());
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().build());
    fixture.start().assert_ok();

    fixture
        .run_query("SELECT * FROM users WHERE 1 = 0")
        .assert_err_contains("no rows");
}

#[test]
fn test_execute_statement() {
    let ctx = TestContext::new().with_provider(provider());
    let mut fixture = ctx.fixture(ConfigBuilder::minimal().build());
    fixture.start().assert_ok();

    fixture.execute("CREATE TABLE t (id INT)").assert_ok();
    assert!(matches!(
        fixture.execute("DROP TABLE missing"),
        Err(FixtureError::Query { .. })
    ));
}

#[test]
fn test_execute_before_start() {
    let ctx = TestContext::new();
    let fixture = ctx.fixture(ConfigBuilder::minimal().build());

    fixture
        .execute("CREATE TABLE t (id INT)")
        .assert_err_contains("Cannot execute a statement");
}
