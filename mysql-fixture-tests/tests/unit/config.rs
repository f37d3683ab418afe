//! Unit tests for configuration loading and validation

use mysql_fixture::config::{
    configure, load_config, load_file_config, parse_image_ref, ConfigError, FixtureOptions,
};
use rstest::rstest;
use std::time::Duration;
use test_utils::{
    full_config_toml, minimal_config_toml, overlay_config_toml, ConfigBuilder, ResultAssertions,
    TestContext, SAMPLE_CNF,
};

#[test]
fn test_load_minimal_config() {
    let ctx = TestContext::new();
    let path = ctx.create_file("fixture.toml", minimal_config_toml());

    let config = load_config(&path).assert_ok();
    assert_eq!(config.fixture.image.to_string(), "mysql:5.6");
    assert_eq!(config.fixture.database, "openmrs");
    assert_eq!(config.fixture.username, "test");
    assert_eq!(config.fixture.root_password, "test");
    assert_eq!(config.fixture.container_port, 3306);
    assert_eq!(config.fixture.startup_timeout, Duration::from_secs(120));
    assert_eq!(config.docker.binary, "docker");
}

#[test]
fn test_load_full_config() {
    let ctx = TestContext::new();
    ctx.create_file("fixture.cnf", SAMPLE_CNF);
    let path = ctx.create_file("fixture.toml", full_config_toml());

    let config = load_config(&path).assert_ok();
    let fixture = config.fixture;
    assert_eq!(fixture.image.tag.as_deref(), Some("5.7.44"));
    assert_eq!(fixture.root_password, "rootpw");
    assert_eq!(fixture.startup_timeout, Duration::from_secs(90));
    assert_eq!(fixture.poll_interval, Duration::from_millis(250));
    assert!(fixture.forward_container_logs);
    assert_eq!(fixture.env.get("TZ").map(String::as_str), Some("UTC"));

    let overlay = fixture.config_overlay.expect("overlay should be configured");
    assert_eq!(overlay.destination, "/etc/mysql/conf.d/openmrs.cnf");
    assert!(overlay.source.ends_with("fixture.cnf"));

    assert_eq!(config.docker.command_timeout_seconds, 600);
}

#[test]
fn test_relative_overlay_resolves_against_config_dir() {
    let ctx = TestContext::new();
    ctx.create_file("conf/fixture.cnf", SAMPLE_CNF);
    let path = ctx.create_file("conf/fixture.toml", overlay_config_toml());

    let raw = load_file_config(&path).assert_ok();
    let source = raw.fixture.config_overlay.unwrap().source;
    assert_eq!(source, ctx.temp_dir().join("conf").join("fixture.cnf"));

    let config = load_config(&path).assert_ok();
    let overlay = config.fixture.config_overlay.unwrap();
    assert!(overlay.source.is_absolute());
    assert_eq!(overlay.destination, "/etc/mysql/conf.d/fixture.cnf");
}

#[test]
fn test_missing_overlay_file_fails() {
    let ctx = TestContext::new();
    let path = ctx.create_file("fixture.toml", overlay_config_toml());

    load_config(&path).assert_err_contains("does not exist");
}

#[test]
fn test_invalid_toml_fails() {
    let ctx = TestContext::new();
    let path = ctx.create_file("fixture.toml", "[fixture\nimage = ");

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_missing_file_fails() {
    let ctx = TestContext::new();
    let result = load_config(ctx.temp_dir().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_zero_docker_timeout_fails() {
    let ctx = TestContext::new();
    let contents = format!("{}\n[docker]\ncommand_timeout_seconds = 0\n", minimal_config_toml());
    let path = ctx.create_file("fixture.toml", &contents);

    load_config(&path).assert_err_contains("Docker command timeout");
}

#[rstest]
#[case::image("image")]
#[case::database("database")]
#[case::username("username")]
#[case::password("password")]
fn test_required_fields(#[case] field: &str) {
    let mut options = ConfigBuilder::minimal().options();
    match field {
        "image" => options.image = None,
        "database" => options.database = None,
        "username" => options.username = None,
        "password" => options.password = None,
        _ => unreachable!(),
    }

    match configure(options) {
        Err(ConfigError::MissingField(missing)) => assert_eq!(missing, field),
        other => panic!("Expected MissingField({}), got {:?}", field, other),
    }
}

#[test]
fn test_blank_field_counts_as_missing() {
    let options = ConfigBuilder::minimal().options().database("   ");
    assert!(matches!(
        configure(options),
        Err(ConfigError::MissingField("database"))
    ));
}

#[rstest]
#[case("open-mrs")]
#[case("drop table;")]
#[case("a_database_name_that_is_far_too_long_for_mysql_to_accept_at_all_x")]
fn test_invalid_database_names(#[case] name: &str) {
    let options = ConfigBuilder::minimal().options().database(name);
    configure(options).assert_err_contains("Database name");
}

#[rstest]
#[case("mysql", "mysql", None, None)]
#[case("mysql:5.6", "mysql", Some("5.6"), None)]
#[case("library/mysql:8.0.36", "library/mysql", Some("8.0.36"), None)]
#[case("localhost:5000/mysql", "localhost:5000/mysql", None, None)]
#[case("localhost:5000/mysql:5.7", "localhost:5000/mysql", Some("5.7"), None)]
#[case("mysql@sha256:abc123", "mysql", None, Some("sha256:abc123"))]
fn test_parse_image_ref(
    #[case] input: &str,
    #[case] repository: &str,
    #[case] tag: Option<&str>,
    #[case] digest: Option<&str>,
) {
    let image = parse_image_ref(input).assert_ok();
    assert_eq!(image.repository, repository);
    assert_eq!(image.tag.as_deref(), tag);
    assert_eq!(image.digest.as_deref(), digest);
}

#[rstest]
#[case("")]
#[case("MySQL:5.6")]
#[case("mysql:")]
#[case("mysql 5.6")]
#[case("mysql@sha256")]
#[case(":5.6")]
#[case("a:b:c")]
#[case("mysql:5.6:extra")]
#[case("registry/team:x/mysql")]
#[case("localhost:port/mysql")]
fn test_invalid_image_refs(#[case] input: &str) {
    assert!(matches!(
        parse_image_ref(input),
        Err(ConfigError::InvalidImage(_, _))
    ));
}

#[test]
fn test_image_display_defaults_to_latest() {
    assert_eq!(parse_image_ref("mysql").unwrap().to_string(), "mysql:latest");
    assert_eq!(
        parse_image_ref("mysql@sha256:abc").unwrap().to_string(),
        "mysql@sha256:abc"
    );
}

#[test]
fn test_timeout_precedence() {
    let mut options = ConfigBuilder::minimal().options();
    options.startup_timeout_seconds = Some(30);
    options.startup_timeout_ms = None;
    assert_eq!(configure(options.clone()).unwrap().startup_timeout, Duration::from_secs(30));

    options.startup_timeout_ms = Some(1500);
    assert_eq!(configure(options).unwrap().startup_timeout, Duration::from_millis(1500));
}

#[test]
fn test_zero_timeout_rejected() {
    let options = ConfigBuilder::minimal().options().startup_timeout(Duration::ZERO);
    configure(options).assert_err_contains("Startup timeout");
}

#[test]
fn test_relative_overlay_destination_rejected() {
    let builder = ConfigBuilder::minimal().with_overlay_at(SAMPLE_CNF, "conf.d/fixture.cnf");
    builder.try_build().assert_err_contains("absolute file path");
}

#[test]
fn test_env_name_with_equals_rejected() {
    let options = ConfigBuilder::minimal().options().env("A=B", "c");
    configure(options).assert_err_contains("environment variable");
}

#[test]
fn test_merge_prefers_overrides() {
    let base = FixtureOptions::new()
        .image("mysql:5.6")
        .database("openmrs")
        .credentials("test", "test")
        .env("TZ", "UTC");
    let overrides = FixtureOptions::new().image("mysql:5.7").env("LANG", "C");

    let merged = base.merge(overrides);
    assert_eq!(merged.image.as_deref(), Some("mysql:5.7"));
    assert_eq!(merged.database.as_deref(), Some("openmrs"));
    assert_eq!(merged.env.len(), 2);
}

#[test]
fn test_override_seconds_replaces_file_milliseconds() {
    let file = ConfigBuilder::minimal().options(); // startup_timeout_ms = 1000
    let overrides = FixtureOptions {
        startup_timeout_seconds: Some(60),
        ..FixtureOptions::default()
    };

    let config = configure(file.merge(overrides)).assert_ok();
    assert_eq!(config.startup_timeout, Duration::from_secs(60));
}

#[test]
fn test_merge_keeps_file_timeout_without_override() {
    let file = FixtureOptions {
        startup_timeout_seconds: Some(90),
        startup_timeout_ms: None,
        ..ConfigBuilder::minimal().options()
    };

    let config = configure(file.merge(FixtureOptions::new())).assert_ok();
    assert_eq!(config.startup_timeout, Duration::from_secs(90));
}

#[rstest]
#[case(Some(true), None, true)]
#[case(Some(true), Some(false), false)]
#[case(None, Some(true), true)]
#[case(None, None, false)]
fn test_merge_container_logs(
    #[case] file: Option<bool>,
    #[case] cli: Option<bool>,
    #[case] expected: bool,
) {
    let base = FixtureOptions {
        forward_container_logs: file,
        ..ConfigBuilder::minimal().options()
    };
    let overrides = FixtureOptions {
        forward_container_logs: cli,
        ..FixtureOptions::default()
    };

    let config = configure(base.merge(overrides)).assert_ok();
    assert_eq!(config.forward_container_logs, expected);
}

#[test]
fn test_container_env_for_regular_user() {
    let config = ConfigBuilder::minimal().with_root_password("secret").build();
    let env = config.container_env();

    assert_eq!(env["MYSQL_DATABASE"], "openmrs");
    assert_eq!(env["MYSQL_USER"], "test");
    assert_eq!(env["MYSQL_PASSWORD"], "test");
    assert_eq!(env["MYSQL_ROOT_PASSWORD"], "secret");
}

#[test]
fn test_container_env_for_root_user() {
    let config = ConfigBuilder::minimal()
        .with_credentials("root", "rootpw")
        .build();
    let env = config.container_env();

    assert!(!env.contains_key("MYSQL_USER"));
    assert!(!env.contains_key("MYSQL_PASSWORD"));
    assert_eq!(env["MYSQL_ROOT_PASSWORD"], "rootpw");
}

#[test]
fn test_extra_env_overrides_generated() {
    let config = ConfigBuilder::minimal()
        .with_env("MYSQL_ROOT_PASSWORD", "override")
        .build();
    assert_eq!(config.container_env()["MYSQL_ROOT_PASSWORD"], "override");
}
