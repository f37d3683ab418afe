//! Test fixtures and sample data
//!
//! Sample config files, MySQL option files and canned query rows.

use mysql_fixture::utils::database::mock::{MockProvider, MockQuery};
use mysql_fixture::{QueryRow, SqlValue};

/// MySQL option file in the shape OpenMRS test suites inject
pub const SAMPLE_CNF: &str = "\
[mysqld]
character-set-server = utf8
collation-server = utf8_general_ci
max_allowed_packet = 16M
";

/// Single-column row `1`, as returned by `SELECT 1`
pub fn select_one_row() -> QueryRow {
    QueryRow::new(vec!["1".to_string()], vec![SqlValue::Int(1)])
}

/// Row returned by `SELECT VERSION()`
pub fn version_row(version: &str) -> QueryRow {
    QueryRow::new(
        vec!["VERSION()".to_string()],
        vec![SqlValue::Text(version.to_string())],
    )
}

/// Row returned by `SHOW VARIABLES LIKE '<name>'`
pub fn variable_row(name: &str, value: &str) -> QueryRow {
    QueryRow::new(
        vec!["Variable_name".to_string(), "Value".to_string()],
        vec![
            SqlValue::Text(name.to_string()),
            SqlValue::Text(value.to_string()),
        ],
    )
}

/// Provider that is ready immediately and answers `SELECT 1`
pub fn ready_provider() -> MockProvider {
    MockProvider::new().expect("SELECT 1", MockQuery::Row(select_one_row()))
}

/// Minimal valid config TOML
pub fn minimal_config_toml() -> &'static str {
    r#"
[fixture]
image = "mysql:5.6"
database = "openmrs"
username = "test"
password = "test"
"#
}

/// Config TOML with a relative overlay source (`fixture.cnf` next to the file)
pub fn overlay_config_toml() -> &'static str {
    r#"
[fixture]
image = "mysql:5.6"
database = "openmrs"
username = "test"
password = "test"

[fixture.config_overlay]
source = "fixture.cnf"
"#
}

/// Config TOML exercising every field
pub fn full_config_toml() -> &'static str {
    r#"
[fixture]
image = "mysql:5.7.44"
database = "openmrs"
username = "test"
password = "test"
root_password = "rootpw"
startup_timeout_seconds = 90
poll_interval_ms = 250
container_port = 3306
host = "127.0.0.1"
forward_container_logs = true

[fixture.config_overlay]
source = "fixture.cnf"
destination = "/etc/mysql/conf.d/openmrs.cnf"

[fixture.env]
TZ = "UTC"

[docker]
binary = "docker"
command_timeout_seconds = 600
"#
}
