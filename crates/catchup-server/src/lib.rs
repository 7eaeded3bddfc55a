//! Wiring for the `catchup` server binary.
//!
//! Holds the on-disk configuration format and the outbound webhook
//! transport. The binary itself only glues these to the engine and router.

pub mod transport;

use std::path::PathBuf;

use catchup_engine::EngineConfig;
use config::{ConfigError, Environment};
use serde::Deserialize;

pub use transport::{WebhookError, WebhookTransport};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `CATCHUP_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// Base URL of the web log viewer; history links point below it.
  pub history_base_url: String,
  pub archive_hosts:    Vec<String>,
  #[serde(default = "default_archive_index")]
  pub archive_index:    String,
  #[serde(default = "default_archive_doctype")]
  pub archive_doctype:  String,
  /// Where private messages are POSTed for the chat bot to relay.
  pub transport_url:    String,
  #[serde(default)]
  pub engine:           EngineConfig,
}

fn default_archive_index() -> String { "irclogs".into() }

fn default_archive_doctype() -> String { "logline".into() }

/// `CATCHUP_PORT`, `CATCHUP_ENGINE__COOLDOWN_SECS`, and
/// `CATCHUP_ARCHIVE_HOSTS=a:9200,b:9200`.
pub fn environment() -> Environment {
  Environment::with_prefix("CATCHUP")
    .prefix_separator("_")
    .separator("__")
    .try_parsing(true)
    .list_separator(",")
    .with_list_parse_key("archive_hosts")
}

/// Layer `env` over `file` and deserialise the result.
pub fn load_config<F>(file: F, env: Environment) -> Result<ServerConfig, ConfigError>
where
  F: config::Source + Send + Sync + 'static,
{
  config::Config::builder()
    .add_source(file)
    .add_source(env)
    .build()?
    .try_deserialize()
}

#[cfg(test)]
mod tests {
  use catchup_engine::MentionPolicy;
  use config::{File, FileFormat, Map};

  use super::*;

  const TOML: &str = r#"
    host = "127.0.0.1"
    port = 8080
    store_path = "~/.local/share/catchup/presence.db"
    history_base_url = "https://logs.example.org"
    archive_hosts = ["es1:9200", "es2:9200"]
    transport_url = "http://127.0.0.1:9000/deliver"

    [engine]
    cooldown_secs = 60
    mention_policy = "immediate"
  "#;

  fn no_env() -> Environment { environment().source(Some(Map::new())) }

  #[test]
  fn toml_file_is_deserialised_with_defaults() {
    let cfg = load_config(File::from_str(TOML, FileFormat::Toml), no_env()).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.archive_hosts, vec!["es1:9200", "es2:9200"]);
    assert_eq!(cfg.archive_index, "irclogs");
    assert_eq!(cfg.engine.cooldown_secs, 60);
    assert_eq!(cfg.engine.mention_policy, MentionPolicy::Immediate);
    assert_eq!(cfg.engine.sample_limit, 5);
    assert_eq!(cfg.engine.retry.max_attempts, 3);
    assert!(cfg.engine.archive_request_timeout() < cfg.engine.archive_timeout());
  }

  #[test]
  fn environment_overrides_file() {
    let env = Map::from([
      ("CATCHUP_PORT".to_owned(), "9090".to_owned()),
      ("CATCHUP_ENGINE__COOLDOWN_SECS".to_owned(), "600".to_owned()),
      ("CATCHUP_ARCHIVE_HOSTS".to_owned(), "es3:9200,es4:9200".to_owned()),
    ]);
    let cfg = load_config(
      File::from_str(TOML, FileFormat::Toml),
      environment().source(Some(env)),
    )
    .unwrap();
    assert_eq!(cfg.port, 9090);
    assert_eq!(cfg.engine.cooldown_secs, 600);
    assert_eq!(cfg.archive_hosts, vec!["es3:9200", "es4:9200"]);
  }

  #[test]
  fn missing_required_field_is_an_error() {
    let partial = File::from_str("host = \"127.0.0.1\"", FileFormat::Toml);
    assert!(load_config(partial, no_env()).is_err());
  }
}
