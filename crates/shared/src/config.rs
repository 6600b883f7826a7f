use std::env;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_CONNECT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_CONNECT_INITIAL_DELAY_MS: u64 = 500;

/// 設定読み込み時のエラー（起動失敗として扱う）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid {key} value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// 実行環境
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Environment::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// ストアの接続先
///
/// - `memory://` : プロセス内メモリ（開発・テスト用）
/// - `dynamodb://<table>[?endpoint=<url>&region=<region>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreUri {
    Memory,
    DynamoDb {
        table: String,
        endpoint: Option<String>,
        region: Option<String>,
    },
}

impl FromStr for StoreUri {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| "expected <scheme>://...".to_string())?;

        match scheme {
            "memory" => Ok(StoreUri::Memory),
            "dynamodb" => {
                let (table, query) = match rest.split_once('?') {
                    Some((table, query)) => (table, Some(query)),
                    None => (rest, None),
                };
                let table = table.trim_end_matches('/');
                if table.is_empty() {
                    return Err("table name is missing".to_string());
                }

                let mut endpoint = None;
                let mut region = None;
                for pair in query.unwrap_or_default().split('&').filter(|p| !p.is_empty()) {
                    match pair.split_once('=') {
                        Some(("endpoint", v)) if !v.is_empty() => endpoint = Some(v.to_string()),
                        Some(("region", v)) if !v.is_empty() => region = Some(v.to_string()),
                        _ => return Err(format!("unsupported option '{pair}'")),
                    }
                }

                Ok(StoreUri::DynamoDb {
                    table: table.to_string(),
                    endpoint,
                    region,
                })
            }
            other => Err(format!("unsupported scheme '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store_uri: StoreUri,
    pub environment: Environment,
    pub connect_max_attempts: u32,
    pub connect_initial_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー検索関数から設定を組み立てます（テスト用の差し替え口）。
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_uri = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        Ok(Config {
            host: parse_or(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            store_uri: parse_value("DATABASE_URL", store_uri)?,
            environment: parse_or(&lookup, "APP_ENV", Environment::Production)?,
            connect_max_attempts: parse_or(
                &lookup,
                "STORE_CONNECT_MAX_ATTEMPTS",
                DEFAULT_CONNECT_MAX_ATTEMPTS,
            )?
            .max(1),
            connect_initial_delay: Duration::from_millis(parse_or(
                &lookup,
                "STORE_CONNECT_INITIAL_DELAY_MS",
                DEFAULT_CONNECT_INITIAL_DELAY_MS,
            )?),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => parse_value(key, value),
        _ => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_bind_all_interfaces() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "memory://")])).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.store_uri, StoreUri::Memory);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.connect_max_attempts, 5);
        assert_eq!(config.connect_initial_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_database_url_is_error() {
        let err = Config::from_lookup(lookup_from(&[("PORT", "8080")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
        assert_eq!(err.to_string(), "DATABASE_URL environment variable is required");
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "dynamodb://todos?endpoint=http://localhost:8000&region=us-east-1"),
            ("PORT", "8080"),
            ("HOST", "127.0.0.1"),
            ("APP_ENV", "development"),
            ("STORE_CONNECT_MAX_ATTEMPTS", "0"),
            ("STORE_CONNECT_INITIAL_DELAY_MS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:8080".parse().unwrap());
        assert!(config.environment.is_development());
        // 0 回は意味を持たないので 1 回に切り上げる
        assert_eq!(config.connect_max_attempts, 1);
        assert_eq!(config.connect_initial_delay, Duration::from_millis(10));
        assert_eq!(
            config.store_uri,
            StoreUri::DynamoDb {
                table: "todos".to_string(),
                endpoint: Some("http://localhost:8000".to_string()),
                region: Some("us-east-1".to_string()),
            }
        );
    }

    #[test]
    fn test_invalid_port_is_error() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("PORT", "not-a-port"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn test_store_uri_parsing() {
        assert_eq!(
            "dynamodb://todo-table".parse::<StoreUri>().unwrap(),
            StoreUri::DynamoDb {
                table: "todo-table".to_string(),
                endpoint: None,
                region: None,
            }
        );
        assert!("dynamodb://".parse::<StoreUri>().is_err());
        assert!("mongodb://localhost/todos".parse::<StoreUri>().is_err());
        assert!("dynamodb://t?foo=bar".parse::<StoreUri>().is_err());
        assert!("todo-table".parse::<StoreUri>().is_err());
    }
}
