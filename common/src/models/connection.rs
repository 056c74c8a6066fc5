//! Connection configuration models.
//!
//! Contains models for the single runtime connection.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::{AppError, AppResult};

/// Database type enumeration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    /// MySQL database.
    MySQL,
    /// PostgreSQL database.
    Postgres,
    /// MongoDB document store.
    MongoDB,
}

impl DbType {
    /// Returns the default port for this database type.
    pub fn default_port(&self) -> u16 {
        match self {
            DbType::MySQL => 3306,
            DbType::Postgres => 5432,
            DbType::MongoDB => 27017,
        }
    }

    /// Whether the engine speaks SQL.
    pub fn is_relational(&self) -> bool {
        !matches!(self, DbType::MongoDB)
    }
}

impl FromStr for DbType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" => Ok(DbType::MySQL),
            "postgres" | "postgresql" => Ok(DbType::Postgres),
            "mongodb" | "mongo" => Ok(DbType::MongoDB),
            other => Err(AppError::UnsupportedDatabaseType(other.to_string())),
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::MySQL => write!(f, "mysql"),
            DbType::Postgres => write!(f, "postgres"),
            DbType::MongoDB => write!(f, "mongodb"),
        }
    }
}

/// Request body for `POST /connect`.
#[derive(Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    /// Database host.
    #[validate(length(min = 1, max = 255, message = "host is required"))]
    pub host: String,
    /// Database port; the engine default is used when absent.
    #[serde(default, deserialize_with = "deserialize_port")]
    #[schema(value_type = Option<u16>)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
    /// Engine tag: `mysql`, `postgres` or `mongodb`.
    #[serde(alias = "dbType")]
    #[validate(length(min = 1, message = "engineType is required"))]
    pub engine_type: String,
}

impl ConnectRequest {
    /// Validates the request and resolves the engine tag.
    pub fn into_config(self) -> AppResult<ConnectionConfig> {
        self.validate()?;
        let db_type: DbType = self.engine_type.parse()?;
        Ok(ConnectionConfig {
            port: self.port.unwrap_or_else(|| db_type.default_port()),
            host: self.host,
            username: self.username,
            password: self.password,
            database: self.database,
            db_type,
        })
    }
}

impl fmt::Debug for ConnectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("engine_type", &self.engine_type)
            .finish()
    }
}

/// Accepts the port either as a JSON number or a numeric string.
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match Option::<RawPort>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawPort::Number(port)) => Ok(Some(port)),
        Some(RawPort::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawPort::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {}", text))),
    }
}

/// Resolved configuration of the active connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub db_type: DbType,
}

impl ConnectionConfig {
    /// Connection URL for the engine's driver.
    pub fn url(&self) -> String {
        self.render_url(&encode_userinfo(&self.password))
    }

    /// Connection URL with the password masked, for logs.
    pub fn masked_url(&self) -> String {
        let mask = if self.password.is_empty() { "" } else { "****" };
        self.render_url(mask)
    }

    fn render_url(&self, password: &str) -> String {
        let scheme = match self.db_type {
            DbType::MySQL => "mysql",
            DbType::Postgres => "postgres",
            DbType::MongoDB => "mongodb",
        };
        let username = encode_userinfo(&self.username);
        let credentials = match (username.is_empty(), password.is_empty()) {
            (true, _) => String::new(),
            (false, true) => format!("{}@", username),
            (false, false) => format!("{}:{}@", username, password),
        };
        let mut url = format!(
            "{}://{}{}:{}/{}",
            scheme, credentials, self.host, self.port, self.database
        );
        if self.db_type == DbType::MongoDB && !credentials.is_empty() {
            url.push_str("?authSource=admin");
        }
        url
    }
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_userinfo(raw: &str) -> String {
    let mut encoded = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("db_type", &self.db_type)
            .finish()
    }
}

/// Connection item for API responses (excludes sensitive data).
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionItem {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub database: String,
    pub engine_type: DbType,
}

impl From<&ConnectionConfig> for ConnectionItem {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            database: config.database.clone(),
            engine_type: config.db_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: serde_json::Value) -> ConnectRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_engine_tags_parse() {
        assert_eq!("mysql".parse::<DbType>().unwrap(), DbType::MySQL);
        assert_eq!("Postgres".parse::<DbType>().unwrap(), DbType::Postgres);
        assert_eq!("mongodb".parse::<DbType>().unwrap(), DbType::MongoDB);
        assert!(matches!(
            "oracle".parse::<DbType>(),
            Err(AppError::UnsupportedDatabaseType(tag)) if tag == "oracle"
        ));
    }

    #[test]
    fn test_port_accepts_string_and_number() {
        let from_text = request(json!({"host": "db", "port": "3307", "engineType": "mysql"}));
        assert_eq!(from_text.port, Some(3307));
        let from_number = request(json!({"host": "db", "port": 5433, "dbType": "postgres"}));
        assert_eq!(from_number.port, Some(5433));
        assert_eq!(from_number.engine_type, "postgres");
    }

    #[test]
    fn test_missing_port_uses_engine_default() {
        let config = request(json!({"host": "db", "engineType": "mongodb", "database": "app"}))
            .into_config()
            .unwrap();
        assert_eq!(config.port, 27017);
        assert_eq!(config.url(), "mongodb://db:27017/app");
    }

    #[test]
    fn test_credentials_are_percent_encoded() {
        let config = request(json!({
            "host": "db", "username": "app", "password": "p@ss:w/rd",
            "database": "shop", "engineType": "mysql"
        }))
        .into_config()
        .unwrap();
        assert_eq!(config.url(), "mysql://app:p%40ss%3Aw%2Frd@db:3306/shop");
        assert_eq!(config.masked_url(), "mysql://app:****@db:3306/shop");
    }

    #[test]
    fn test_unknown_engine_is_configuration_error() {
        let err = request(json!({"host": "db", "engineType": "sqlite"}))
            .into_config()
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedDatabaseType(_)));
    }

    #[test]
    fn test_empty_host_fails_validation() {
        let err = request(json!({"host": "", "engineType": "mysql"}))
            .into_config()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("host")));
    }

    #[test]
    fn test_password_never_leaks_through_debug_or_masked_url() {
        let config = request(json!({
            "host": "db", "port": 5432, "username": "admin",
            "password": "s3cret", "database": "app", "engineType": "postgres"
        }))
        .into_config()
        .unwrap();
        assert_eq!(config.url(), "postgres://admin:s3cret@db:5432/app");
        assert!(!config.masked_url().contains("s3cret"));
        assert!(!format!("{:?}", config).contains("s3cret"));
        assert!(serde_json::to_string(&ConnectionItem::from(&config))
            .map(|s| !s.contains("s3cret"))
            .unwrap());
    }
}
