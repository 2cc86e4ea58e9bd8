use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use lettre::message::Mailbox;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub store_timeout: Duration,
    pub mailer: MailerConfig,
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Duration,
    pub from: Mailbox,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://journey.db".to_string());
        let listen_addr = parse_var("APP_LISTEN_ADDR", "127.0.0.1:8080")?;
        let store_timeout = Duration::from_millis(parse_var("STORE_TIMEOUT_MS", "5000")?);

        let mailer = MailerConfig {
            host: env::var("MAILER_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: parse_var("MAILER_PORT", "1025")?,
            username: optional_var("MAILER_USERNAME"),
            password: optional_var("MAILER_PASSWORD"),
            timeout: Duration::from_millis(parse_var("MAILER_TIMEOUT_MS", "30000")?),
            from: parse_var("MAIL_FROM", "Journey <noreply@journey.local>")?,
        };

        Ok(Self {
            database_url,
            listen_addr,
            store_timeout,
            mailer,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|err| AppError::Config(format!("invalid {name}: {err}")))
}
