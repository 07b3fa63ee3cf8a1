use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};
use tracing::{info, warn};

#[async_trait::async_trait]
#[typetag::serde]
pub trait ConfigManagerType: Send + Sync {
    async fn keys(&self) -> Vec<String>;
    async fn get(&self, key: &str) -> Option<String>;
    async fn del(&self, key: &str);
    async fn set(&self, key: &str, value: &str) -> Result<(), String>;
    fn clone_box(&self) -> Box<dyn ConfigManagerType>;
    fn debug_box(&self) -> String;
}

#[derive(Serialize, Deserialize)]
pub struct ConfigManager(pub Box<dyn ConfigManagerType>);

impl Clone for ConfigManager {
    fn clone(&self) -> Self {
        ConfigManager(self.0.clone_box())
    }
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.debug_box())
    }
}

/// Reads the process environment, seeded from an optional `.env` file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvConfigManager {
    env_file: PathBuf,
}

impl EnvConfigManager {
    pub fn new(env_file: PathBuf) -> Box<Self> {
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => info!("Loaded .env from {}", env_file.display()),
                Err(err) => warn!("could not parse .env at {}: {err}", env_file.display()),
            }
        } else {
            info!("no .env at {}, using process environment", env_file.display())
        }

        Box::new(Self { env_file })
    }
}

#[typetag::serde]
#[async_trait]
impl ConfigManagerType for EnvConfigManager {
    async fn keys(&self) -> Vec<String> {
        env::vars().map(|(k, _)| k).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        unsafe {
            env::set_var(key, value);
        };
        let content = fs::read_to_string(&self.env_file).unwrap_or_default();
        let mut found = false;
        let mut lines: Vec<String> = content
            .lines()
            .map(|line| match line.split_once('=') {
                Some((k, _)) if k.trim() == key => {
                    found = true;
                    format!("{key}={value}")
                }
                _ => line.to_string(),
            })
            .collect();
        if !found {
            lines.push(format!("{key}={value}"));
        }

        fs::write(&self.env_file, lines.join("\n")).map_err(|e| e.to_string())
    }

    async fn del(&self, key: &str) {
        unsafe {
            env::remove_var(key);
        };
        if let Ok(content) = fs::read_to_string(&self.env_file) {
            let lines: Vec<&str> = content
                .lines()
                .filter(|line| match line.split_once('=') {
                    Some((k, _)) => k.trim() != key,
                    None => true,
                })
                .collect();

            let _ = fs::write(&self.env_file, lines.join("\n"));
        }
    }

    fn clone_box(&self) -> Box<dyn ConfigManagerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        "EnvConfigManager".to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfigManager {
    map: DashMap<String, String>,
}

impl MapConfigManager {
    pub fn new() -> Box<Self> {
        Box::new(Self::default())
    }
}

#[typetag::serde]
#[async_trait]
impl ConfigManagerType for MapConfigManager {
    async fn keys(&self) -> Vec<String> {
        self.map.iter().map(|entry| entry.key().clone()).collect()
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).map(|v| v.clone())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) {
        self.map.remove(key);
    }

    fn clone_box(&self) -> Box<dyn ConfigManagerType> {
        Box::new(self.clone())
    }

    fn debug_box(&self) -> String {
        format!("MapConfigManager({} entries)", self.map.len())
    }
}

/// Options handed to every worker constructor.
///
/// The broker fields are for transports that talk to an AMQP broker; the
/// built-in workers run in-process and only read `request_timeout_secs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkerOptions {
    pub hostname: String,
    pub port: u16,
    pub vhost: String,
    pub username: String,
    pub password: String,
    /// Upper bound on one outgoing HTTP request made by a worker.
    pub request_timeout_secs: u64,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 5672,
            vhost: "/".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl WorkerOptions {
    /// Defaults overridden by `AMQP_HOST`, `AMQP_PORT`, `AMQP_VHOST`,
    /// `AMQP_USERNAME`, `AMQP_PASSWORD` and `JUNCTION_REQUEST_TIMEOUT_SECS`
    /// where the config has them.
    pub async fn from_config(config: &ConfigManager) -> anyhow::Result<Self> {
        let mut options = Self::default();
        if let Some(host) = config.0.get("AMQP_HOST").await {
            options.hostname = host;
        }
        if let Some(port) = config.0.get("AMQP_PORT").await {
            options.port = port
                .trim()
                .parse()
                .with_context(|| format!("AMQP_PORT `{port}` is not a port number"))?;
        }
        if let Some(vhost) = config.0.get("AMQP_VHOST").await {
            options.vhost = vhost;
        }
        if let Some(username) = config.0.get("AMQP_USERNAME").await {
            options.username = username;
        }
        if let Some(password) = config.0.get("AMQP_PASSWORD").await {
            options.password = password;
        }
        if let Some(secs) = config.0.get("JUNCTION_REQUEST_TIMEOUT_SECS").await {
            options.request_timeout_secs = secs.trim().parse().with_context(|| {
                format!("JUNCTION_REQUEST_TIMEOUT_SECS `{secs}` is not a number of seconds")
            })?;
        }
        Ok(options)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
