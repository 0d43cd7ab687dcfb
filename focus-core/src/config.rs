//! Configuration types and utilities

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::FocusError;
use crate::logging::LoggingConfig;
use crate::Result;

/// Focus Startup Configuration
/// These settings are set at startup and do not change during runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusConfig {
    /// Address the interception proxy listens on
    pub listen_address: String,
    /// Port the interception proxy listens on
    pub listen_port: u16,
    /// Directory holding the blocklist and message files
    pub data_dir: PathBuf,
    /// Whether to register the proxy as the OS system proxy during a session
    pub register_system_proxy: bool,
    /// Activity log configuration
    pub activity: ActivityConfig,
    /// Certificate configuration
    pub certificate_config: CertificateConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            listen_port: 8888,
            data_dir: PathBuf::from("."),
            register_system_proxy: true,
            activity: ActivityConfig::default(),
            certificate_config: CertificateConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl FocusConfig {
    /// Socket address the proxy binds to
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.listen_address.parse().map_err(|e| {
            FocusError::Configuration(format!(
                "Invalid listen address '{}': {}",
                self.listen_address, e
            ))
        })?;
        Ok(SocketAddr::new(ip, self.listen_port))
    }

    /// `host:port` string handed to the OS proxy registration
    pub fn proxy_server(&self) -> String {
        format!("{}:{}", self.listen_address, self.listen_port)
    }
}

/// Activity log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityConfig {
    /// Maximum number of request outcomes kept in the rolling log
    pub capacity: usize,
    /// Number of most recent entries shown by the `log` command
    pub tail: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            tail: 20,
        }
    }
}

/// Certificate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Path to store the generated root CA
    pub cert_store_path: PathBuf,
    /// Number of leaf certificates cached by the proxy
    pub cache_size: u64,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            cert_store_path: PathBuf::from("./certs"),
            cache_size: 1000,
        }
    }
}
