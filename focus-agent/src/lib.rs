//! Focuswall Binary
//!
//! Interactive focus-mode blocker. Loads the blocklist and messages, prepares the
//! local certificate authority, and drives focus sessions from a command shell.

use clap::Parser;
use focus_core::logging::levels;
use focus_core::{
    CertificateAuthority, FocusConfig, FocusStore, HudsuckerTransport, NoopSystemProxy,
    PlatformSystemProxy, SessionContext, SessionController, SessionEvent, SystemProxy,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

pub mod shell;
use shell::{Flow, Shell};

#[derive(Parser, Debug, Clone)]
#[command(name = "focuswall", author, version, about, long_about = None)]
pub struct Args {
    /// Address the interception proxy listens on
    #[arg(long, default_value = "127.0.0.1")]
    pub listen_addr: String,

    /// Port the interception proxy listens on
    #[arg(long, default_value_t = 8888)]
    pub listen_port: u16,

    /// Directory holding blocked_sites.json and messages.json
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Directory for the root CA (defaults to <data-dir>/certs)
    #[arg(long)]
    pub ca_dir: Option<PathBuf>,

    /// Do not register the proxy with the OS; configure the browser manually
    #[arg(long)]
    pub no_system_proxy: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", value_parser = parse_log_level)]
    pub log_level: String,

    /// Also write logs to this file
    #[arg(long)]
    pub log_file: Option<String>,
}

impl Args {
    /// Map command line arguments onto the startup configuration
    pub fn to_config(&self) -> FocusConfig {
        let mut config = FocusConfig {
            listen_address: self.listen_addr.clone(),
            listen_port: self.listen_port,
            data_dir: self.data_dir.clone(),
            register_system_proxy: !self.no_system_proxy,
            ..Default::default()
        };
        config.certificate_config.cert_store_path = self
            .ca_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("certs"));
        config.logging.level = self.log_level.clone();
        config.logging.log_file = self.log_file.clone();
        config
    }
}

fn parse_log_level(level: &str) -> Result<String, String> {
    if levels::is_valid_level(level) {
        Ok(level.to_lowercase())
    } else {
        Err(format!("expected trace, debug, info, warn or error, got '{}'", level))
    }
}

/// Build the session controller and everything it depends on
pub fn build_controller(config: &FocusConfig) -> anyhow::Result<(SessionController, FocusStore)> {
    let store = FocusStore::new(&config.data_dir)?;
    let context = Arc::new(SessionContext::new(
        store.load_blocklist(),
        store.load_messages(),
        config.activity.capacity,
    ));

    let ca = Arc::new(CertificateAuthority::new(
        &config.certificate_config.cert_store_path,
    )?);
    tracing::info!("Root CA at {}", ca.cert_path().display());
    let transport =
        HudsuckerTransport::new(ca).with_cache_size(config.certificate_config.cache_size);

    let system_proxy: Arc<dyn SystemProxy> = if config.register_system_proxy {
        Arc::new(PlatformSystemProxy::new())
    } else {
        Arc::new(NoopSystemProxy)
    };
    tracing::info!("System proxy mode: {}", system_proxy.name());

    let controller = SessionController::new(config, context, Box::new(transport), system_proxy)?;
    Ok((controller, store))
}

/// Run the interactive shell until `exit`, end of input or Ctrl-C.
///
/// Any active session is torn down before returning.
pub async fn run(config: FocusConfig) -> anyhow::Result<()> {
    let (controller, store) = build_controller(&config)?;

    let mut shell = Shell::new(
        controller.clone(),
        store,
        std::io::stdout(),
        config.activity.tail,
        config.proxy_server(),
    );

    let notifier = tokio::spawn(announce_expiry(controller.clone()));

    shell.banner()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result: anyhow::Result<()> = loop {
        if let Err(e) = shell.prompt() {
            break Err(e.into());
        }
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match shell.execute(&line).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Exit) => break Ok(()),
                    Err(e) => break Err(e),
                },
                Ok(None) => break Ok(()),
                Err(e) => break Err(e.into()),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break Ok(());
            }
        }
    };

    controller.shutdown().await;
    notifier.abort();
    shell.farewell()?;
    result
}

async fn announce_expiry(controller: SessionController) {
    let mut events = controller.subscribe();
    loop {
        match events.recv().await {
            Ok(SessionEvent::Expired { .. }) => {
                println!("\n🔔 Focus complete – proxy turned off.");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Missed {} session events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_args_match_default_config() {
        let args = Args::try_parse_from(["focuswall"]).unwrap();
        let config = args.to_config();
        let defaults = FocusConfig::default();

        assert_eq!(config.listen_address, defaults.listen_address);
        assert_eq!(config.listen_port, 8888);
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(
            config.certificate_config.cert_store_path,
            PathBuf::from("./certs")
        );
        assert!(config.register_system_proxy);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.log_file.is_none());
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::try_parse_from([
            "focuswall",
            "--listen-addr",
            "0.0.0.0",
            "--listen-port",
            "9999",
            "--data-dir",
            "/tmp/focus",
            "--ca-dir",
            "/tmp/ca",
            "--no-system-proxy",
            "--log-level",
            "debug",
            "--log-file",
            "focus.log",
        ])
        .unwrap();
        let config = args.to_config();

        assert_eq!(config.proxy_server(), "0.0.0.0:9999");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/focus"));
        assert_eq!(
            config.certificate_config.cert_store_path,
            PathBuf::from("/tmp/ca")
        );
        assert!(!config.register_system_proxy);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.log_file.as_deref(), Some("focus.log"));
    }

    #[test]
    fn test_ca_dir_follows_data_dir() {
        let args = Args::try_parse_from(["focuswall", "--data-dir", "state"]).unwrap();
        assert_eq!(
            args.to_config().certificate_config.cert_store_path,
            PathBuf::from("state/certs")
        );
    }

    #[test]
    fn test_log_level_validated() {
        assert!(Args::try_parse_from(["focuswall", "--log-level", "verbose"]).is_err());
        let args = Args::try_parse_from(["focuswall", "--log-level", "INFO"]).unwrap();
        assert_eq!(args.to_config().logging.level, "info");
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Args::try_parse_from(["focuswall", "--listen-port", "70000"]).is_err());
    }

    #[tokio::test]
    async fn test_build_controller_initialises_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let args = Args::try_parse_from([
            "focuswall",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "--no-system-proxy",
        ])
        .unwrap();

        let (controller, store) = build_controller(&args.to_config()).unwrap();
        assert!(!controller.is_active().await);
        assert!(store.blocklist_path().exists());
        assert!(store.messages_path().exists());
        assert!(dir.path().join("certs").join("ca.pem").exists());
        assert!(!controller.context().blocklist().is_empty());
    }
}
