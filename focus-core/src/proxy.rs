use crate::{
    ca::CertificateAuthority, error::FocusError, handlers::FocusHandler,
    interceptor::InterceptionHandler, Result,
};
use async_trait::async_trait;
use hudsucker::{certificate_authority::RcgenAuthority, rustls, ProxyBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// How long `stop` waits for in-flight connections before aborting the proxy task
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// How long `start` waits to see whether the proxy task dies immediately
const STARTUP_GRACE: Duration = Duration::from_millis(50);

/// The interception engine driven by the session controller.
///
/// `stop` must be idempotent: stopping a transport that is not running is a no-op.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start listening on `addr`, answering every request through `handler`.
    async fn start(&mut self, addr: SocketAddr, handler: InterceptionHandler) -> Result<()>;

    async fn stop(&mut self);

    fn is_running(&self) -> bool;
}

struct RunningProxy {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// HTTP/HTTPS MITM transport backed by hudsucker
pub struct HudsuckerTransport {
    ca: Arc<CertificateAuthority>,
    cache_size: u64,
    running: Option<RunningProxy>,
}

impl HudsuckerTransport {
    pub fn new(ca: Arc<CertificateAuthority>) -> Self {
        Self {
            ca,
            cache_size: 1000,
            running: None,
        }
    }

    pub fn with_cache_size(mut self, cache_size: u64) -> Self {
        self.cache_size = cache_size;
        self
    }

    fn authority(&self) -> Result<RcgenAuthority> {
        // Hudsucker/Rustls expects DER, not PEM.
        let private_key = rustls::PrivateKey(self.ca.key_der());
        let ca_cert = rustls::Certificate(self.ca.cert_der()?);

        RcgenAuthority::new(private_key, ca_cert, self.cache_size).map_err(|e| {
            FocusError::Certificate(format!("Failed to create CA authority: {}", e))
        })
    }
}

#[async_trait]
impl Transport for HudsuckerTransport {
    async fn start(&mut self, addr: SocketAddr, handler: InterceptionHandler) -> Result<()> {
        if self.running.is_some() {
            warn!("Proxy already running, restarting");
            self.stop().await;
        }

        // Surface port-in-use synchronously; hudsucker only binds inside its run future.
        let reserved = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            FocusError::Network(format!("Failed to bind proxy port {}: {}", addr, e))
        })?;
        drop(reserved);

        let authority = self.authority()?;

        let proxy = ProxyBuilder::new()
            .with_addr(addr)
            .with_rustls_client()
            .with_ca(authority)
            .with_http_handler(FocusHandler::new(handler))
            .build();

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let signal = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = proxy.start(signal).await {
                error!("Proxy failed: {}", e);
            }
        });

        tokio::time::sleep(STARTUP_GRACE).await;
        if task.is_finished() {
            return Err(FocusError::Network(format!(
                "Proxy on {} exited during startup",
                addr
            )));
        }

        info!("Interception proxy listening on {}", addr);
        self.running = Some(RunningProxy {
            addr,
            shutdown,
            task,
        });
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.shutdown.send(());
        let abort = running.task.abort_handle();
        match tokio::time::timeout(SHUTDOWN_GRACE, running.task).await {
            Ok(_) => info!("Interception proxy on {} stopped", running.addr),
            Err(_) => {
                warn!(
                    "Proxy on {} did not drain within {:?}, aborting",
                    running.addr, SHUTDOWN_GRACE
                );
                abort.abort();
            }
        }
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for HudsuckerTransport {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.shutdown.send(());
            running.task.abort();
        }
    }
}
