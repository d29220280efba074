//! Signal handling for reload and graceful shutdown.
//!
//! SIGINT and SIGTERM request shutdown, SIGHUP requests a reload of every
//! extension. On Windows only Ctrl+C is supported.

use tokio::signal;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    Reload,
    Shutdown,
}

/// Listens for process signals for the lifetime of the host.
pub struct SignalListener {
    #[cfg(unix)]
    sigint: signal::unix::Signal,
    #[cfg(unix)]
    sigterm: signal::unix::Signal,
    #[cfg(unix)]
    sighup: signal::unix::Signal,
}

impl SignalListener {
    /// Installs the handlers. Must be called inside a tokio runtime.
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        #[cfg(unix)]
        {
            use signal::unix::{signal, SignalKind};

            Ok(Self {
                sigint: signal(SignalKind::interrupt())?,
                sigterm: signal(SignalKind::terminate())?,
                sighup: signal(SignalKind::hangup())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Waits for the next signal.
    pub async fn recv(&mut self) -> Result<HostSignal, Box<dyn std::error::Error>> {
        #[cfg(unix)]
        let received = tokio::select! {
            _ = self.sigint.recv() => HostSignal::Shutdown,
            _ = self.sigterm.recv() => HostSignal::Shutdown,
            _ = self.sighup.recv() => HostSignal::Reload,
        };

        #[cfg(not(unix))]
        let received = {
            signal::ctrl_c().await?;
            HostSignal::Shutdown
        };

        match received {
            HostSignal::Shutdown => info!("📡 Received shutdown signal - initiating graceful shutdown"),
            HostSignal::Reload => info!("📡 Received reload signal"),
        }
        Ok(received)
    }
}
