// Probe Shutdown Token

use tokio::sync::watch;

/// What asked the process to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    /// Ctrl+C / SIGINT
    Interrupt,
    /// SIGTERM from a supervisor
    Terminate,
}

/// Shutdown signal observed by the probe while it sleeps or measures
#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<Option<StopTrigger>>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.rx.borrow().is_some()
    }

    pub fn trigger(&self) -> Option<StopTrigger> {
        *self.rx.borrow()
    }

    /// Wait for a shutdown request
    ///
    /// Never completes if the sender is dropped without requesting one.
    pub async fn wait(&mut self) -> StopTrigger {
        let trigger = match self.rx.wait_for(Option::is_some).await {
            Ok(current) => *current,
            Err(_) => None,
        };
        match trigger {
            Some(trigger) => trigger,
            None => std::future::pending().await,
        }
    }
}

/// Shutdown sender
pub struct ShutdownSender {
    tx: watch::Sender<Option<StopTrigger>>,
}

impl ShutdownSender {
    /// Request shutdown; the first trigger wins
    pub fn shutdown(&self, trigger: StopTrigger) {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(trigger);
                true
            } else {
                false
            }
        });
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(None);
    (ShutdownSender { tx }, ShutdownToken { rx })
}
