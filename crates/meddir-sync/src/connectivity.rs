//! Network reachability signal
//!
//! [`ConnectivityMonitor`] is the `IConnectivity` implementation the
//! embedding application updates. Observers subscribe to a watch channel
//! and see every change, which is how a connectivity-restored trigger
//! reaches the scheduler.

use meddir_core::ports::IConnectivity;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    /// Records the current reachability.
    ///
    /// Returns `true` when this call moved the state from offline to online.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.tx.send_replace(online);
        if previous != online {
            info!(online, "Connectivity changed");
        }
        !previous && online
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl IConnectivity for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }
}
