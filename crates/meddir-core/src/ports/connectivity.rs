//! Network reachability signal (driven/secondary port)

/// Reports whether the remote authority is believed to be reachable
pub trait IConnectivity: Send + Sync {
    fn is_online(&self) -> bool;
}
