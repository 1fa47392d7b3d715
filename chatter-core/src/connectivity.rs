use std::fmt;

use tokio::sync::watch;

/// Reachability as reported by the platform. Starts out `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    #[default]
    Unknown,
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_known(self) -> bool {
        self != Connectivity::Unknown
    }
}

impl From<Option<bool>> for Connectivity {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => Connectivity::Unknown,
            Some(true) => Connectivity::Online,
            Some(false) => Connectivity::Offline,
        }
    }
}

impl From<bool> for Connectivity {
    fn from(value: bool) -> Self {
        Some(value).into()
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Unknown => write!(f, "unknown"),
            Connectivity::Online => write!(f, "online"),
            Connectivity::Offline => write!(f, "offline"),
        }
    }
}

/// Creates a connectivity signal in the `Unknown` state.
pub fn signal() -> (watch::Sender<Connectivity>, watch::Receiver<Connectivity>) {
    watch::channel(Connectivity::Unknown)
}
