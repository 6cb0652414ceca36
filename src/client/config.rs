//! Socket options applied before the client connects.

use std::{io, time::Duration};

use socket2::{SockRef, TcpKeepalive};
use tokio::net::TcpSocket;

/// TCP options for the control connection.
///
/// Unset options keep the operating system defaults.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use gbxremote::client::SocketOptions;
///
/// let options = SocketOptions::default()
///     .nodelay(true)
///     .keepalive(Some(Duration::from_secs(30)));
/// assert_ne!(options, SocketOptions::default());
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SocketOptions {
    nodelay: Option<bool>,
    keepalive: Option<Toggle>,
    linger: Option<Toggle>,
}

/// An option that is either switched off or on with a duration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Toggle {
    Disabled,
    Duration(Duration),
}

impl Toggle {
    fn from_option(value: Option<Duration>) -> Self {
        value.map_or(Self::Disabled, Self::Duration)
    }

    const fn to_option(self) -> Option<Duration> {
        match self {
            Self::Disabled => None,
            Self::Duration(value) => Some(value),
        }
    }
}

impl SocketOptions {
    /// Configure `TCP_NODELAY`.
    ///
    /// Requests are small and latency-sensitive, so enabling this is usually
    /// worthwhile against a remote server.
    #[must_use]
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.nodelay = Some(enabled);
        self
    }

    /// Configure `SO_KEEPALIVE`; `Some` also sets the idle time before
    /// probes start.
    #[must_use]
    pub fn keepalive(mut self, duration: Option<Duration>) -> Self {
        self.keepalive = Some(Toggle::from_option(duration));
        self
    }

    /// Configure `SO_LINGER`.
    #[must_use]
    pub fn linger(mut self, duration: Option<Duration>) -> Self {
        self.linger = Some(Toggle::from_option(duration));
        self
    }

    pub(crate) fn apply(&self, socket: &TcpSocket) -> io::Result<()> {
        if let Some(enabled) = self.nodelay {
            socket.set_nodelay(enabled)?;
        }
        if let Some(keepalive) = self.keepalive {
            match keepalive.to_option() {
                Some(duration) => {
                    socket.set_keepalive(true)?;
                    let config = TcpKeepalive::new().with_time(duration);
                    SockRef::from(socket).set_tcp_keepalive(&config)?;
                }
                None => socket.set_keepalive(false)?,
            }
        }
        if let Some(linger) = self.linger {
            socket.set_linger(linger.to_option())?;
        }
        Ok(())
    }
}
