use tokio::sync::mpsc;
use tracing::warn;

use crate::config::Config;

/// Navigation sink invoked when a session cannot be recovered.
///
/// Fire-and-forget: implementations must not block and never fail the caller.
pub trait LoginRedirect: Send + Sync {
    fn redirect_to_login(&self);
}

/// Any `Fn()` closure works as a redirect, handy for hosts with their own router.
impl<F> LoginRedirect for F
where
    F: Fn() + Send + Sync,
{
    fn redirect_to_login(&self) {
        self()
    }
}

/// Publishes the login route to the host application's router over a channel.
#[derive(Debug, Clone)]
pub struct ChannelRedirect {
    route: String,
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelRedirect {
    /// Create a redirect plus the receiver the router should drain.
    pub fn new(route: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                route: route.into(),
                tx,
            },
            rx,
        )
    }

    /// Redirect to the configured `login_route`.
    pub fn from_config(config: &Config) -> (Self, mpsc::UnboundedReceiver<String>) {
        Self::new(config.login_route.clone())
    }
}

impl LoginRedirect for ChannelRedirect {
    fn redirect_to_login(&self) {
        if let Err(e) = self.tx.send(self.route.clone()) {
            warn!(route = %e.0, "Login redirect dropped - router channel closed");
        }
    }
}
