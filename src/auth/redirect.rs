//! Entry point for OAuth callbacks arriving from outside the process.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::Url;
use strum::{Display, EnumString};
use tokio::sync::mpsc;

use super::error::AuthError;
use crate::config::OAuthConfig;

/// Source identifier the loopback listener presents for its callbacks.
pub const LOOPBACK_SOURCE: &str = "ghlogin.loopback";

/// What to do with a callback that carries no source identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum MissingSourcePolicy {
    /// Refuse the callback.
    #[default]
    Reject,
    /// Accept the callback but publish nothing.
    PassThrough,
    /// Treat the callback as coming from the trusted source.
    Trust,
}

/// A callback URL accepted by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEvent {
    pub url: Url,
}

struct Slot {
    id: u64,
    tx: mpsc::UnboundedSender<CallbackEvent>,
}

/// Validates where a callback came from and hands it to the current
/// login attempt.
///
/// At most one [`CallbackSubscription`] is live at a time; dropping it
/// detaches the subscriber.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use ghlogin::auth::RedirectBridge;
///
/// let bridge = Arc::new(RedirectBridge::new("ghlogin.loopback"));
/// let url = "http://127.0.0.1:8765/callback?code=abc".parse().unwrap();
/// assert!(!bridge.handle_incoming_callback(Some("com.example.other"), &url));
/// ```
pub struct RedirectBridge {
    trusted_source: String,
    missing_source: MissingSourcePolicy,
    slot: Mutex<Option<Slot>>,
    next_id: AtomicU64,
}

impl RedirectBridge {
    pub fn new(trusted_source: impl Into<String>) -> Self {
        Self {
            trusted_source: trusted_source.into(),
            missing_source: MissingSourcePolicy::default(),
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(config: &OAuthConfig) -> Self {
        Self::new(config.trusted_source.clone()).with_missing_source_policy(config.missing_source)
    }

    pub fn with_missing_source_policy(mut self, policy: MissingSourcePolicy) -> Self {
        self.missing_source = policy;
        self
    }

    pub fn trusted_source(&self) -> &str {
        &self.trusted_source
    }

    pub fn missing_source_policy(&self) -> MissingSourcePolicy {
        self.missing_source
    }

    /// Attach the subscriber for the next callback.
    pub fn subscribe(self: &Arc<Self>) -> Result<CallbackSubscription, AuthError> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(AuthError::LoginInProgress);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(Slot { id, tx });
        tracing::debug!(subscription = id, "callback subscriber attached");
        Ok(CallbackSubscription {
            bridge: Arc::clone(self),
            id,
            rx,
        })
    }

    pub fn has_subscriber(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Accept or refuse a callback invocation.
    ///
    /// Returns `true` when the callback is accepted. Accepted callbacks from
    /// the trusted source are published to the live subscriber, if any.
    pub fn handle_incoming_callback(&self, source: Option<&str>, url: &Url) -> bool {
        match source {
            Some(source) if source == self.trusted_source => {
                self.publish(url);
                true
            }
            Some(source) => {
                tracing::warn!(source, "rejected callback from untrusted source");
                false
            }
            None => match self.missing_source {
                MissingSourcePolicy::Reject => {
                    tracing::warn!("rejected callback without a source identifier");
                    false
                }
                MissingSourcePolicy::PassThrough => {
                    tracing::debug!("accepted callback without a source identifier; not published");
                    true
                }
                MissingSourcePolicy::Trust => {
                    self.publish(url);
                    true
                }
            },
        }
    }

    fn publish(&self, url: &Url) {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(slot) = slot.as_ref() else {
            tracing::warn!("callback accepted with no login attempt waiting; dropped");
            return;
        };
        let event = CallbackEvent { url: url.clone() };
        if slot.tx.send(event).is_err() {
            tracing::warn!(subscription = slot.id, "callback subscriber gone; dropped");
        }
    }

    fn detach(&self, id: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|s| s.id == id) {
            *slot = None;
            tracing::debug!(subscription = id, "callback subscriber detached");
        }
    }
}

impl std::fmt::Debug for RedirectBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectBridge")
            .field("trusted_source", &self.trusted_source)
            .field("missing_source", &self.missing_source)
            .field("subscribed", &self.has_subscriber())
            .finish()
    }
}

/// Receives callbacks for one login attempt. Unsubscribes on drop.
#[derive(Debug)]
pub struct CallbackSubscription {
    bridge: Arc<RedirectBridge>,
    id: u64,
    rx: mpsc::UnboundedReceiver<CallbackEvent>,
}

impl CallbackSubscription {
    pub async fn recv(&mut self) -> Option<CallbackEvent> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CallbackEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for CallbackSubscription {
    fn drop(&mut self) {
        self.bridge.detach(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback_url() -> Url {
        "http://127.0.0.1:8765/callback?code=abc123&state=s1"
            .parse()
            .unwrap()
    }

    fn bridge(policy: MissingSourcePolicy) -> Arc<RedirectBridge> {
        Arc::new(RedirectBridge::new(LOOPBACK_SOURCE).with_missing_source_policy(policy))
    }

    #[test]
    fn trusted_source_publishes_exactly_one_event() {
        let bridge = bridge(MissingSourcePolicy::Reject);
        let mut sub = bridge.subscribe().unwrap();
        assert!(bridge.handle_incoming_callback(Some(LOOPBACK_SOURCE), &callback_url()));
        let event = sub.try_recv().expect("event published");
        assert_eq!(event.url, callback_url());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn untrusted_source_is_rejected_without_event() {
        let bridge = bridge(MissingSourcePolicy::Trust);
        let mut sub = bridge.subscribe().unwrap();
        assert!(!bridge.handle_incoming_callback(Some("com.example.other"), &callback_url()));
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn missing_source_policies() {
        let reject = bridge(MissingSourcePolicy::Reject);
        let mut sub = reject.subscribe().unwrap();
        assert!(!reject.handle_incoming_callback(None, &callback_url()));
        assert!(sub.try_recv().is_none());

        let pass = bridge(MissingSourcePolicy::PassThrough);
        let mut sub = pass.subscribe().unwrap();
        assert!(pass.handle_incoming_callback(None, &callback_url()));
        assert!(sub.try_recv().is_none());

        let trust = bridge(MissingSourcePolicy::Trust);
        let mut sub = trust.subscribe().unwrap();
        assert!(trust.handle_incoming_callback(None, &callback_url()));
        assert!(sub.try_recv().is_some());
    }

    #[test]
    fn only_one_subscription_at_a_time() {
        let bridge = bridge(MissingSourcePolicy::Reject);
        let sub = bridge.subscribe().unwrap();
        assert_eq!(bridge.subscribe().unwrap_err(), AuthError::LoginInProgress);
        drop(sub);
        assert!(!bridge.has_subscriber());
        assert!(bridge.subscribe().is_ok());
    }

    #[test]
    fn trusted_callback_without_subscriber_is_still_accepted() {
        let bridge = bridge(MissingSourcePolicy::Reject);
        assert!(bridge.handle_incoming_callback(Some(LOOPBACK_SOURCE), &callback_url()));
    }

    #[test]
    fn policy_parses_from_kebab_case() {
        assert_eq!(
            "pass-through".parse::<MissingSourcePolicy>().unwrap(),
            MissingSourcePolicy::PassThrough
        );
        assert_eq!(MissingSourcePolicy::Trust.to_string(), "trust");
    }
}
