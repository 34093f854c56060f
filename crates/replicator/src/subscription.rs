//! Storage subscription status.
//!
//! Reports whether the signing account has paid-up storage. Nothing here
//! buys or renews storage.

use pinset_chain::ChainQuery;
use tracing::{debug, warn};

/// Classified storage subscription of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// Paid storage ends at `end` (unix seconds), beyond the warning window.
    Active {
        /// Subscription end, unix seconds.
        end: u64,
    },
    /// Paid storage ends within the warning window.
    ExpiringSoon {
        /// Subscription end, unix seconds.
        end: u64,
    },
    /// No subscription could be found.
    Missing,
}

impl SubscriptionStatus {
    /// Whether the account should buy or renew storage soon.
    pub fn needs_attention(&self) -> bool {
        !matches!(self, SubscriptionStatus::Active { .. })
    }
}

/// Reads and classifies the subscription of `account` at `now_unix`.
///
/// A failed query counts as [`SubscriptionStatus::Missing`].
pub async fn check_subscription(
    chain: &dyn ChainQuery,
    account: &str,
    now_unix: u64,
    window_secs: u64,
) -> SubscriptionStatus {
    let info = match chain.storage_payment_info(account).await {
        Ok(info) => info,
        Err(e) => {
            debug!(account, error = %e, "no storage subscription");
            return SubscriptionStatus::Missing;
        }
    };
    if info.end < now_unix.saturating_add(window_secs) {
        warn!(account, end = info.end, "storage subscription expiring");
        SubscriptionStatus::ExpiringSoon { end: info.end }
    } else {
        SubscriptionStatus::Active { end: info.end }
    }
}
