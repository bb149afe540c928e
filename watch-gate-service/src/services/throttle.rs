use crate::models::UserIdentity;
use dashmap::DashSet;
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type KeyedLimiter = RateLimiter<UserIdentity, DashMapStateStore<UserIdentity>, DefaultClock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Over quota. `notify` is set only for the first rejected message of a
    /// burst so a flooding user gets one warning, not one per message.
    Throttled { notify: bool },
}

/// Per-user flood control for inbound chat messages.
#[derive(Clone)]
pub struct UserThrottle {
    limiter: Arc<KeyedLimiter>,
    warned: Arc<DashSet<UserIdentity>>,
}

impl UserThrottle {
    /// Allow `per_minute` messages per user, all of them usable as a burst.
    pub fn per_minute(per_minute: u32) -> Self {
        let burst = NonZeroU32::new(per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::dashmap(Quota::per_minute(burst))),
            warned: Arc::new(DashSet::new()),
        }
    }

    pub fn check(&self, user: &UserIdentity) -> Verdict {
        if self.limiter.check_key(user).is_ok() {
            self.warned.remove(user);
            return Verdict::Allowed;
        }
        Verdict::Throttled {
            notify: self.warned.insert(user.clone()),
        }
    }

    /// Drop limiter state for users whose quota has fully replenished, and
    /// forget who was warned. A user still flooding after a sweep is warned
    /// once more.
    pub fn sweep(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        self.warned.clear();
        self.warned.shrink_to_fit();
    }
}
