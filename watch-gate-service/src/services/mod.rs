pub mod access;
pub mod challenge;
pub mod clock;
pub mod grant_store;
pub mod lookup;
pub mod metrics;
pub mod providers;
pub mod throttle;

pub use access::{AccessDecision, AccessEngine, VerificationFailure};
pub use challenge::ChallengeBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use grant_store::{
    GrantBackend, GrantStore, JsonFileBackend, MemoryBackend, StoreError, UserLock,
};
pub use lookup::{ContentLookup, LookupOutcome};
pub use metrics::{get_metrics, init_metrics};
pub use providers::{
    AccessToken, CatalogError, ContentCatalog, GoogleMembershipVerifier, MembershipVerifier,
    MockVerifier, ProviderError, ScrapedCatalog, StaticCatalog, VerificationProof,
};
pub use throttle::{UserThrottle, Verdict};
