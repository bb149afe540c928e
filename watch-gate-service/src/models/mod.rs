pub mod content;
pub mod grant;
pub mod reply;

pub use content::ContentItem;
pub use grant::{grant_window, AccessState, Grant, UserIdentity, GRANT_WINDOW_HOURS};
pub use reply::Reply;
