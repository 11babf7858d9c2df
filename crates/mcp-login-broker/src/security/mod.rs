//! Cookie-based protections for the authorization flow.
//!
//! Each mechanism guards against a distinct threat:
//! - [`csrf`]: cross-site submission of the consent form
//! - [`session`]: replay of a state token from a different browser session
//! - [`approval`]: forged or tampered consent records

pub mod approval;
pub mod csrf;
pub mod session;

pub use approval::ApprovalCache;
pub use session::{BindingCheck, SessionBinder};
