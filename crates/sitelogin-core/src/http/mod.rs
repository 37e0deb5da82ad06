//! Cookie-carrying HTTP session used by the scraped login flow and handed
//! to consumers for authenticated calls.

pub mod session;

pub use session::HttpSession;
