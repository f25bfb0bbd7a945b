pub mod chrome;
pub mod driver;
pub mod session;

pub use driver::{BrowserSessions, PageDriver};
pub use session::{SessionHandle, SessionManager};
