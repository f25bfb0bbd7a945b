pub mod auth;
pub mod collect;
pub mod describe;
pub mod enrich;
pub mod site;

pub use auth::{classify_post_login_url, perform_login, LoginOutcome};
pub use collect::{collect_pages, CollectError, CollectOutcome};
pub use enrich::{enrich_offers, EnrichOutcome};
pub use site::SiteProfile;
