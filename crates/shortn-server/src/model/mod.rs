mod link;

pub use link::{CreatedLink, HealthResponse, SubmitForm};
