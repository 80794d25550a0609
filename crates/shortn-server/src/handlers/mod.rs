mod health;
mod redirect;
mod submit;
mod vars;

pub use health::health_handler;
pub use redirect::{index_handler, redirect_handler};
pub use submit::{submit_handler, OWNER_HEADER};
pub use vars::vars_handler;
