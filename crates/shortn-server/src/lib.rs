//! HTTP front end for the shortn URL shortener.
//!
//! Serves redirects for short links, accepts new links from authenticated
//! users, and publishes process counters as JSON.

pub mod app;
pub mod error;
pub mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use state::AppState;
