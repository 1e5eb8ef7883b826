//! The household dashboard: headline figures and chart configurations.

mod charts;
mod handlers;

pub use handlers::get_dashboard_endpoint;
