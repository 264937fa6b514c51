pub mod auth;
pub mod log_route;

pub use auth::AccessToken;
pub use log_route::log_route;
