//! API routes.

pub mod cache;
pub mod health;
pub mod nas;
pub mod pihole;

pub use cache::cache_routes;
pub use health::health_routes;
pub use nas::nas_routes;
pub use pihole::pihole_routes;
