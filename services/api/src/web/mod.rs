pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the pieces the server binary wires together.
pub use middleware::require_admin;
pub use rest::ApiDoc;
