// Start of file: /src/api/mod.rs

/*
    * HTTP surface: auth gateway, security operations endpoints, health,
    * and the middleware guarding them.
*/

pub mod auth;
pub mod error;
pub mod health;
pub mod middleware;
pub mod security;

// End of file: /src/api/mod.rs
