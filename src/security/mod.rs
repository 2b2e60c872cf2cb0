// Start of file: /src/security/mod.rs

/*
    * Security services: event recording, threat detection, request inspection,
    * the authentication flows and the dashboard aggregation.
*/

pub mod aggregation;
pub mod audit;
pub mod auth;
pub mod detection;
pub mod inspection;

// End of file: /src/security/mod.rs
