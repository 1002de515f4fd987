//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with the brokerage.

/// Port interfaces for the account source and the realtime feed.
pub mod ports;

/// Application services for portfolio refresh and valuation.
pub mod services;
