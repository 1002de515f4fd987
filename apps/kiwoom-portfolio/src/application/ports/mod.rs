//! Application Ports
//!
//! Ports define the interfaces the portfolio service drives.
//! - `AccountPort`: fetches the account evaluation balance
//! - `SubscriptionPort`: registers instruments with the realtime feed

mod account_port;
mod subscription_port;

#[cfg(test)]
pub use account_port::MockAccountPort;
pub use account_port::{AccountError, AccountPort};
#[cfg(test)]
pub use subscription_port::MockSubscriptionPort;
pub use subscription_port::{SubscriptionError, SubscriptionPort};
