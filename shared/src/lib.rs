pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fees;
pub mod messages;
pub mod models;
pub mod sms;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
