//! Data models for the showcase application.
//!
//! Wire names are camelCase to match the web client.

mod coupon;
mod product;
mod review;
mod stats;
mod user;

pub use coupon::*;
pub use product::*;
pub use review::*;
pub use stats::*;
pub use user::*;
