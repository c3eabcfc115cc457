//! 通用工具模块

pub mod coin;
pub mod link;
pub mod math;
pub mod retry;
pub mod time;
pub mod validation;

pub use math::*;
pub use retry::RetryPolicy;
pub use time::*;
