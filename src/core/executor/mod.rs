//! 执行器模块
//!
//! 负责交易的编码、提交、授权和确认

pub mod allowance;
pub mod confirmation;
pub mod operation;
pub mod submitter;

// 重新导出主要的公共接口
pub use allowance::AllowanceManager;
pub use confirmation::ConfirmationWaiter;
pub use operation::{GasPolicy, Operation, SwapKind};
pub use submitter::TransactionSubmitter;
