//! 聊天室系统核心领域模型
//!
//! 包含消息、身份、房间标识等核心类型，以及对应的校验规则和错误定义。
//! 领域层不依赖任何运行时或存储实现。

pub mod errors;
pub mod identity;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use errors::*;
pub use identity::Identity;
pub use message::{Message, SharedMessage};
pub use value_objects::*;
