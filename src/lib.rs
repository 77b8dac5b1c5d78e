#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod notify;
pub mod pipeline;
#[cfg(feature = "services")]
pub mod services;
pub mod session;
pub mod storage;
pub mod types;

// Re-exports for convenient access
pub use config::{ClientConfig, RetryPolicy};
pub use error::Error;
pub use notify::{BroadcastNotifier, MessageBoard, Notifier};
pub use pipeline::{
    ApiClient, ApiRequest, ApiResponse, Attempt, Outcome, ReqwestTransport, Transport,
};
pub use session::{Session, SessionContext};
pub use storage::{DurableStorage, FileStorage, MemoryStorage};
pub use types::{CommentId, ItemId, PostId, UserId, UserProfile};
