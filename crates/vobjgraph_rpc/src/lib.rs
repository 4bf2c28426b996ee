//! Asynchronous call surface over the object graph store.
//!
//! Each call carries a caller-chosen correlation id and runs under a
//! deadline; store work happens on the tokio blocking pool.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handle;
pub mod protocol;

pub use config::RpcConfig;
pub use dispatch::{run_with_deadline, RpcDispatcher};
pub use error::{RpcError, RpcResult};
pub use handle::StoreHandle;
pub use protocol::{RpcEnvelope, RpcErrorBody, RpcRequest, RpcResponse};
