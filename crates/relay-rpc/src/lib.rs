//! # relay-rpc
//!
//! Request/response layer between transport clients and a session.
//!
//! - **Wire types**: [`RpcRequest`], [`RpcResponse`], [`RpcEvent`]
//! - **Errors**: [`RpcError`] with stable string codes, mapped from
//!   session errors
//! - **Registry**: [`MethodRegistry`] dispatches by method name with a
//!   per-handler timeout
//! - **Handlers**: one module per method group, wired by
//!   [`handlers::register_all`]

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod handlers;
pub mod registry;
pub mod types;

pub use context::RpcContext;
pub use errors::RpcError;
pub use registry::{MethodHandler, MethodRegistry};
pub use types::{RpcErrorBody, RpcEvent, RpcRequest, RpcResponse};
