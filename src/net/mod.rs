//! Networking layer.
//!
//! - [`target`] - Request path parsing into cluster and resource group
//! - [`handler`] - Handler trait and the handler chain composer
//! - [`mux`] - Path-prefix routes consulted before the chain
//! - [`response`] - Response builders
//! - [`server`] - HTTP listener

pub mod handler;
pub mod mux;
pub mod response;
pub mod server;
pub mod target;

pub use handler::{ComposedHandler, Delegate, GroupOwner, Handler, HandlerChainComposer, HandlerFuture};
pub use mux::{MuxedHandler, PreHandlerMux};
pub use target::RequestTarget;
