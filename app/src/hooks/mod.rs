//! Data sources feeding the driver: backend and contract pollers, and the
//! push listener.

mod backend;
mod contract;
mod echo;
mod poller;
pub mod rpc;

pub use backend::*;
pub use contract::*;
pub use echo::*;
pub use poller::*;
