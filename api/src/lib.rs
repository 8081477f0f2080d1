pub mod amount;
pub mod consts;
pub mod error;
pub mod event;
pub mod state;

pub mod prelude {
    pub use crate::amount::*;
    pub use crate::consts::*;
    pub use crate::error::*;
    pub use crate::event::*;
    pub use crate::state::*;
}
