//! Round lifecycle state: which round is live, how long it has left, and the
//! draw animation that closes it.

mod countdown;
mod reconciler;
mod sequencer;

pub use countdown::*;
pub use reconciler::*;
pub use sequencer::*;
