mod bet;
mod outcome;
mod round;

pub(crate) mod de;

pub use bet::*;
pub use outcome::*;
pub use round::*;
