mod play;

pub use play::PlayState;
