pub mod media;
pub mod vote;

pub use media::*;
pub use vote::*;
