pub mod block;
pub mod detector;
pub mod source;

pub use block::Block;
pub use detector::ChangeDetector;
pub use source::{BlockSource, HttpBlockSource};
