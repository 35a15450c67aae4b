//! Audio I/O modules
//!
//! Acquisition block types and the circular store that keeps recent filtered
//! audio for retrospective window extraction.

pub mod ring_store;
pub mod source;

pub use ring_store::{RingWindowStore, WindowSource};
pub use source::{pcm_to_f32, AcquisitionMessage, AudioBlock, BlockSource, ReplaySource};
