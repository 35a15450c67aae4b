//! Audio preprocessing modules
//!
//! Filter primitives applied to every incoming block before it reaches the
//! ring store and the peak detector:
//! - Biquad cascade (heart-sound band-pass)
//! - Envelope follower (rectify + low-pass)

pub mod envelope;
pub mod filter;

pub use envelope::EnvelopeFollower;
pub use filter::{BiquadCascade, BlockFilter};
