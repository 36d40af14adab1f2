//! Audio side of the signal-shape backend.
//! PCM ring buffer → analyser (byte spectra) → feature extraction → sound buffer.

pub mod analyser;
pub mod features;
pub mod ring_buffer;
pub mod sound_buffer;

pub use analyser::Analyser;
pub use features::FeatureSample;
pub use ring_buffer::RingBuffer;
pub use sound_buffer::SoundBuffer;
