//! Frame accumulation strategy.
//!
//! The composite pass blends each traced frame into the accumulation target
//! with a constant alpha. Progressive mode uses `1 / (n + 1)` for the n-th
//! frame since the last reset, which yields the running mean of all frames.

use lux_core::AccumulationMode;
use rand::Rng;

#[derive(Clone, Debug)]
pub struct Accumulator {
    mode: AccumulationMode,
    samples: u32,
}

impl Accumulator {
    pub fn new(mode: AccumulationMode) -> Self {
        Self { mode, samples: 0 }
    }

    pub fn mode(&self) -> AccumulationMode {
        self.mode
    }

    /// Frames blended since the last reset.
    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Switch strategy. Always restarts accumulation.
    pub fn set_mode(&mut self, mode: AccumulationMode) {
        self.mode = mode;
        self.reset();
    }

    /// Start over: the next frame fully replaces the target.
    pub fn reset(&mut self) {
        self.samples = 0;
    }

    /// Blend weight for the frame about to be composited.
    pub fn begin_frame(&mut self) -> f32 {
        match self.mode {
            AccumulationMode::Progressive => {
                let alpha = 1.0 / (self.samples as f32 + 1.0);
                self.samples = self.samples.saturating_add(1);
                alpha
            }
            AccumulationMode::Independent => {
                self.samples = 1;
                1.0
            }
        }
    }

    /// Sub-pixel sample position for the next frame.
    ///
    /// Progressive frames jitter inside the pixel so the mean converges to an
    /// antialiased image; independent frames sample the pixel centre.
    pub fn pixel_offset<R: Rng>(&self, rng: &mut R) -> [f32; 2] {
        match self.mode {
            AccumulationMode::Progressive => [rng.gen(), rng.gen()],
            AccumulationMode::Independent => [0.5, 0.5],
        }
    }
}
