// Deterministic pseudo-random number generator.
//
// Hand-rolled xoshiro256++ with SplitMix64 seeding, chosen over an external
// RNG crate so the output sequence is guaranteed identical across
// platforms, compilers, and optimization levels. The sim owns exactly one
// `GameRng`; its only consumer today is the box spawner's catalog draw.
//
// **Critical constraint: determinism.** Every method must be a pure
// function of prior state. No system time, no OS entropy, no
// floating-point arithmetic.

use serde::{Deserialize, Serialize};

/// The simulation's sole source of randomness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameRng {
    state: [u64; 4],
}

impl GameRng {
    /// Seed the 256-bit state from a single `u64` via SplitMix64.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut state = [0u64; 4];
        for word in &mut state {
            *word = splitmix64(&mut sm);
        }
        Self { state }
    }

    /// The next `u64` in the xoshiro256++ sequence.
    pub fn next_u64(&mut self) -> u64 {
        let s = &mut self.state;
        let result = s[0].wrapping_add(s[3]).rotate_left(23).wrapping_add(s[0]);
        let t = s[1] << 17;
        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];
        s[2] ^= t;
        s[3] = s[3].rotate_left(45);
        result
    }

    /// Uniform integer in `[0, bound)` via rejection sampling (no modulo
    /// bias). Returns 0 when `bound` is 0.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        // threshold = (2^64 - bound) % bound
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return r % bound;
            }
        }
    }
}

/// SplitMix64 — the xoshiro authors' recommended seed expander.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
