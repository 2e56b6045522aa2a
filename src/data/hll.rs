//! HyperLogLog cardinality estimator.
//!
//! Fixed at 14-bit precision: 16384 6-bit registers packed into a 12KB byte
//! array, giving the standard ~0.81% relative error.

use serde::{Deserialize, Serialize};

const PRECISION: u32 = 14;
pub const REGISTER_COUNT: usize = 1 << PRECISION; // 16384
const REGISTER_BITS: u32 = 6;
const REGISTER_MAX: u8 = (1 << REGISTER_BITS) - 1; // 63

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hll {
    registers: Vec<u8>,
}

impl Hll {
    #[cfg(debug_assertions)]
    fn verify_invariants(&self) {
        debug_assert_eq!(
            self.registers.len(),
            REGISTER_COUNT,
            "Invariant violated: register count must be {}",
            REGISTER_COUNT
        );
        debug_assert!(
            self.registers.iter().all(|&r| r <= REGISTER_MAX),
            "Invariant violated: no register may exceed {}",
            REGISTER_MAX
        );
    }

    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn verify_invariants(&self) {}

    pub fn new() -> Self {
        let hll = Hll {
            registers: vec![0u8; REGISTER_COUNT],
        };
        hll.verify_invariants();
        hll
    }

    /// Rebuild from a raw register blob (used by RESTORE).
    pub fn from_registers(registers: Vec<u8>) -> Option<Self> {
        if registers.len() != REGISTER_COUNT {
            return None;
        }
        if registers.iter().any(|&r| r > REGISTER_MAX) {
            return None;
        }
        let hll = Hll { registers };
        hll.verify_invariants();
        Some(hll)
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    fn hash(data: &[u8]) -> u64 {
        // 64-bit FNV-1a: fast, good avalanche, no external dependency needed
        // for this internal hash (it never touches the wire).
        let mut hash: u64 = 0xcbf29ce484222325;
        for &byte in data {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        hash
    }

    /// Add an element. Returns true if any register changed (cardinality may
    /// have increased).
    pub fn add(&mut self, data: &[u8]) -> bool {
        let hash = Self::hash(data);
        let index = (hash & (REGISTER_COUNT as u64 - 1)) as usize;
        let remaining = hash >> PRECISION;
        // Position of the leftmost 1-bit among the remaining 64 - PRECISION bits.
        let rank = if remaining == 0 {
            (64 - PRECISION) as u8 + 1
        } else {
            (remaining.leading_zeros() - PRECISION) as u8 + 1
        };
        let rank = rank.min(REGISTER_MAX);

        if self.registers[index] < rank {
            self.registers[index] = rank;
            self.verify_invariants();
            true
        } else {
            false
        }
    }

    /// Estimate the cardinality using the standard HyperLogLog estimator
    /// with small-range linear-counting correction.
    pub fn count(&self) -> u64 {
        let m = REGISTER_COUNT as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);

        let mut sum = 0.0f64;
        let mut zeros = 0usize;
        for &r in &self.registers {
            sum += 2f64.powi(-(r as i32));
            if r == 0 {
                zeros += 1;
            }
        }

        let raw_estimate = alpha * m * m / sum;

        let estimate = if raw_estimate <= 2.5 * m && zeros > 0 {
            // Small range correction: linear counting.
            m * (m / zeros as f64).ln()
        } else if raw_estimate <= (1u64 << 32) as f64 / 30.0 {
            raw_estimate
        } else {
            // Large range correction for 32-bit hash space.
            let two_32 = (1u64 << 32) as f64;
            -two_32 * (1.0 - raw_estimate / two_32).ln()
        };

        estimate.round().max(0.0) as u64
    }

    /// Merge another HLL into this one by taking the register-wise max.
    pub fn merge(&mut self, other: &Hll) {
        for (a, b) in self.registers.iter_mut().zip(other.registers.iter()) {
            if *b > *a {
                *a = *b;
            }
        }
        self.verify_invariants();
    }
}

impl Default for Hll {
    fn default() -> Self {
        Self::new()
    }
}
