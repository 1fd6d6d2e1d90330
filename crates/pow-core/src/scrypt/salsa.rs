//! Salsa20/8 over 64-byte blocks in two interchangeable layouts.
//!
//! [`Words`] keeps the sixteen words in natural order. [`Lanes`] stores them
//! as four 4-lane vectors along the Salsa diagonals, so each half-round is
//! four lane-wise add/rotate/xor steps plus a lane rotation. Both produce
//! identical scrypt output.

use core::fmt::Debug;

/// A 64-byte Salsa20 block in some in-memory layout.
pub trait SalsaBlock: Copy + Default + Debug + Send + Sync {
    /// Build from words in natural order.
    fn from_words(words: &[u32; 16]) -> Self;

    /// Back to words in natural order.
    fn to_words(&self) -> [u32; 16];

    fn xor_assign(&mut self, other: &Self);

    /// Salsa20/8 core with feed-forward, in place.
    fn salsa20_8(&mut self);

    /// Word 0, used to pick the next scratchpad entry.
    fn integerify(&self) -> u32;

    fn from_le_bytes(bytes: &[u8]) -> Self {
        let mut words = [0u32; 16];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Self::from_words(&words)
    }

    fn write_le_bytes(&self, out: &mut [u8]) {
        for (chunk, word) in out.chunks_exact_mut(4).zip(self.to_words().iter()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }
}

/// Natural word order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Words([u32; 16]);

#[inline(always)]
fn quarter_round(x: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize) {
    x[b] ^= x[a].wrapping_add(x[d]).rotate_left(7);
    x[c] ^= x[b].wrapping_add(x[a]).rotate_left(9);
    x[d] ^= x[c].wrapping_add(x[b]).rotate_left(13);
    x[a] ^= x[d].wrapping_add(x[c]).rotate_left(18);
}

impl SalsaBlock for Words {
    fn from_words(words: &[u32; 16]) -> Self {
        Words(*words)
    }

    fn to_words(&self) -> [u32; 16] {
        self.0
    }

    #[inline]
    fn xor_assign(&mut self, other: &Self) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a ^= b;
        }
    }

    fn salsa20_8(&mut self) {
        let mut x = self.0;
        for _ in 0..4 {
            // columns
            quarter_round(&mut x, 0, 4, 8, 12);
            quarter_round(&mut x, 5, 9, 13, 1);
            quarter_round(&mut x, 10, 14, 2, 6);
            quarter_round(&mut x, 15, 3, 7, 11);
            // rows
            quarter_round(&mut x, 0, 1, 2, 3);
            quarter_round(&mut x, 5, 6, 7, 4);
            quarter_round(&mut x, 10, 11, 8, 9);
            quarter_round(&mut x, 15, 12, 13, 14);
        }
        for (out, mixed) in self.0.iter_mut().zip(x.iter()) {
            *out = out.wrapping_add(*mixed);
        }
    }

    #[inline]
    fn integerify(&self) -> u32 {
        self.0[0]
    }
}

type Lane = [u32; 4];

#[inline(always)]
fn add(a: Lane, b: Lane) -> Lane {
    [
        a[0].wrapping_add(b[0]),
        a[1].wrapping_add(b[1]),
        a[2].wrapping_add(b[2]),
        a[3].wrapping_add(b[3]),
    ]
}

#[inline(always)]
fn xor_rotl(target: &mut Lane, sum: Lane, bits: u32) {
    for i in 0..4 {
        target[i] ^= sum[i].rotate_left(bits);
    }
}

/// Lane `i` of the result is lane `i + by` (mod 4) of the input.
#[inline(always)]
fn rotate_lanes(v: Lane, by: usize) -> Lane {
    [v[by % 4], v[(by + 1) % 4], v[(by + 2) % 4], v[(by + 3) % 4]]
}

/// Diagonal layout: lane `j` of vector `i` holds word `(4i + j) * 5 mod 16`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lanes([Lane; 4]);

impl SalsaBlock for Lanes {
    fn from_words(words: &[u32; 16]) -> Self {
        let mut v = [[0u32; 4]; 4];
        for i in 0..16 {
            v[i / 4][i % 4] = words[i * 5 % 16];
        }
        Lanes(v)
    }

    fn to_words(&self) -> [u32; 16] {
        let mut words = [0u32; 16];
        for i in 0..16 {
            words[i * 5 % 16] = self.0[i / 4][i % 4];
        }
        words
    }

    #[inline]
    fn xor_assign(&mut self, other: &Self) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            for i in 0..4 {
                a[i] ^= b[i];
            }
        }
    }

    fn salsa20_8(&mut self) {
        let [mut x0, mut x1, mut x2, mut x3] = self.0;
        for _ in 0..4 {
            // columns
            xor_rotl(&mut x1, add(x0, x3), 7);
            xor_rotl(&mut x2, add(x1, x0), 9);
            xor_rotl(&mut x3, add(x2, x1), 13);
            xor_rotl(&mut x0, add(x3, x2), 18);

            x1 = rotate_lanes(x1, 3);
            x2 = rotate_lanes(x2, 2);
            x3 = rotate_lanes(x3, 1);

            // rows
            xor_rotl(&mut x3, add(x0, x1), 7);
            xor_rotl(&mut x2, add(x3, x0), 9);
            xor_rotl(&mut x1, add(x2, x3), 13);
            xor_rotl(&mut x0, add(x1, x2), 18);

            x1 = rotate_lanes(x1, 1);
            x2 = rotate_lanes(x2, 2);
            x3 = rotate_lanes(x3, 3);
        }
        self.0[0] = add(self.0[0], x0);
        self.0[1] = add(self.0[1], x1);
        self.0[2] = add(self.0[2], x2);
        self.0[3] = add(self.0[3], x3);
    }

    #[inline]
    fn integerify(&self) -> u32 {
        self.0[0][0]
    }
}
