// Copyright (c) 2023 Bolt Labs Holdings, Inc
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Permutations of `0..n`, stored in both directions.

use crate::errors::Result;
use rand::{seq::SliceRandom, CryptoRng, RngCore};
use tracing::error;

/// A permutation `π` of `0..n`.
///
/// Applying it to a vector `v` produces `w` with `w[i] = v[π(i)]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Permutation {
    forward: Vec<usize>,
    backward: Vec<usize>,
}

impl Permutation {
    /// Sample a uniformly random permutation of `0..n`.
    pub(crate) fn random<R: RngCore + CryptoRng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let mut forward: Vec<usize> = (0..n).collect();
        forward.shuffle(rng);
        Self::from_valid(forward)
    }

    /// Build a permutation from the images `π(0), ..., π(n-1)`.
    #[cfg(test)]
    pub(crate) fn new(forward: Vec<usize>) -> Result<Self> {
        let mut seen = vec![false; forward.len()];
        for &image in &forward {
            if image >= forward.len() || seen[image] {
                error!("{:?} is not a permutation", forward);
                return arg_err!("not a permutation");
            }
            seen[image] = true;
        }
        Ok(Self::from_valid(forward))
    }

    fn from_valid(forward: Vec<usize>) -> Self {
        let mut backward = vec![0; forward.len()];
        for (i, &image) in forward.iter().enumerate() {
            backward[image] = i;
        }
        Self { forward, backward }
    }

    pub(crate) fn len(&self) -> usize {
        self.forward.len()
    }

    /// `π(i)`
    #[cfg(test)]
    pub(crate) fn image(&self, i: usize) -> usize {
        self.forward[i]
    }

    /// `π^{-1}(j)`
    pub(crate) fn preimage(&self, j: usize) -> usize {
        self.backward[j]
    }

    pub(crate) fn inverse(&self) -> Self {
        Self {
            forward: self.backward.clone(),
            backward: self.forward.clone(),
        }
    }

    /// Returns `w` with `w[i] = items[π(i)]`.
    pub(crate) fn apply<T: Clone>(&self, items: &[T]) -> Result<Vec<T>> {
        if items.len() != self.len() {
            error!(
                "Applying a permutation of {} elements to {} items",
                self.len(),
                items.len()
            );
            return arg_err!("permutation length mismatch");
        }
        Ok(self.forward.iter().map(|&i| items[i].clone()).collect())
    }
}
