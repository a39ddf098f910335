// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Wire encodings shared by every payload.
//!
//! Big integers travel as their minimal big-endian byte strings (no leading
//! zero bytes; zero is the single byte `0`). The [`bytes`] and [`bytes_vec`]
//! modules plug that encoding into `serde` through `#[serde(with = ...)]`.

use crate::errors::*;

// Corresponds to the I2OSP() function from RFC8017
pub(crate) fn i2osp(input: usize, length: usize) -> Result<Vec<u8>> {
    let sizeof_usize = core::mem::size_of::<usize>();

    // Check if input >= 256^length
    if (sizeof_usize as u32 - input.leading_zeros() / 8) > length as u32 {
        return Err(InternalError::Serialization);
    }

    if length <= sizeof_usize {
        return Ok((input.to_be_bytes()[sizeof_usize - length..]).to_vec());
    }

    let mut output = vec![0u8; length];
    output.splice(
        length - sizeof_usize..length,
        input.to_be_bytes().iter().cloned(),
    );
    Ok(output)
}

/// `serde` adapter encoding a single `BigUint` as big-endian bytes.
pub(crate) mod bytes {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&value.to_bytes_be())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        Ok(BigUint::from_bytes_be(&bytes))
    }
}

/// `serde` adapter encoding a `Vec<BigUint>` as a sequence of big-endian byte
/// strings.
pub(crate) mod bytes_vec {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        values: &[BigUint],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(BigUint::to_bytes_be))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<BigUint>, D::Error> {
        let encoded = Vec::<Vec<u8>>::deserialize(deserializer)?;
        Ok(encoded
            .iter()
            .map(|bytes| BigUint::from_bytes_be(bytes))
            .collect())
    }
}
