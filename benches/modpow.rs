// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

#[macro_use]
extern crate criterion;

use criterion::Criterion;

use num_bigint::RandBigInt;
use rand::rngs::OsRng;
use sealed_auctions::NamedGroup;

fn group_pow(c: &mut Criterion, name: &str, group: NamedGroup) {
    let params = group.parameters();
    let p = params.modulus().clone();
    let mut a = params.generator().clone();
    let e = OsRng.gen_biguint_below(params.order());

    c.bench_function(&format!("modpow ({name}, {} bits)", p.bits()), move |b| {
        b.iter(|| {
            a = a.modpow(&e, &p);
        })
    });
}

fn modp1024(c: &mut Criterion) {
    group_pow(c, "MODP1024", NamedGroup::Modp1024);
}

fn modp2048(c: &mut Criterion) {
    group_pow(c, "MODP2048", NamedGroup::Modp2048);
}

criterion_group!(modpow_benches, modp1024, modp2048);
criterion_main!(modpow_benches);
