// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{criterion_group, criterion_main, Criterion};
use egoflow::core::multires;
use nalgebra::DMatrix;

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("mean_pyramid 4 480x640", |b| {
        let mat: DMatrix<u8> = DMatrix::repeat(480, 640, 1);
        b.iter(|| multires::mean_pyramid(4, mat.clone()))
    });
    c.bench_function("pad_replicate 10 480x640", |b| {
        let mat: DMatrix<u8> = DMatrix::repeat(480, 640, 1);
        b.iter(|| multires::pad_replicate(&mat, 10, 10))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
