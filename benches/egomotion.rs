// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use criterion::{criterion_group, criterion_main, Criterion};
use egoflow::core::{egomotion, sphere_flow::SphereFlow};
use egoflow::math::s2;
use egoflow::misc::type_aliases::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};

fn flows(nb: usize) -> Vec<SphereFlow> {
    let mut rng = StdRng::seed_from_u64(0);
    let linear_velocity = Vec3::new(0.3, -0.2, 1.0);
    let angular_velocity = Vec3::new(0.05, -0.1, 0.08);
    (0..nb)
        .map(|_| {
            let ray = Vec3::new(rng.gen_range(-0.8..0.8), rng.gen_range(-0.6..0.6), 1.0);
            let bearing = ray.normalize();
            let inverse_depth = rng.gen_range(0.1..1.0);
            let flow = -angular_velocity.cross(&bearing)
                - inverse_depth * s2::project(&bearing, &linear_velocity);
            SphereFlow { bearing, flow }
        })
        .collect()
}

fn criterion_benchmark(c: &mut Criterion) {
    let flows = flows(500);
    let config = egomotion::Config::default();
    c.bench_function("egomotion 500 flows", |b| {
        b.iter(|| egomotion::estimate_from_flows(&config, &flows, None, None))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
