use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dynamics::{EnvParams, InitialConditions, OdeParams};
use rl::{Action, BacterialEnv, Env, MinEd, ResetKind, StateMethod, Termination};

fn env() -> BacterialEnv {
    let params = EnvParams {
        ode_params: OdeParams {
            r_e: 0.02,
            r_z: 0.015,
            c_e: 1.0,
            c_z: 1.0,
            alpha_ez: -0.005,
            alpha_ze: -0.004,
            kd: 0.1,
            ki: 1.0,
            mic_e: 1.0,
            mic_z: 10.0,
            dmax_e: 0.5,
            dmax_z: 0.1,
            gamma: 2.0,
        },
        initial_conditions: InitialConditions { e: 0.5, z: 0.5, d: 0.0 },
    };
    let reward = MinEd { w_e: 1.0, din_max: 100.0, w_d: 0.1, termination: Termination::Never };
    BacterialEnv::new(params, 360.0, Box::new(reward), StateMethod::DiscreteE { n_states: 12, density_max: None })
        .unwrap()
}

fn bench_env_step(c: &mut Criterion) {
    let mut env = env();
    c.bench_function("bacterial_env_step_360min", |b| {
        b.iter(|| {
            env.reset(ResetKind::Coexist).unwrap();
            black_box(env.step(Action::new(100.0, 180.0)).unwrap());
        });
    });
}

criterion_group!(benches, bench_env_step);
criterion_main!(benches);
