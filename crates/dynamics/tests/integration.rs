use approx::assert_relative_eq;
use dynamics::{
    coexist_equilibrium, CoCulture, Integrator, OdeParams, SolverOptions, State, ThresholdEvent,
};

fn params() -> OdeParams {
    OdeParams {
        r_e: 1.0,
        r_z: 0.8,
        c_e: 1.0,
        c_z: 1.0,
        alpha_ez: -0.1,
        alpha_ze: -0.2,
        kd: 0.5,
        ki: 1.0,
        mic_e: 1.0,
        mic_z: 1.0,
        dmax_e: 3.0,
        dmax_z: 0.5,
        gamma: 2.0,
    }
}

#[test]
fn mono_culture_grows_to_carrying_capacity() {
    let p = params();
    let integrator = Integrator::new(SolverOptions::default()).unwrap();
    let seg = integrator
        .integrate(&CoCulture::new(&p, 0.0), State::new(0.5, 0.0, 0.0), 0.0, 25.0, &[])
        .unwrap();
    let (t, y) = seg.last().unwrap();
    assert_eq!(t, 25.0);
    assert_relative_eq!(y.e, p.c_e, epsilon = 1e-6);
    assert!(seg.y.iter().all(|s| s.z == 0.0));
    // logistic growth is monotone from below
    assert!(seg.y.windows(2).all(|w| w[1].e >= w[0].e - 1e-12));
}

#[test]
fn coexistence_equilibrium_is_a_fixed_point() {
    let p = params();
    let eq = coexist_equilibrium(&p).unwrap();
    let integrator = Integrator::default();
    let seg = integrator
        .integrate(&CoCulture::new(&p, 0.0), State::new(eq.e, eq.z, 0.0), 0.0, 30.0, &[])
        .unwrap();
    for s in &seg.y {
        assert_relative_eq!(s.e, eq.e, epsilon = 1e-9);
        assert_relative_eq!(s.z, eq.z, epsilon = 1e-9);
        assert_eq!(s.d, 0.0);
    }
}

#[test]
fn sustained_dosing_orders_extinction_events() {
    let p = params();
    let e0 = 0.5;
    let events = [ThresholdEvent::on_focal(0.05 * e0), ThresholdEvent::on_focal(1e-4)];
    let seg = Integrator::default()
        .integrate(&CoCulture::new(&p, 10.0), State::new(e0, 0.3, 0.0), 0.0, 15.0, &events)
        .unwrap();

    assert_eq!(seg.events[0].len(), 1, "5% threshold crossed once");
    assert_eq!(seg.events[1].len(), 1, "tiny threshold crossed once");
    assert!(seg.events[1][0] >= seg.events[0][0]);
    // monitoring does not stop the integration
    assert_eq!(seg.last().unwrap().0, 15.0);
    assert_eq!(seg.last().unwrap().1.e, 0.0, "extinct density snapped to zero");
}

#[test]
fn drug_approaches_inflow_balance() {
    let p = params();
    let seg = Integrator::default()
        .integrate(&CoCulture::new(&p, 2.0), State::new(0.0, 0.0, 0.0), 0.0, 40.0, &[])
        .unwrap();
    let d_ss = p.ki * 2.0 / p.kd;
    assert_relative_eq!(seg.last().unwrap().1.d, d_ss, epsilon = 1e-5);
}
