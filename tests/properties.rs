use num_complex::Complex64 as C64;
use proptest::prelude::*;
use mps_factor::{
    mps::{ MPS, exact_bond_dims },
    verify,
};

fn proptest_config() -> ProptestConfig {
    ProptestConfig { cases: 48, ..ProptestConfig::default() }
}

// (physical dimensions, normalized state)
fn system() -> impl Strategy<Value = (Vec<usize>, Vec<C64>)> {
    prop::collection::vec(1_usize..=3, 1..=5)
        .prop_flat_map(|dims| {
            let len: usize = dims.iter().product();
            let amps = prop::collection::vec((-1.0..1.0_f64, -1.0..1.0_f64), len);
            (Just(dims), amps)
        })
        .prop_filter_map("zero state", |(dims, amps)| {
            let state: Vec<C64> =
                amps.into_iter().map(|(re, im)| C64::new(re, im)).collect();
            let norm: f64 = state.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
            let normed: Vec<C64> = state.into_iter().map(|a| a / norm).collect();
            (norm > 1e-3).then_some((dims, normed))
        })
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn reconstruction_is_exact((dims, state) in system()) {
        let mps: MPS<C64> = MPS::from_vector_dims(dims, state.clone()).unwrap();
        let report = verify::verify_exhaustive(&mps, &state, None).unwrap();
        prop_assert!(report.passed, "max error {:e} at {:?}", report.max_err, report.worst);
        prop_assert!((mps.norm() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn sites_are_left_orthonormal((dims, state) in system()) {
        let mps: MPS<C64> = MPS::from_vector_dims(dims, state).unwrap();
        for g in mps.sites() {
            prop_assert!(verify::orthonormality_error(g) < 1e-10);
        }
    }

    #[test]
    fn bonds_chain((dims, state) in system()) {
        let mps: MPS<C64> = MPS::from_vector_dims(dims.clone(), state).unwrap();
        let sites = mps.sites();
        prop_assert_eq!(sites.len(), dims.len());
        prop_assert_eq!(sites[0].left_dim(), 1);
        prop_assert_eq!(sites[sites.len() - 1].right_dim(), 1);
        for (g, d) in sites.iter().zip(&dims) {
            prop_assert_eq!(g.phys_dim(), *d);
        }
        prop_assert_eq!(mps.bond_dims(), exact_bond_dims(&dims));
        prop_assert!(mps.check_chain().is_ok());
    }
}
