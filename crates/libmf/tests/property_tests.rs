//! Property tests for encoding and configuration.

use libmf::{Loss, Matrix, Options, Problem, DEFAULT_BINS};
use libmf_ffi::MfParameter;
use proptest::prelude::*;

fn entries() -> impl Strategy<Value = Vec<(u32, u32, f32)>> {
    prop::collection::vec((0u32..5000, 0u32..5000, -10.0f32..10.0), 1..200)
}

fn loss() -> impl Strategy<Value = Loss> {
    prop::sample::select(Loss::ALL.to_vec())
}

// ============================================================
// Encoder
// ============================================================

proptest! {
    #[test]
    fn encode_dimensions_are_one_past_max(entries in entries()) {
        let matrix: Matrix = entries.iter().copied().collect();
        let problem = Problem::encode(&matrix).unwrap();

        let max_row = entries.iter().map(|e| e.0).max().unwrap() as usize;
        let max_col = entries.iter().map(|e| e.1).max().unwrap() as usize;
        prop_assert_eq!(problem.rows(), max_row + 1);
        prop_assert_eq!(problem.columns(), max_col + 1);
        prop_assert_eq!(problem.nnz(), entries.len());
    }

    #[test]
    fn encode_preserves_entries(entries in entries()) {
        let matrix: Matrix = entries.iter().copied().collect();
        let problem = Problem::encode(&matrix).unwrap();
        let nodes = problem.nodes().unwrap();

        prop_assert_eq!(nodes.len(), entries.len());
        for (node, &(u, v, r)) in nodes.iter().zip(&entries) {
            prop_assert_eq!(node.u as u32, u);
            prop_assert_eq!(node.v as u32, v);
            prop_assert_eq!(node.r, r);
        }
    }
}

// ============================================================
// Configuration
// ============================================================

proptest! {
    #[test]
    fn overlay_never_copies_data(loss in loss(), nmf in any::<bool>(), copy in any::<bool>()) {
        let mut defaults = MfParameter::default();
        defaults.copy_data = copy;
        let param = Options::new().loss(loss).nmf(nmf).overlay(defaults);

        prop_assert!(!param.copy_data);
        prop_assert_eq!(param.fun, loss.id());
        prop_assert_eq!(param.nr_bins, DEFAULT_BINS);
    }

    #[test]
    fn kl_always_forces_nmf(nmf in any::<bool>(), defaults_nmf in any::<bool>()) {
        let mut defaults = MfParameter::default();
        defaults.do_nmf = defaults_nmf;
        let param = Options::new().loss(Loss::RealKl).nmf(nmf).overlay(defaults);
        prop_assert!(param.do_nmf);
    }

    #[test]
    fn nmf_passes_through_for_other_losses(loss in loss(), nmf in any::<bool>()) {
        prop_assume!(loss != Loss::RealKl);
        let param = Options::new()
            .loss(loss)
            .nmf(nmf)
            .overlay(MfParameter::default());
        prop_assert_eq!(param.do_nmf, nmf);
    }
}
