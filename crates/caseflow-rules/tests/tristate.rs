// crates/caseflow-rules/tests/tristate.rs
// ============================================================================
// Property tests for Kleene tri-state logic.
// ============================================================================

use caseflow_rules::TriState;
use proptest::prelude::*;

fn arb_tristate() -> impl Strategy<Value = TriState> {
    prop_oneof![
        Just(TriState::True),
        Just(TriState::False),
        Just(TriState::Unknown),
    ]
}

proptest! {
    #[test]
    fn and_is_commutative(a in arb_tristate(), b in arb_tristate()) {
        prop_assert_eq!(a.and(b), b.and(a));
    }

    #[test]
    fn or_is_commutative(a in arb_tristate(), b in arb_tristate()) {
        prop_assert_eq!(a.or(b), b.or(a));
    }

    #[test]
    fn de_morgan_holds(a in arb_tristate(), b in arb_tristate()) {
        prop_assert_eq!(a.and(b).not(), a.not().or(b.not()));
        prop_assert_eq!(a.or(b).not(), a.not().and(b.not()));
    }

    #[test]
    fn double_negation_is_identity(a in arb_tristate()) {
        prop_assert_eq!(a.not().not(), a);
    }

    #[test]
    fn known_values_match_boolean_logic(a in any::<bool>(), b in any::<bool>()) {
        let ta = TriState::from_bool(a);
        let tb = TriState::from_bool(b);
        prop_assert_eq!(ta.and(tb), TriState::from_bool(a && b));
        prop_assert_eq!(ta.or(tb), TriState::from_bool(a || b));
    }
}
