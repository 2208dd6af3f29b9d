//! Property tests over the public surface: truthiness, origin-forget, and
//! the literal round-trip for scalar values.

use proptest::prelude::*;

use bilua_eval::{Interpreter, Number, RawValue, TableArena, Value};

fn scalar_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::nil()),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1.0e12..1.0e12f64).prop_map(Value::from),
        "[ -~]{0,20}".prop_map(|s| Value::from(s.as_str())),
    ]
}

proptest! {
    #[test]
    fn truthiness_rejects_only_nil_and_false(value in scalar_value()) {
        let falsy = value.is_nil() || value == Value::from(false);
        prop_assert_eq!(value.truthy(), !falsy);
    }

    #[test]
    fn no_origin_means_no_proposal(value in scalar_value(), target in scalar_value()) {
        let arena = TableArena::new();
        let stripped = value.remove_origin();
        prop_assert!(stripped.force(&target, &arena).is_none());
    }

    #[test]
    fn scalar_literals_round_trip(value in scalar_value()) {
        let arena = TableArena::new();
        let literal = value.to_literal(&arena).unwrap();

        let mut interpreter = Interpreter::new();
        let parsed = interpreter.parse(format!("return {literal}"));
        prop_assert!(parsed.is_ok(), "literal {:?} did not parse", literal);
        let result = interpreter.evaluate().unwrap();
        prop_assert_eq!(result.value, value);
    }

    #[test]
    fn number_equality_matches_float_view(a in any::<i64>()) {
        let int_form = Value::from(a);
        // only integers that survive the f64 round trip compare equal to it
        let float_form = Value::from(a as f64);
        if (a as f64) as i64 == a {
            prop_assert_eq!(int_form, float_form);
        }
    }

    #[test]
    fn integer_values_render_without_a_fraction(a in any::<i64>()) {
        match Value::from(a).raw() {
            RawValue::Number(Number::Int(i)) => prop_assert_eq!(i.to_string(), a.to_string()),
            other => prop_assert!(false, "unexpected raw value {:?}", other),
        }
    }
}
