use proptest::prelude::*;
use stressgen::Curve;

const EPS: f64 = 1e-6;

fn curve_from(name: &str, steps: &[(f64, f64)]) -> Curve {
    let mut curve = Curve::new(name, 2);
    let mut t = 0.0;
    for &(dt, v) in steps {
        curve.append(t, v, true).unwrap();
        t += dt;
    }
    curve
}

fn steps() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0.01f64..10.0, -1000.0f64..1000.0), 2..40)
}

proptest! {
    #[test]
    fn generated_curves_are_ordered(a in steps()) {
        let curve = curve_from("A", &a);
        prop_assert_eq!(curve.check_order(), 0);
    }

    #[test]
    fn consolidate_is_idempotent(a in steps(), b in steps()) {
        let mut left = curve_from("A", &a);
        let right = curve_from("B", &b);

        left.consolidate(&right).unwrap();
        let once = left.clone();
        let added = left.consolidate(&right).unwrap();

        prop_assert_eq!(added, 0);
        prop_assert_eq!(left, once);
    }

    #[test]
    fn consolidate_keeps_shape_and_gains_other_times(a in steps(), b in steps()) {
        let original = curve_from("A", &a);
        let mut left = original.clone();
        let right = curve_from("B", &b);

        left.consolidate(&right).unwrap();

        prop_assert_eq!(left.check_order(), 0);
        for &t in right.times() {
            let place = left.find_place(t);
            prop_assert!(place.is_some_and(|k| (left.times()[k] - t).abs() < left.resolution()));
        }
        for (&t, &v) in left.times().iter().zip(left.values()) {
            prop_assert!((original.value_at(t) - v).abs() < EPS);
        }
    }

    #[test]
    fn interpolation_is_continuous_inside_span(a in steps(), frac in 0.1f64..0.9) {
        let curve = curve_from("A", &a);
        let (times, values) = (curve.times(), curve.values());

        for k in 1..curve.len() {
            let dt = times[k] - times[k - 1];
            let rise = values[k] - values[k - 1];

            let inside = curve.value_at(times[k - 1] + frac * dt);
            prop_assert!((inside - (values[k - 1] + frac * rise)).abs() < EPS);

            let left_limit = curve.value_at(times[k] - 0.01 * dt);
            prop_assert!((left_limit - values[k]).abs() <= 0.01 * rise.abs() + EPS);
            prop_assert!((curve.value_at(times[k]) - values[k]).abs() < EPS);
        }
    }
}
