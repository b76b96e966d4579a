#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::canonical::to_canonical_vec;
    use crate::policy::action_for_draw;
    use crate::types::{Action, ResponseData};

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![Just(Action::Approve), Just(Action::Reject), Just(Action::Wait)]
    }

    proptest! {
        // Canonical bytes decode back to the same data and never carry raw HTML-sensitive characters
        #[test]
        fn test_canonical_data_round_trips(
            callback_id in ".{0,40}",
            sino_id in ".{0,20}",
            request_id in "[a-z0-9<>&-]{0,20}",
            action in action(),
        ) {
            let wait_time = (action == Action::Wait).then(|| "60".to_string());
            let data = ResponseData { callback_id, sino_id, request_id, action, wait_time };
            let bytes = to_canonical_vec(&data).unwrap();

            prop_assert!(!bytes.iter().any(|b| matches!(b, b'<' | b'>' | b'&' | b'\n')));
            let decoded: ResponseData = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(decoded, data);
        }

        // Draws partition [0, 1) into ordered bands
        #[test]
        fn test_draw_bands_ordered(a in 0.0f64..1.0, b in 0.0f64..1.0) {
            let rank = |r: f64| match action_for_draw(r) {
                Action::Approve => 0,
                Action::Reject => 1,
                Action::Wait => 2,
            };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(rank(lo) <= rank(hi));
        }
    }
}
