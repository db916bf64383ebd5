#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use rtrack_core::{TabRef, ViewState, FILTER_KEYS};
use rtrack_query::{decode, encode};

fn token() -> impl Strategy<Value = String> { "[a-z][a-z0-9_-]{0,8}" }

fn tab() -> impl Strategy<Value = Option<TabRef>> {
    prop_oneof![
        Just(None),
        (0usize..32).prop_map(|i| Some(TabRef::Index(i))),
        token().prop_map(|k| Some(TabRef::Key(k))),
    ]
}

fn filters() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map(
        proptest::sample::select(FILTER_KEYS.to_vec()).prop_map(|k| k.to_string()),
        "[a-z0-9][a-z0-9 ._-]{0,8}",
        0..4,
    )
}

fn extra() -> impl Strategy<Value = BTreeMap<String, Vec<String>>> {
    proptest::collection::btree_map("x_[a-z]{1,6}", proptest::collection::vec("[ -~]{0,8}", 1..3), 0..3)
}

fn view_state() -> impl Strategy<Value = ViewState> {
    (tab(), token(), token(), token(), any::<bool>(), filters(), extra()).prop_map(
        |(tab, scale, standard, benchmark, raw, filters, extra)| ViewState {
            tab,
            scale,
            standard,
            benchmark,
            raw,
            filters,
            extra,
        },
    )
}

proptest! {
    #[test]
    fn decode_encode_round_trips(v in view_state()) {
        let q = encode(&v, &v, &BTreeSet::new());
        prop_assert_eq!(decode(&q), v);
    }

    #[test]
    fn encoding_is_deterministic(v in view_state()) {
        let a = encode(&v, &v, &BTreeSet::new());
        let b = encode(&v.clone(), &v.clone(), &BTreeSet::new());
        prop_assert_eq!(a, b);
    }

    #[test]
    fn deleted_key_resets_to_default(v in view_state()) {
        let params = v.params();
        for key in params.keys() {
            let mut del = BTreeSet::new();
            del.insert(key.clone());
            let decoded = decode(&encode(&v, &v, &del));
            let after = decoded.params();
            prop_assert!(!after.contains_key(key), "{} survived deletion", key);
            let mut expected = params.clone();
            expected.remove(key);
            prop_assert_eq!(after, expected);
        }
    }
}

#[test]
fn encoded_keys_are_sorted() {
    let v = decode("tab=1&benchmark=best&region=africa&raw=1&zeta=1&alpha=2&zeta=0");
    assert_eq!(
        encode(&v, &v, &BTreeSet::new()),
        "alpha=2&benchmark=best&raw=true&region=africa&tab=1&zeta=1&zeta=0"
    );
}
