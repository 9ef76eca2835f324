// SPDX-License-Identifier: Apache-2.0

use fisca_model::Value;
use fisca_query::{normalize, normalize_dataset, RawTable};
use proptest::prelude::*;
use proptest::test_runner::Config;

fn cell() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i32>().prop_map(|v| Value::Integer(i64::from(v))),
        (-1.0e6f64..1.0e6).prop_map(Value::Float),
        "[0-9]{1,6}".prop_map(Value::Text),
        "[0-9]{1,3}\\.[0-9]{1,2}".prop_map(Value::Text),
        "[A-Za-z ./-]{0,8}".prop_map(Value::Text),
    ]
}

fn table() -> impl Strategy<Value = RawTable> {
    (1usize..5).prop_flat_map(|width| {
        let names = proptest::collection::btree_set("[a-zA-Z]{1,3}_[0-9]", width);
        let rows = proptest::collection::vec(proptest::collection::vec(cell(), width), 0..12);
        (names, rows).prop_map(|(names, rows)| {
            let mut seen = std::collections::BTreeSet::new();
            let columns: Vec<String> = names
                .into_iter()
                .filter(|n| seen.insert(n.to_lowercase()))
                .collect();
            let width = columns.len();
            let rows = rows
                .into_iter()
                .map(|mut r| {
                    r.truncate(width);
                    r
                })
                .collect();
            RawTable { columns, rows }
        })
    })
}

proptest! {
    #![proptest_config(Config::with_cases(256))]
    #[test]
    fn normalizing_twice_equals_normalizing_once(raw in table()) {
        let once = normalize(raw).expect("first pass");
        let twice = normalize_dataset(once.clone()).expect("second pass");
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalized_columns_are_lower_case(raw in table()) {
        let ds = normalize(raw).expect("normalize");
        for column in ds.columns() {
            prop_assert_eq!(column.clone(), column.to_lowercase());
        }
    }
}
