// SPDX-License-Identifier: Apache-2.0

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fisca_model::Value;
use fisca_query::{normalize, RawTable};

fn wide_text_table(rows: usize) -> RawTable {
    let columns = [
        "NU_OF",
        "NM_RAZAO_SOCIAL",
        "VL_TOTAL",
        "VL_PAGO",
        "ANO",
        "CNPJ",
    ];
    let data = (0..rows)
        .map(|i| {
            vec![
                Value::Text(format!("OF{i}")),
                Value::Text(format!("EMPRESA {i} LTDA")),
                Value::Text(format!("{}.{:02}", i * 13, i % 100)),
                Value::Text(format!("{}", i * 7)),
                Value::Integer(2020 + (i % 5) as i64),
                Value::Text(format!("{i:02}.000.000/0001-00")),
            ]
        })
        .collect();
    RawTable::new(&columns, data)
}

fn bench_normalize(c: &mut Criterion) {
    let table = wide_text_table(10_000);
    c.bench_function("normalize_10k_rows", |b| {
        b.iter(|| normalize(black_box(table.clone())).expect("normalize"))
    });
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
