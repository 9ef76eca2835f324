// SPDX-License-Identifier: Apache-2.0

use fisca_pipeline::orchestrator::{ROOT_DATASET, SECTOR_PLAN};
use fisca_pipeline::{CancellationToken, LoadStatus, Pipeline, PipelineConfig, Snapshot, Value};
use fisca_query::fake::FakeWarehouse;
use fisca_query::RawTable;
use std::sync::atomic::Ordering;
use std::time::Duration;

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig::default()).expect("config")
}

fn root_rows() -> RawTable {
    RawTable::new(
        &["NU_OF", "NU_MAT_EMITENTE", "NU_MAT_COORDENADOR", "CD_USUARIO_EMITENTE"],
        vec![
            vec![Value::from("OF1"), Value::from("101"), Value::from("900"), Value::from("9507248")],
            vec![Value::from("OF2"), Value::from("102"), Value::from("900"), Value::from("9507248")],
            vec![Value::from("OF2"), Value::from("102"), Value::Null, Value::from("6172598")],
        ],
    )
}

fn sector_warehouse() -> FakeWarehouse {
    let fake = FakeWarehouse::new("fake-sector");
    fake.respond("fis_of_raw", root_rows());
    fake.respond(
        "fis_of_em_numeros_dde",
        RawTable::new(
            &["nu_declaracao", "nu_of", "nu_ie"],
            vec![vec![Value::from("D1"), Value::from("OF1"), Value::from("IE1")]],
        ),
    );
    fake.respond(
        "fis_of_em_numeros_notif",
        RawTable::new(
            &["nu_notificacao_fiscal", "nu_of", "nu_ie"],
            vec![vec![Value::from("N1"), Value::from("OF2"), Value::from("IE2")]],
        ),
    );
    fake.respond(
        "fis_of_em_numeros_tifdp",
        RawTable::new(&["nu_infr_fiscal", "nu_of", "nu_ie"], vec![]),
    );
    fake.respond(
        "fis_afre_periodo",
        RawTable::new(&["cd_matricula", "qt_dias_ativa"], vec![vec![Value::Integer(101), Value::Integer(20)]]),
    );
    fake.respond(
        "vw_ods_contrib",
        RawTable::new(&["nu_ie", "cd_cnae"], vec![vec![Value::from("IE1"), Value::from("4711302")]]),
    );
    fake.respond(
        "fis_tabela_infracoes",
        RawTable::new(&["cd_infracao", "de_infracao"], vec![vec![Value::Integer(1), Value::from("Falta de recolhimento")]]),
    );
    fake.respond("fis_acomp_raw", RawTable::new(&["nu_documento_of"], vec![]));
    fake.fail("fis_termo_encerram_fisc_raw", "table not found");
    fake
}

fn assert_every_planned_name(snapshot: &Snapshot) {
    for name in SECTOR_PLAN.dataset_names() {
        assert!(snapshot.contains(name), "missing {name}");
    }
    assert_eq!(snapshot.len(), SECTOR_PLAN.dataset_names().count());
}

fn text_params(values: &[Value]) -> Vec<&str> {
    values.iter().filter_map(Value::as_text).collect()
}

#[tokio::test]
async fn order_numbers_are_deduplicated_before_filtering() {
    let fake = sector_warehouse();
    let view = pipeline()
        .load_dependent_sector_view(&fake, &CancellationToken::new())
        .await;
    assert_every_planned_name(&view);

    let declarations = fake.calls_matching("fis_of_em_numeros_dde");
    assert_eq!(declarations.len(), 1);
    assert_eq!(text_params(&declarations[0].params), vec!["OF1", "OF2"]);
    assert!(declarations[0].sql.contains("nu_of IN (?, ?)"));

    for table in ["fis_acomp_raw", "fis_termo_encerram_fisc_raw"] {
        let calls = fake.calls_matching(table);
        assert_eq!(text_params(&calls[0].params), vec!["OF1", "OF2"], "{table}");
    }
}

#[tokio::test]
async fn root_is_filtered_by_authorized_operators() {
    let fake = sector_warehouse();
    let _ = pipeline()
        .load_dependent_sector_view(&fake, &CancellationToken::new())
        .await;
    let root = fake.calls_matching("fis_of_raw");
    assert_eq!(root.len(), 1);
    assert!(root[0].sql.contains("usr_sat_ods.fis_of_raw"));
    assert_eq!(text_params(&root[0].params), vec!["6172598", "9507248"]);
}

#[tokio::test]
async fn second_order_keys_come_from_root_and_stage_one() {
    let fake = sector_warehouse();
    let view = pipeline()
        .load_dependent_sector_view(&fake, &CancellationToken::new())
        .await;

    let auditors = fake.calls_matching("fis_afre_periodo");
    assert_eq!(text_params(&auditors[0].params), vec!["101", "102", "900"]);
    let taxpayers = fake.calls_matching("vw_ods_contrib");
    assert_eq!(text_params(&taxpayers[0].params), vec!["IE1", "IE2"]);

    assert_eq!(view.get("auditor_periods").expect("slot").len(), 1);
    assert_eq!(view.get("taxpayer_profiles").expect("slot").len(), 1);
    assert_eq!(view.get(ROOT_DATASET).expect("root").len(), 3);
}

#[tokio::test]
async fn failing_dependent_is_isolated() {
    let fake = sector_warehouse();
    let view = pipeline()
        .load_dependent_sector_view(&fake, &CancellationToken::new())
        .await;
    assert!(view.get("closure_terms").expect("slot").is_empty());
    assert!(view.status("closure_terms").expect("status").is_failure());
    assert_eq!(view.failed_names(), vec!["closure_terms"]);
    assert_eq!(view.get("infraction_catalog").expect("slot").len(), 1);
}

#[tokio::test]
async fn empty_root_skips_every_dependent_query() {
    let fake = FakeWarehouse::new("fake-empty-root");
    fake.respond("fis_of_raw", RawTable::new(&["nu_of"], vec![]));
    let view = pipeline()
        .load_dependent_sector_view(&fake, &CancellationToken::new())
        .await;

    assert_every_planned_name(&view);
    assert_eq!(fake.fetch_calls.load(Ordering::Relaxed), 1);
    assert_eq!(view.total_rows(), 0);
    for name in SECTOR_PLAN.dependent_names() {
        assert!(matches!(view.status(name), Some(LoadStatus::Skipped { .. })), "{name}");
    }
}

#[tokio::test]
async fn empty_taxpayer_keys_skip_the_profile_query() {
    let no_ie = FakeWarehouse::new("fake-no-ie");
    no_ie.respond("fis_of_raw", root_rows());
    no_ie.respond(
        "fis_of_em_numeros",
        RawTable::new(&["nu_of", "nu_ie"], vec![vec![Value::from("OF1"), Value::Null]]),
    );

    let view = pipeline()
        .load_dependent_sector_view(&no_ie, &CancellationToken::new())
        .await;
    assert!(no_ie.calls_matching("vw_ods_contrib").is_empty());
    assert!(view.get("taxpayer_profiles").expect("slot").is_empty());
    assert!(matches!(
        view.status("taxpayer_profiles"),
        Some(LoadStatus::Skipped { .. })
    ));
    assert_eq!(no_ie.calls_matching("fis_afre_periodo").len(), 1);
}

#[tokio::test]
async fn stages_run_in_order() {
    let fake = sector_warehouse();
    let _ = pipeline()
        .load_dependent_sector_view(&fake, &CancellationToken::new())
        .await;
    let calls = fake.calls();
    let position = |table: &str| {
        calls
            .iter()
            .position(|s| s.sql.contains(table))
            .unwrap_or_else(|| panic!("{table} not queried"))
    };
    let root = position("fis_of_raw");
    let stage_one = ["fis_of_em_numeros_dde", "fis_of_em_numeros_notif", "fis_of_em_numeros_tifdp"]
        .map(|t| position(t));
    let stage_two = ["fis_afre_periodo", "vw_ods_contrib"].map(|t| position(t));
    let stage_three = ["fis_tabela_infracoes", "fis_acomp_raw", "fis_termo_encerram_fisc_raw"]
        .map(|t| position(t));

    assert_eq!(root, 0);
    assert!(stage_one.iter().max() < stage_two.iter().min());
    assert!(stage_two.iter().max() < stage_three.iter().min());
    assert_eq!(calls.len(), 9);
}

#[tokio::test]
async fn root_failure_empties_every_slot_and_is_retried() {
    let fake = FakeWarehouse::new("fake-root-fail");
    fake.fail("fis_of_raw", "permission denied");
    let pipeline = pipeline();
    let cancel = CancellationToken::new();

    let view = pipeline.load_dependent_sector_view(&fake, &cancel).await;
    assert_every_planned_name(&view);
    match view.status(ROOT_DATASET) {
        Some(LoadStatus::Failed { error }) => assert_eq!(error.code, "root_failed"),
        other => panic!("unexpected root status {other:?}"),
    }
    let _ = pipeline.load_dependent_sector_view(&fake, &cancel).await;
    assert_eq!(fake.fetch_calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn unreachable_warehouse_reports_connectivity() {
    let fake = sector_warehouse();
    fake.set_probe_failure(true);
    let view = pipeline()
        .load_dependent_sector_view(&fake, &CancellationToken::new())
        .await;
    assert_every_planned_name(&view);
    assert_eq!(fake.fetch_calls.load(Ordering::Relaxed), 0);
    match view.status("declarations") {
        Some(LoadStatus::Failed { error }) => assert_eq!(error.code, "connectivity"),
        other => panic!("unexpected status {other:?}"),
    }
}

#[tokio::test]
async fn sector_view_is_cached_as_one_unit() {
    let fake = sector_warehouse();
    let pipeline = pipeline();
    let cancel = CancellationToken::new();
    let first = pipeline.load_dependent_sector_view(&fake, &cancel).await;
    let second = pipeline.load_dependent_sector_view(&fake, &cancel).await;
    assert_eq!(first, second);
    assert_eq!(fake.fetch_calls.load(Ordering::Relaxed), 9);
}

#[tokio::test]
async fn cancelled_view_keeps_its_shape_and_is_not_cached() {
    let fake = sector_warehouse().with_delay(Duration::from_secs(30));
    let pipeline = pipeline();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let view = pipeline.load_dependent_sector_view(&fake, &cancel).await;
    assert_every_planned_name(&view);
    assert_eq!(view.total_rows(), 0);
    assert!(pipeline.cache().is_empty().await);
}

#[tokio::test]
async fn linking_identifiers_reach_dependent_filters_as_stored() {
    let fake = FakeWarehouse::new("fake-padded-ids");
    fake.respond(
        "fis_of_raw",
        RawTable::new(
            &["NU_OF", "NU_MAT_EMITENTE", "NU_MAT_COORDENADOR"],
            vec![
                vec![Value::from("00123"), Value::from("0101"), Value::Null],
                vec![Value::from("12345678901234567891"), Value::from("0101"), Value::from("900")],
            ],
        ),
    );
    fake.respond(
        "fis_of_em_numeros_dde",
        RawTable::new(
            &["nu_declaracao", "nu_of", "nu_ie"],
            vec![vec![Value::from("7"), Value::from("00123"), Value::from("0012345678")]],
        ),
    );
    let view = pipeline()
        .load_dependent_sector_view(&fake, &CancellationToken::new())
        .await;

    let declarations = fake.calls_matching("fis_of_em_numeros_dde");
    assert_eq!(
        text_params(&declarations[0].params),
        vec!["00123", "12345678901234567891"]
    );
    let auditors = fake.calls_matching("fis_afre_periodo");
    assert_eq!(text_params(&auditors[0].params), vec!["0101", "900"]);
    let taxpayers = fake.calls_matching("vw_ods_contrib");
    assert_eq!(text_params(&taxpayers[0].params), vec!["0012345678"]);

    let root = view.get(ROOT_DATASET).expect("root");
    assert_eq!(root.get(0, "nu_of"), Some(&Value::from("00123")));
    let declarations = view.get("declarations").expect("slot");
    assert_eq!(declarations.get(0, "nu_declaracao"), Some(&Value::Integer(7)));
}
