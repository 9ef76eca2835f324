// SPDX-License-Identifier: Apache-2.0

//! The reporting snapshot: fifteen pre-aggregated tables of the analytical
//! schema, fetched together by the batch loader.

use fisca_model::{ManifestEntry, ResultKind};

pub const SNAPSHOT_MANIFEST: &[ManifestEntry] = &[
    ManifestEntry::new(
        "executive_dashboard",
        "SELECT * FROM {schema}.fisca_dashboard_executivo ORDER BY ano DESC",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "state_analysis",
        "SELECT estado_documento, status_normalizado, eh_valida, eh_regularizada_sem_nf, \
         COUNT(*) AS qtd, SUM(gerou_notificacao) AS com_nf, SUM(valor_total) AS valor_total, \
         ROUND(AVG(valor_total), 2) AS valor_medio \
         FROM {schema}.fisca_infracoes_base \
         WHERE ano_infracao >= 2020 \
         GROUP BY estado_documento, status_normalizado, eh_valida, eh_regularizada_sem_nf \
         ORDER BY qtd DESC",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "conversion_summary",
        "SELECT ano_infracao AS ano, COUNT(*) AS total_infracoes, \
         SUM(eh_valida) AS infracoes_validas, \
         SUM(CASE WHEN eh_valida = 0 THEN 1 ELSE 0 END) AS canceladas, \
         SUM(CASE WHEN eh_valida = 1 AND gerou_notificacao = 1 THEN 1 ELSE 0 END) AS com_nf, \
         SUM(eh_regularizada_sem_nf) AS regularizadas_sem_nf, \
         ROUND(SUM(CASE WHEN eh_valida = 1 AND gerou_notificacao = 1 THEN 1 ELSE 0 END) * 100.0 \
         / NULLIF(SUM(eh_valida), 0), 2) AS taxa_conversao_formal, \
         ROUND((SUM(CASE WHEN eh_valida = 1 AND gerou_notificacao = 1 THEN 1 ELSE 0 END) \
         + SUM(eh_regularizada_sem_nf)) * 100.0 / NULLIF(SUM(eh_valida), 0), 2) \
         AS taxa_efetividade_fiscal \
         FROM {schema}.fisca_infracoes_base \
         WHERE ano_infracao >= 2020 \
         GROUP BY ano_infracao \
         ORDER BY ano_infracao DESC",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "metrics_by_management",
        "SELECT * FROM {schema}.fisca_metricas_por_gerencia ORDER BY ano DESC, qtd_fiscalizacoes DESC",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "metrics_by_ges",
        "SELECT * FROM {schema}.fisca_metricas_por_ges ORDER BY ano DESC, qtd_fiscalizacoes DESC",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "company_distribution_by_ges",
        "SELECT nm_ges, COUNT(*) AS qtd_empresas, \
         ROUND(COUNT(*) * 100.0 / SUM(COUNT(*)) OVER(), 2) AS percentual \
         FROM {schema}.fisca_empresas_base \
         WHERE nm_ges IS NOT NULL AND nm_ges LIKE 'GES%' \
         GROUP BY nm_ges \
         ORDER BY qtd_empresas DESC",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "metrics_by_cnae",
        "SELECT * FROM {schema}.fisca_metricas_por_cnae \
         ORDER BY ano DESC, qtd_fiscalizacoes DESC LIMIT 500",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "metrics_by_municipality",
        "SELECT * FROM {schema}.fisca_metricas_por_municipio \
         ORDER BY ano DESC, qtd_fiscalizacoes DESC LIMIT 500",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "infraction_ranking",
        "SELECT * FROM {schema}.fisca_ranking_infracoes ORDER BY ano DESC, qtd_ocorrencias DESC",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "metrics_by_auditor",
        "SELECT * FROM {schema}.fisca_metricas_por_afre \
         WHERE ano >= YEAR(CURRENT_DATE()) - 3 \
         ORDER BY ano DESC, qtd_nfs DESC",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "auditor_registry",
        "SELECT * FROM {schema}.fisca_afres_cadastro",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "infraction_catalog",
        "SELECT * FROM {schema}.fisca_catalogo_infracoes",
        ResultKind::Full,
    ),
    ManifestEntry::new(
        "company_summary",
        "SELECT DISTINCT cnpj, nm_razao_social, municipio, regime_tributario \
         FROM {schema}.fisca_empresas_base \
         ORDER BY nm_razao_social \
         LIMIT 10000",
        ResultKind::Summary,
    ),
    ManifestEntry::new(
        "score_summary",
        "SELECT classificacao_efetividade, COUNT(*) AS qtd, \
         ROUND(AVG(score_efetividade_final), 2) AS score_medio, \
         ROUND(AVG(valor_total_infracao), 2) AS valor_medio \
         FROM {schema}.fisca_scores_efetividade \
         GROUP BY classificacao_efetividade",
        ResultKind::Aggregate,
    ),
    ManifestEntry::new(
        "inspection_stats",
        "SELECT COUNT(DISTINCT id_documento) AS total_fiscalizacoes, \
         COUNT(DISTINCT identificador) AS total_empresas, \
         SUM(gerou_notificacao) AS total_nfs, \
         SUM(CASE WHEN gerou_notificacao = 1 THEN 1 ELSE 0 END) AS fiscalizacoes_com_nf, \
         SUM(ciclo_completo) AS total_ciclos_completos, \
         ROUND(AVG(valor_total_infracao), 2) AS valor_medio_infracao, \
         ROUND(AVG(dias_infracao_ate_nf), 0) AS media_dias_ate_nf, \
         SUM(eh_valida) AS fiscalizacoes_validas, \
         SUM(CASE WHEN eh_valida = 0 THEN 1 ELSE 0 END) AS fiscalizacoes_canceladas, \
         SUM(eh_regularizada_sem_nf) AS fiscalizacoes_regularizadas_sem_nf \
         FROM {schema}.fisca_fiscalizacoes_consolidadas",
        ResultKind::Aggregate,
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use fisca_model::{validate_manifest, SCHEMA_PLACEHOLDER};

    #[test]
    fn snapshot_manifest_is_valid() {
        validate_manifest(SNAPSHOT_MANIFEST).expect("valid manifest");
        assert_eq!(SNAPSHOT_MANIFEST.len(), 15);
    }

    #[test]
    fn every_query_is_schema_qualified() {
        for entry in SNAPSHOT_MANIFEST {
            assert!(
                entry.query.contains(SCHEMA_PLACEHOLDER),
                "{} lacks a schema placeholder",
                entry.name
            );
            assert!(!entry.render_query("teste").contains(SCHEMA_PLACEHOLDER));
        }
    }

    #[test]
    fn kinds_match_table_roles() {
        let kind = |name: &str| {
            SNAPSHOT_MANIFEST
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.kind)
        };
        assert_eq!(kind("company_summary"), Some(ResultKind::Summary));
        assert_eq!(kind("score_summary"), Some(ResultKind::Aggregate));
        assert_eq!(kind("executive_dashboard"), Some(ResultKind::Full));
    }
}
