// SPDX-License-Identifier: Apache-2.0

use crate::cache::CacheKey;
use crate::isolate::guarded;
use crate::Pipeline;
use fisca_model::{Dataset, SCHEMA_PLACEHOLDER};
use fisca_query::{fetch_dataset, Statement, WarehouseConnection};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, warn, Instrument};

/// A single-subject query of the on-demand loader. The subject is bound as a
/// parameter; it is never interpreted or validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityQuery {
    pub operation: &'static str,
    pub template: &'static str,
}

pub const ENTITY_DETAIL: EntityQuery = EntityQuery {
    operation: "entity_detail",
    template: "SELECT * FROM {schema}.fisca_empresas_base WHERE cnpj = ?",
};

pub const ENTITY_RELATED: EntityQuery = EntityQuery {
    operation: "entity_related",
    template: "SELECT * FROM {schema}.fisca_fiscalizacoes_consolidadas \
               WHERE cnpj = ? ORDER BY data_infracao DESC",
};

pub const INSPECTION_AUDITORS: EntityQuery = EntityQuery {
    operation: "inspection_auditors",
    template: "SELECT apd.*, ac.nome_afre, ac.cargo \
               FROM {schema}.fisca_afres_por_documento apd \
               LEFT JOIN {schema}.fisca_afres_cadastro ac \
               ON apd.matricula_afre = ac.matricula_afre \
               WHERE apd.id_documento = ? \
               ORDER BY apd.percentual_participacao DESC",
};

pub const EFFECTIVENESS_SCORES: EntityQuery = EntityQuery {
    operation: "effectiveness_scores",
    template: "SELECT * FROM {schema}.fisca_scores_efetividade \
               ORDER BY score_efetividade_final DESC LIMIT {limit}",
};

pub const TRAINING_DATASET: EntityQuery = EntityQuery {
    operation: "training_dataset",
    template: "SELECT fc.*, se.score_efetividade_final, se.classificacao_efetividade, \
               eb.regime_tributario, eb.cnae_secao, eb.cnae_divisao \
               FROM {schema}.fisca_fiscalizacoes_consolidadas fc \
               LEFT JOIN {schema}.fisca_scores_efetividade se ON fc.id_documento = se.id_documento \
               LEFT JOIN {schema}.fisca_empresas_base eb ON fc.cnpj = eb.cnpj \
               WHERE fc.ano_infracao >= YEAR(CURRENT_DATE()) - 3",
};

const LIMIT_PLACEHOLDER: &str = "{limit}";

impl EntityQuery {
    fn render(&self, schema: &str) -> String {
        self.template.replace(SCHEMA_PLACEHOLDER, schema)
    }
}

impl Pipeline {
    /// Company master row for one CNPJ.
    pub async fn load_entity_detail(
        &self,
        conn: &dyn WarehouseConnection,
        cnpj: &str,
        cancel: &CancellationToken,
    ) -> Dataset {
        self.load_for_subject(conn, &ENTITY_DETAIL, cnpj, cancel).await
    }

    /// Inspections of one CNPJ, newest first.
    pub async fn load_entity_related(
        &self,
        conn: &dyn WarehouseConnection,
        cnpj: &str,
        cancel: &CancellationToken,
    ) -> Dataset {
        self.load_for_subject(conn, &ENTITY_RELATED, cnpj, cancel).await
    }

    pub async fn load_inspection_auditors(
        &self,
        conn: &dyn WarehouseConnection,
        document_id: &str,
        cancel: &CancellationToken,
    ) -> Dataset {
        self.load_for_subject(conn, &INSPECTION_AUDITORS, document_id, cancel)
            .await
    }

    /// Top `limit` effectiveness scores; `None` uses the configured default.
    pub async fn load_effectiveness_scores(
        &self,
        conn: &dyn WarehouseConnection,
        limit: Option<usize>,
        cancel: &CancellationToken,
    ) -> Dataset {
        let limit = limit.unwrap_or(self.config.default_score_limit);
        let sql = EFFECTIVENESS_SCORES
            .render(&self.config.analytical_schema)
            .replace(LIMIT_PLACEHOLDER, &limit.to_string());
        self.load_cached(
            conn,
            &EFFECTIVENESS_SCORES,
            limit.to_string(),
            Statement::new(sql),
            cancel,
        )
        .await
    }

    pub async fn load_training_dataset(
        &self,
        conn: &dyn WarehouseConnection,
        cancel: &CancellationToken,
    ) -> Dataset {
        let sql = TRAINING_DATASET.render(&self.config.analytical_schema);
        self.load_cached(conn, &TRAINING_DATASET, String::new(), Statement::new(sql), cancel)
            .await
    }

    async fn load_for_subject(
        &self,
        conn: &dyn WarehouseConnection,
        query: &EntityQuery,
        subject: &str,
        cancel: &CancellationToken,
    ) -> Dataset {
        let statement = Statement::new(query.render(&self.config.analytical_schema)).bind(subject);
        self.load_cached(conn, query, subject.to_string(), statement, cancel)
            .await
    }

    async fn load_cached(
        &self,
        conn: &dyn WarehouseConnection,
        query: &EntityQuery,
        subject: String,
        statement: Statement,
        cancel: &CancellationToken,
    ) -> Dataset {
        let key = CacheKey::new(conn.scope(), query.operation, subject);
        let span = info_span!("load_entity", operation = query.operation, subject = key.subject());
        let loaded = self
            .cache
            .get_or_compute(&key, self.config.entity_ttl, || {
                guarded(&self.limits, cancel, fetch_dataset(conn, &statement))
            })
            .instrument(span)
            .await;
        match loaded {
            Ok(dataset) => Dataset::clone(&dataset),
            Err(err) => {
                warn!(
                    operation = query.operation,
                    subject = key.subject(),
                    error = %err,
                    "entity load failed; returning empty dataset"
                );
                Dataset::empty()
            }
        }
    }
}
