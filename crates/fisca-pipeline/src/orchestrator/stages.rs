// SPDX-License-Identifier: Apache-2.0

//! Declarative plan of the sector view: one root query and three ordered
//! stages. Each stage first derives its key sets from datasets already
//! loaded, then runs its queries concurrently.

/// Named key sets flowing between stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[non_exhaustive]
pub enum KeyName {
    /// Authorized operator identifiers, taken from configuration.
    Operators,
    /// Inspection order numbers of the root.
    Orders,
    /// Auditor registration numbers (issuer and coordinator) of the root.
    Auditors,
    /// State registrations of taxpayers touched by the order-level datasets.
    Taxpayers,
}

impl KeyName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Operators => "operators",
            Self::Orders => "orders",
            Self::Auditors => "auditors",
            Self::Taxpayers => "taxpayers",
        }
    }
}

/// How one query is filtered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Unfiltered,
    /// `IN ({keys})` over the named set; an empty set skips the query.
    Keys(KeyName),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependentQuery {
    pub name: &'static str,
    pub template: &'static str,
    pub input: KeyInput,
}

/// Builds `key` from `columns` of every listed dataset that is loaded,
/// non-empty and carries the column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDerivation {
    pub key: KeyName,
    pub datasets: &'static [&'static str],
    pub columns: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub name: &'static str,
    pub derives: &'static [KeyDerivation],
    pub queries: &'static [DependentQuery],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorPlan {
    pub root: DependentQuery,
    pub stages: &'static [Stage],
}

impl SectorPlan {
    /// Every dataset name the plan produces, root first.
    pub fn dataset_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.root.name).chain(
            self.stages
                .iter()
                .flat_map(|stage| stage.queries.iter().map(|q| q.name)),
        )
    }

    pub fn dependent_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.dataset_names().skip(1)
    }

    /// Columns any stage derives keys from. They link queries together and
    /// must reach the next filter exactly as the warehouse stored them.
    #[must_use]
    pub fn key_columns(&self) -> Vec<&'static str> {
        let mut columns: Vec<&'static str> = self
            .stages
            .iter()
            .flat_map(|stage| stage.derives.iter())
            .flat_map(|derivation| derivation.columns.iter().copied())
            .collect();
        columns.sort_unstable();
        columns.dedup();
        columns
    }
}

pub const ROOT_DATASET: &str = "inspection_orders";

pub const ROOT_QUERY: DependentQuery = DependentQuery {
    name: ROOT_DATASET,
    template: "SELECT id_documento, numero_documento, nu_of, dt_documento, data_emissao, \
               nm_estado, situacao, cd_usuario_emitente, tx_recomendacoes, dt_inicio, dt_fim, \
               tx_motivacao_of, nm_local_execucao, nm_gerencia, nm_local_emissao, \
               nu_mat_emitente, nu_mat_coordenador, nm_origem, dt_alteracao_ods, cd_ges, nm_ges, \
               YEAR(dt_documento) AS ano \
               FROM {schema}.fis_of_raw \
               WHERE cd_usuario_emitente IN ({keys}) \
               ORDER BY dt_documento DESC",
    input: KeyInput::Keys(KeyName::Operators),
};

const ORDER_STAGE: Stage = Stage {
    name: "orders",
    derives: &[KeyDerivation {
        key: KeyName::Orders,
        datasets: &[ROOT_DATASET],
        columns: &["nu_of"],
    }],
    queries: &[
        DependentQuery {
            name: "declarations",
            template: "SELECT nu_declaracao, nu_of, nu_ie, nm_razao_social, cd_ges, cd_gerfe, \
                       cd_munic, cd_motivo, cd_estado_conta, dt_entrega, vl_declarado, \
                       vl_data_declaracao, vl_total_saldo, vl_pago, vl_parc_pago, vl_parc_saldo, \
                       vl_dva_total, vl_dva_saldo, vl_dva_pago, dt_ultima_atualizacao, \
                       YEAR(dt_entrega) AS ano \
                       FROM {schema}.fis_of_em_numeros_dde \
                       WHERE nu_of IN ({keys}) \
                       ORDER BY dt_entrega DESC",
            input: KeyInput::Keys(KeyName::Orders),
        },
        DependentQuery {
            name: "notifications",
            template: "SELECT nu_notificacao_fiscal, nu_of, nu_ie, nu_cpf, nu_cnpj, \
                       nm_razao_social, cd_gerfe, cd_ges, cd_munic, cd_infracao, \
                       cd_edo_det_conta, nm_estado, dt_documento, vl_total, vl_pago, \
                       vl_parc_pago, vl_parc_saldo, vl_recl_tot, vl_dva_total, vl_dva_saldo, \
                       vl_dva_pago, dt_ultima_atualizacao, dt_ciencia, YEAR(dt_documento) AS ano \
                       FROM {schema}.fis_of_em_numeros_notif \
                       WHERE nu_of IN ({keys}) \
                       ORDER BY dt_documento DESC",
            input: KeyInput::Keys(KeyName::Orders),
        },
        DependentQuery {
            name: "infraction_terms",
            template: "SELECT nu_infr_fiscal, nu_notificacao_gerada, nu_of, nu_ie, nu_cpf, \
                       nu_cnpj, nm_razao_social, cd_ges, cd_gerfe, cd_munic, cd_infracao, \
                       nm_estado, dt_documento, vl_apurado, vl_pago, vl_parc_pago, \
                       vl_parc_saldo, vl_convertido_notif, vl_cancelado, vl_dva_total, \
                       vl_dva_saldo, vl_dva_pago, dt_ultima_atualizacao, dt_ciencia, \
                       YEAR(dt_documento) AS ano \
                       FROM {schema}.fis_of_em_numeros_tifdp \
                       WHERE nu_of IN ({keys}) \
                       ORDER BY dt_documento DESC",
            input: KeyInput::Keys(KeyName::Orders),
        },
    ],
};

const PROFILE_STAGE: Stage = Stage {
    name: "profiles",
    derives: &[
        KeyDerivation {
            key: KeyName::Auditors,
            datasets: &[ROOT_DATASET],
            columns: &["nu_mat_emitente", "nu_mat_coordenador"],
        },
        KeyDerivation {
            key: KeyName::Taxpayers,
            datasets: &["declarations", "notifications", "infraction_terms"],
            columns: &["nu_ie"],
        },
    ],
    queries: &[
        DependentQuery {
            name: "auditor_periods",
            template: "SELECT cd_matricula, nu_ano_ref, nu_per_ref, qt_dias_ativa \
                       FROM {schema}.fis_afre_periodo \
                       WHERE CAST(cd_matricula AS STRING) IN ({keys})",
            input: KeyInput::Keys(KeyName::Auditors),
        },
        DependentQuery {
            name: "taxpayer_profiles",
            template: "SELECT DISTINCT nu_ie, nu_cnpj, nm_razao_social, cd_cnae, de_cnae, \
                       de_secao, nm_enq_empresa, nm_munic \
                       FROM {schema}.vw_ods_contrib \
                       WHERE nu_ie IN ({keys})",
            input: KeyInput::Keys(KeyName::Taxpayers),
        },
    ],
};

const AUXILIARY_STAGE: Stage = Stage {
    name: "auxiliary",
    derives: &[],
    queries: &[
        DependentQuery {
            name: "infraction_catalog",
            template: "SELECT cd_infracao, de_infracao, nm_tributo, vl_multa \
                       FROM {schema}.fis_tabela_infracoes",
            input: KeyInput::Unfiltered,
        },
        DependentQuery {
            name: "follow_ups",
            template: "SELECT id_documento_os, nu_documento_of, nm_estado_os, dt_documento_os, \
                       de_motivo_os \
                       FROM {schema}.fis_acomp_raw \
                       WHERE nu_documento_of IN ({keys}) \
                       ORDER BY dt_documento_os DESC",
            input: KeyInput::Keys(KeyName::Orders),
        },
        DependentQuery {
            name: "closure_terms",
            template: "SELECT nu_termo_encerramento, os, nm_estado, dt_documento, dt_encerramento \
                       FROM {schema}.fis_termo_encerram_fisc_raw \
                       WHERE os IN ({keys}) \
                       ORDER BY dt_documento DESC",
            input: KeyInput::Keys(KeyName::Orders),
        },
    ],
};

pub const SECTOR_PLAN: SectorPlan = SectorPlan {
    root: ROOT_QUERY,
    stages: &[ORDER_STAGE, PROFILE_STAGE, AUXILIARY_STAGE],
};

/// Plan problems caught before any query runs.
pub fn validate_plan(plan: &SectorPlan) -> Result<(), String> {
    let mut produced = std::collections::BTreeSet::new();
    let mut keys = std::collections::BTreeSet::from([KeyName::Operators]);
    if !produced.insert(plan.root.name) {
        return Err(format!("duplicate dataset `{}`", plan.root.name));
    }
    for stage in plan.stages {
        for derivation in stage.derives {
            if let Some(missing) = derivation.datasets.iter().find(|d| !produced.contains(*d)) {
                return Err(format!(
                    "stage `{}` derives {} from `{missing}` before it is loaded",
                    stage.name,
                    derivation.key.as_str()
                ));
            }
            keys.insert(derivation.key);
        }
        for query in stage.queries {
            if let KeyInput::Keys(key) = query.input {
                if !keys.contains(&key) {
                    return Err(format!(
                        "query `{}` needs key set {} which no earlier stage derives",
                        query.name,
                        key.as_str()
                    ));
                }
            }
        }
        for query in stage.queries {
            if !produced.insert(query.name) {
                return Err(format!("duplicate dataset `{}`", query.name));
            }
        }
    }
    Ok(())
}
