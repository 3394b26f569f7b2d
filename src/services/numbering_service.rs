// src/services/numbering_service.rs

use chrono::{DateTime, Datelike, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::{common::error::AppError, db::NumberingRepository, models::sales::DocumentKind};

const SEQUENCE_WIDTH: usize = 5;

/// `INV-202610-`
pub fn period_prefix(kind: DocumentKind, at: DateTime<Utc>) -> String {
    format!("{}-{:04}{:02}-", kind.code(), at.year(), at.month())
}

/// `INV-202610-` + 7 → `INV-202610-00007`
pub fn format_number(prefix: &str, sequence: i64) -> String {
    format!("{prefix}{sequence:0width$}", width = SEQUENCE_WIDTH)
}

#[derive(Clone)]
pub struct NumberingService {
    repo: NumberingRepository,
}

impl NumberingService {
    pub fn new(repo: NumberingRepository) -> Self {
        Self { repo }
    }

    /// Próximo número do tipo `kind` no mês de `at`, para o tenant atual.
    ///
    /// Roda dentro da transação de quem chama: a linha de sequência `(tenant, prefixo)` fica
    /// travada até o commit, então duas criações concorrentes nunca contam o mesmo total.
    /// A restrição `UNIQUE (tenant_id, número)` continua valendo como última barreira.
    pub async fn next(
        &self,
        conn: &mut PgConnection,
        kind: DocumentKind,
        at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let tenant_id = self.repo.tenant_id()?;
        self.next_for(conn, tenant_id, kind, at).await
    }

    pub async fn next_for(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        kind: DocumentKind,
        at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let prefix = period_prefix(kind, at);

        self.repo.lock_sequence(&mut *conn, tenant_id, &prefix).await?;
        let existing = self
            .repo
            .count_with_prefix(&mut *conn, kind, tenant_id, &prefix)
            .await?;

        Ok(format_number(&prefix, existing + 1))
    }
}
