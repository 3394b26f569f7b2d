// src/db/numbering_repo.rs

use sqlx::{PgConnection, QueryBuilder, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, middleware::tenancy::Scope, models::sales::DocumentKind};

#[derive(Clone)]
pub struct NumberingRepository {
    require_context: bool,
}

impl NumberingRepository {
    pub fn new(require_context: bool) -> Self {
        Self { require_context }
    }

    pub fn tenant_id(&self) -> Result<Uuid, AppError> {
        Scope::current(self.require_context)?.require_tenant()
    }

    /// Cria (se preciso) e trava a linha `(tenant, prefixo)`.
    /// Toda numeração concorrente do mesmo prefixo espera aqui até o commit de quem chegou antes.
    pub async fn lock_sequence(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        prefix: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO document_sequences (tenant_id, prefix)
            VALUES ($1, $2)
            ON CONFLICT (tenant_id, prefix) DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(prefix)
        .execute(&mut *conn)
        .await?;

        sqlx::query("SELECT prefix FROM document_sequences WHERE tenant_id = $1 AND prefix = $2 FOR UPDATE")
            .bind(tenant_id)
            .bind(prefix)
            .fetch_one(&mut *conn)
            .await?;

        Ok(())
    }

    pub async fn count_with_prefix(
        &self,
        conn: &mut PgConnection,
        kind: DocumentKind,
        tenant_id: Uuid,
        prefix: &str,
    ) -> Result<i64, AppError> {
        let mut qb = Self::count_query(kind);
        qb.push_bind(tenant_id)
            .push(" AND ")
            .push(kind.number_column())
            .push(" LIKE ")
            .push_bind(format!("{prefix}%"));

        let total = qb.build_query_scalar::<i64>().fetch_one(&mut *conn).await?;
        Ok(total)
    }

    fn count_query(kind: DocumentKind) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
        qb.push(kind.table()).push(" WHERE tenant_id = ");
        qb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_targets_the_document_table() {
        let mut qb = NumberingRepository::count_query(DocumentKind::Return);
        qb.push_bind(Uuid::new_v4())
            .push(" AND ")
            .push(DocumentKind::Return.number_column())
            .push(" LIKE ")
            .push_bind("RET-202610-%".to_string());
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM sale_returns WHERE tenant_id = $1 AND return_number LIKE $2"
        );
    }
}
