// src/db/scoped_repo.rs

use std::marker::PhantomData;

use sqlx::{
    postgres::PgRow, query_builder::Separated, Executor, FromRow, Postgres, QueryBuilder,
};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    middleware::tenancy::Scope,
};

// ---
// Mapeamento entidade → tabela (conhecido em tempo de compilação)
// ---

/// Linha persistida que pertence a um tenant.
pub trait TenantEntity: for<'r> FromRow<'r, PgRow> + Send + Unpin {
    const TABLE: &'static str;
    /// Nome usado na mensagem de `NotFound`.
    const ENTITY: &'static str;
    const TENANT_COLUMN: &'static str = "tenant_id";
    const UPDATED_AT: Option<&'static str> = Some("updated_at");
}

/// Valores de um INSERT, sem `tenant_id` (o tenant sempre vem do contexto).
pub trait InsertRow {
    const COLUMNS: &'static [&'static str];

    /// Faz o bind de um valor por coluna, na ordem de `COLUMNS`.
    fn push_values<'args>(&self, values: &mut Separated<'_, 'args, Postgres, &'static str>);
}

/// Alteração parcial. Devolve quantas atribuições escreveu.
pub trait UpdateRow {
    fn push_assignments<'args>(&self, set: &mut Separated<'_, 'args, Postgres, &'static str>)
        -> usize;
}

/// Adiciona `AND [alias.]tenant_id = $n` quando o escopo tem tenant.
/// Em escopo sem tenant (plataforma) nenhum predicado é adicionado.
pub fn push_tenant_predicate(
    qb: &mut QueryBuilder<'_, Postgres>,
    scope: Scope,
    alias: Option<&str>,
    column: &str,
) {
    if let Scope::Tenant(tenant_id) = scope {
        qb.push(" AND ");
        if let Some(alias) = alias {
            qb.push(alias).push(".");
        }
        qb.push(column).push(" = ").push_bind(tenant_id);
    }
}

// ---
// Repositório base
// ---

/// Operações genéricas com o filtro de tenant aplicado em toda consulta.
/// Linha de outro tenant é invisível: o resultado é `NotFound`, igual a uma linha inexistente.
pub struct ScopedRepository<T> {
    require_context: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for ScopedRepository<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ScopedRepository<T> {}

impl<T: TenantEntity> ScopedRepository<T> {
    pub fn new(require_context: bool) -> Self {
        Self {
            require_context,
            _entity: PhantomData,
        }
    }

    pub fn scope(&self) -> Result<Scope, AppError> {
        Scope::current(self.require_context)
    }

    /// `SELECT ... FROM tabela [alias] WHERE TRUE [AND tenant]`.
    /// Quem chama acrescenta filtros com `AND ...`, joins devem usar o alias.
    pub fn scoped_query(&self, alias: Option<&str>) -> Result<QueryBuilder<'static, Postgres>, AppError> {
        let scope = self.scope()?;
        Ok(Self::select_for(scope, alias))
    }

    fn select_for(scope: Scope, alias: Option<&str>) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        match alias {
            Some(a) => {
                qb.push(a).push(".* FROM ").push(T::TABLE).push(" ").push(a);
            }
            None => {
                qb.push("* FROM ").push(T::TABLE);
            }
        }
        qb.push(" WHERE TRUE");
        push_tenant_predicate(&mut qb, scope, alias, T::TENANT_COLUMN);
        qb
    }

    fn by_id(&self, id: Uuid) -> Result<QueryBuilder<'static, Postgres>, AppError> {
        let mut qb = self.scoped_query(None)?;
        qb.push(" AND id = ").push_bind(id);
        Ok(qb)
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<T, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.by_id(id)?;
        qb.build_query_as::<T>()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::not_found(T::ENTITY))
    }

    /// Igual a `find_by_id`, mas trava a linha até o fim da transação.
    pub async fn find_by_id_for_update<'e, E>(&self, executor: E, id: Uuid) -> Result<T, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let mut qb = self.by_id(id)?;
        qb.push(" FOR UPDATE");
        qb.build_query_as::<T>()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::not_found(T::ENTITY))
    }

    /// Insere com o `tenant_id` do contexto. Exige um tenant concreto.
    pub async fn create<'e, E, R>(&self, executor: E, row: &R) -> Result<T, AppError>
    where
        E: Executor<'e, Database = Postgres>,
        R: InsertRow,
    {
        let tenant_id = self.scope()?.require_tenant()?;

        let mut qb = QueryBuilder::new("INSERT INTO ");
        qb.push(T::TABLE).push(" (").push(T::TENANT_COLUMN);
        for column in R::COLUMNS {
            qb.push(", ").push(*column);
        }
        qb.push(") VALUES (");
        {
            let mut values = qb.separated(", ");
            values.push_bind(tenant_id);
            row.push_values(&mut values);
        }
        qb.push(") RETURNING *");

        let created = qb.build_query_as::<T>().fetch_one(executor).await?;
        Ok(created)
    }

    pub async fn update<'e, E, U>(&self, executor: E, id: Uuid, patch: &U) -> Result<T, AppError>
    where
        E: Executor<'e, Database = Postgres>,
        U: UpdateRow,
    {
        let scope = self.scope()?;
        let mut qb = Self::update_query(scope, id, patch);
        qb.build_query_as::<T>()
            .fetch_optional(executor)
            .await?
            .ok_or_else(|| AppError::not_found(T::ENTITY))
    }

    fn update_query<U: UpdateRow>(scope: Scope, id: Uuid, patch: &U) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("UPDATE ");
        qb.push(T::TABLE).push(" SET ");
        let written = {
            let mut set = qb.separated(", ");
            let mut written = patch.push_assignments(&mut set);
            if let Some(column) = T::UPDATED_AT {
                set.push(column).push_unseparated(" = NOW()");
                written += 1;
            }
            written
        };
        if written == 0 {
            // Nada a alterar: vira um UPDATE inócuo só para devolver a linha.
            qb.push("id = id");
        }
        qb.push(" WHERE id = ").push_bind(id);
        push_tenant_predicate(&mut qb, scope, None, T::TENANT_COLUMN);
        qb.push(" RETURNING *");
        qb
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let scope = self.scope()?;
        let mut qb = QueryBuilder::new("DELETE FROM ");
        qb.push(T::TABLE).push(" WHERE id = ").push_bind(id);
        push_tenant_predicate(&mut qb, scope, None, T::TENANT_COLUMN);

        let result = qb.build().execute(executor).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found(T::ENTITY));
        }
        Ok(())
    }

    pub async fn count<'e, E>(&self, executor: E) -> Result<i64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let scope = self.scope()?;
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM ");
        qb.push(T::TABLE).push(" WHERE TRUE");
        push_tenant_predicate(&mut qb, scope, None, T::TENANT_COLUMN);

        let total = qb.build_query_scalar::<i64>().fetch_one(executor).await?;
        Ok(total)
    }
}
