use sqlx::{PgPool, Postgres, Transaction};

use crate::common::error::AppError;

/// Limites aplicados a toda transação de negócio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSettings {
    pub lock_timeout_ms: u64,
    pub statement_timeout_ms: u64,
}

impl Default for TxSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            statement_timeout_ms: 15_000,
        }
    }
}

// ---
// Helper: abre a transação já com os limites de espera
// ---
/// Abre uma transação e aplica `lock_timeout`/`statement_timeout` válidos só para ela.
/// Uma espera por bloqueio que estoura o limite aborta a transação inteira e chega ao
/// chamador como `Conflict` (ver `AppError::from(sqlx::Error)`), sem re-tentativa.
pub(crate) async fn begin_transaction(
    pool: &PgPool,
    settings: &TxSettings,
) -> Result<Transaction<'static, Postgres>, AppError> {
    let mut tx = pool.begin().await?;

    // SET LOCAL não aceita parâmetro ($1); set_config(..., true) é o equivalente com bind.
    sqlx::query("SELECT set_config('lock_timeout', $1, true)")
        .bind(format!("{}ms", settings.lock_timeout_ms))
        .execute(&mut *tx)
        .await?;

    sqlx::query("SELECT set_config('statement_timeout', $1, true)")
        .bind(format!("{}ms", settings.statement_timeout_ms))
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}
