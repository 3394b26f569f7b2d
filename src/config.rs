// src/config.rs

use std::{env, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::db_utils::TxSettings,
    db::{
        CrmRepository, FinanceRepository, InventoryRepository, NumberingRepository,
        SalesRepository, TenantRepository,
    },
    services::{
        auth::TokenVerifier, crm_service::CrmService, edocument_service::EDocumentService,
        inventory_service::InventoryService, ledger_service::LedgerService,
        numbering_service::NumberingService, payment_service::PaymentService,
        sales_service::SalesService, tenancy_service::TenantService,
        transfer_service::TransferService,
    },
};

// ---
// Configuração (lida do ambiente / .env)
// ---
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub tx: TxSettings,
    /// Quando ligado, acesso a dados sem contexto de tenant é recusado em vez de
    /// seguir sem filtro (modo plataforma).
    pub require_tenant_context: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Monta a configuração a partir de uma função de busca (facilita os testes).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10u32)?;
        let acquire_secs = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3u64)?;
        let lock_timeout_ms = parse_or(&lookup, "DB_LOCK_TIMEOUT_MS", 5_000u64)?;
        let statement_timeout_ms = parse_or(&lookup, "DB_STATEMENT_TIMEOUT_MS", 15_000u64)?;
        let require_tenant_context = parse_or(&lookup, "REQUIRE_TENANT_CONTEXT", false)?;

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            db_max_connections,
            db_acquire_timeout: Duration::from_secs(acquire_secs),
            tx: TxSettings {
                lock_timeout_ms,
                statement_timeout_ms,
            },
            require_tenant_context,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} inválido: '{raw}'")),
        None => Ok(default),
    }
}

// ---
// Estado compartilhado da aplicação
// ---
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: AppConfig,
    pub token_verifier: TokenVerifier,
    pub tenant_service: TenantService,
    pub ledger_service: LedgerService,
    pub inventory_service: InventoryService,
    pub crm_service: CrmService,
    pub sales_service: SalesService,
    pub transfer_service: TransferService,
    pub payment_service: PaymentService,
    pub edocument_service: EDocumentService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::with_pool(config, db_pool))
    }

    /// Monta o gráfico de dependências sobre uma pool já criada.
    pub fn with_pool(config: AppConfig, db_pool: PgPool) -> Self {
        let strict = config.require_tenant_context;
        let tx = config.tx;

        let tenant_repo = TenantRepository::new(strict);
        let finance_repo = FinanceRepository::new(strict);
        let crm_repo = CrmRepository::new(strict);
        let inventory_repo = InventoryRepository::new(strict);
        let sales_repo = SalesRepository::new(strict);

        let numbering_service = NumberingService::new(NumberingRepository::new(strict));
        let tenant_service = TenantService::new(tenant_repo, db_pool.clone());
        let ledger_service =
            LedgerService::new(finance_repo, crm_repo.clone(), db_pool.clone(), tx);
        let inventory_service = InventoryService::new(inventory_repo, db_pool.clone(), tx);
        let crm_service = CrmService::new(crm_repo, db_pool.clone());

        let sales_service = SalesService::new(
            sales_repo.clone(),
            tenant_service.clone(),
            crm_service.clone(),
            inventory_service.clone(),
            ledger_service.clone(),
            numbering_service.clone(),
            db_pool.clone(),
            tx,
        );
        let transfer_service = TransferService::new(
            sales_repo.clone(),
            tenant_service.clone(),
            inventory_service.clone(),
            numbering_service.clone(),
            db_pool.clone(),
            tx,
        );
        let payment_service = PaymentService::new(
            sales_repo.clone(),
            tenant_service.clone(),
            ledger_service.clone(),
            numbering_service.clone(),
            db_pool.clone(),
            tx,
        );
        let edocument_service = EDocumentService::new(
            sales_repo,
            tenant_service.clone(),
            numbering_service,
            db_pool.clone(),
            tx,
        );

        Self {
            token_verifier: TokenVerifier::new(config.jwt_secret.clone()),
            db_pool,
            config,
            tenant_service,
            ledger_service,
            inventory_service,
            crm_service,
            sales_service,
            transfer_service,
            payment_service,
            edocument_service,
        }
    }
}
