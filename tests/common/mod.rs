// Apoio compartilhado pelos testes de integração.
#![allow(dead_code)]

use std::collections::HashSet;
use std::future::Future;

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use business_core::{
    config::{AppConfig, AppState},
    middleware::tenancy::{run_with, Identity, TenantContext, SUPERADMIN_ROLE},
    models::{
        crm::{Customer, NewCustomer},
        finance::{Account, AccountType, NewAccount},
        inventory::{AdjustMode, NewProduct, NewWarehouse, Product, Warehouse},
    },
};

pub const JWT_SECRET: &str = "segredo-de-teste";

pub fn test_config() -> AppConfig {
    AppConfig::from_lookup(|key| match key {
        "DATABASE_URL" => Some("postgres://localhost/ignorado".to_string()),
        "JWT_SECRET" => Some(JWT_SECRET.to_string()),
        _ => None,
    })
    .unwrap()
}

pub fn state(pool: PgPool) -> AppState {
    AppState::with_pool(test_config(), pool)
}

pub async fn seed_tenant(pool: &PgPool, name: &str) -> Uuid {
    sqlx::query_scalar("INSERT INTO tenants (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub fn identity(tenant_id: Option<Uuid>, role: &str) -> Identity {
    Identity {
        user_id: Uuid::new_v4(),
        tenant_id,
        role: role.to_string(),
        permissions: HashSet::new(),
    }
}

pub fn tenant_context(tenant_id: Uuid) -> TenantContext {
    TenantContext::establish(identity(Some(tenant_id), "manager"), None).unwrap()
}

pub fn platform_context() -> TenantContext {
    TenantContext::establish(identity(None, SUPERADMIN_ROLE), None).unwrap()
}

/// Executa `f` como um usuário do tenant.
pub async fn as_tenant<F: Future>(tenant_id: Uuid, f: F) -> F::Output {
    run_with(tenant_context(tenant_id), f).await
}

pub fn dec(value: i64) -> Decimal {
    Decimal::from(value)
}

// ---
// Cadastros (sempre rodam dentro de `as_tenant`)
// ---

pub async fn account(state: &AppState, name: &str, opening: i64) -> Account {
    state
        .ledger_service
        .create_account(NewAccount {
            name: name.to_string(),
            account_type: AccountType::Bank,
            currency: "TRY".to_string(),
            opening_balance: dec(opening),
        })
        .await
        .unwrap()
}

pub async fn customer(state: &AppState, name: &str, tax_id: Option<&str>) -> Customer {
    state
        .crm_service
        .create_customer(NewCustomer {
            name: name.to_string(),
            tax_id: tax_id.map(str::to_string),
            ..Default::default()
        })
        .await
        .unwrap()
}

/// Produto a 100,00 + 20% de IVA, com `stock` unidades sem depósito.
pub async fn product(state: &AppState, name: &str, stock: i64) -> Product {
    let product = state
        .inventory_service
        .create_product(NewProduct {
            name: name.to_string(),
            sku: None,
            unit_price: dec(100),
            vat_rate: dec(20),
        })
        .await
        .unwrap();

    if stock > 0 {
        state
            .inventory_service
            .adjust_stock(product.id, None, dec(stock), AdjustMode::Set, None)
            .await
            .unwrap();
    }
    product
}

pub async fn warehouse(state: &AppState, name: &str) -> Warehouse {
    state
        .inventory_service
        .create_warehouse(NewWarehouse {
            name: name.to_string(),
        })
        .await
        .unwrap()
}

pub async fn stock_of(state: &AppState, product_id: Uuid) -> Decimal {
    state
        .inventory_service
        .get_product(product_id)
        .await
        .unwrap()
        .0
        .stock_quantity
}

pub async fn balance_of(state: &AppState, account_id: Uuid) -> Decimal {
    state
        .ledger_service
        .get_account(account_id)
        .await
        .unwrap()
        .account
        .current_balance
}

/// Saldo do par (depósito, produto); sem linha = 0.
pub async fn warehouse_stock_of(state: &AppState, product_id: Uuid, warehouse_id: Uuid) -> Decimal {
    let (_, stocks) = state.inventory_service.get_product(product_id).await.unwrap();
    stocks
        .iter()
        .find(|s| s.warehouse_id == warehouse_id)
        .map(|s| s.quantity)
        .unwrap_or_default()
}
