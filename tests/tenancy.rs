// Isolamento entre tenants e modo plataforma (precisa de Postgres).

mod common;

use sqlx::PgPool;
use uuid::Uuid;

use business_core::{
    common::error::AppError,
    middleware::tenancy::run_with,
    models::{
        crm::{CustomerPatch, NewCustomer},
        sales::{CreateReturn, CreateSale, PaymentMethod, ReturnLine, SaleLine},
    },
};
use common::{
    account, as_tenant, balance_of, customer, dec, platform_context, product, seed_tenant, state,
    stock_of, warehouse,
};

fn one_unit(product_id: Uuid) -> Vec<SaleLine> {
    vec![SaleLine {
        product_id,
        quantity: dec(1),
        unit_price: None,
        discount_rate: dec(0),
        vat_rate: None,
    }]
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn rows_of_another_tenant_are_not_found(pool: PgPool) {
    let t1 = seed_tenant(&pool, "Loja A").await;
    let t2 = seed_tenant(&pool, "Loja B").await;
    let state = state(pool);

    let (cliente, caixa) = as_tenant(t1, async {
        (
            customer(&state, "Emre Çelik", Some("1111111111")).await,
            account(&state, "Caixa", 1_000).await,
        )
    })
    .await;

    as_tenant(t2, async {
        let err = state.crm_service.get_customer(cliente.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = state
            .crm_service
            .update_customer(
                cliente.id,
                CustomerPatch {
                    name: Some("Invadido".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = state.crm_service.delete_customer(cliente.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = state.ledger_service.get_account(caixa.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = state
            .ledger_service
            .transfer(caixa.id, account(&state, "Banco", 0).await.id, dec(10), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    })
    .await;

    // No tenant de origem nada mudou.
    as_tenant(t1, async {
        let (found, _) = state.crm_service.get_customer(cliente.id).await.unwrap();
        assert_eq!(found.name, "Emre Çelik");
        assert_eq!(common::balance_of(&state, caixa.id).await, dec(1_000));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn suspended_tenant_cannot_sell(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool.clone());

    let item = as_tenant(tenant, product(&state, "Sal", 10)).await;

    sqlx::query("UPDATE tenants SET status = 'suspended' WHERE id = $1")
        .bind(tenant)
        .execute(&pool)
        .await
        .unwrap();

    as_tenant(tenant, async {
        let err = state
            .sales_service
            .create_sale(CreateSale {
                customer_id: None,
                warehouse_id: None,
                account_id: None,
                payment_method: PaymentMethod::Cash,
                lines: vec![SaleLine {
                    product_id: item.id,
                    quantity: dec(1),
                    unit_price: None,
                    discount_rate: dec(0),
                    vat_rate: None,
                }],
                notes: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(stock_of(&state, item.id).await, dec(10));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn tenant_listing_is_a_platform_operation(pool: PgPool) {
    let t1 = seed_tenant(&pool, "Loja A").await;
    let t2 = seed_tenant(&pool, "Loja B").await;
    let state = state(pool);

    let tenants = run_with(platform_context(), state.tenant_service.list_tenants())
        .await
        .unwrap();
    let ids: Vec<_> = tenants.iter().map(|t| t.id).collect();
    assert!(ids.contains(&t1));
    assert!(ids.contains(&t2));

    let err = as_tenant(t1, state.tenant_service.list_tenants()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // Sem contexto nenhum também não lista.
    let err = state.tenant_service.list_tenants().await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn writes_need_a_concrete_tenant(pool: PgPool) {
    let _ = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    let new = || NewCustomer {
        name: "Sem dono".into(),
        ..Default::default()
    };

    let err = state.crm_service.create_customer(new()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = run_with(platform_context(), state.crm_service.create_customer(new()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn foreign_and_unknown_references_look_the_same(pool: PgPool) {
    let t1 = seed_tenant(&pool, "Loja A").await;
    let t2 = seed_tenant(&pool, "Loja B").await;
    let state = state(pool.clone());

    let (caixa_t1, cliente_t1, deposito_t1) = as_tenant(t1, async {
        (
            account(&state, "Caixa", 1_000).await,
            customer(&state, "Emre Çelik", None).await,
            warehouse(&state, "Central").await,
        )
    })
    .await;

    as_tenant(t2, async {
        let item = product(&state, "Sal", 10).await;
        let cliente = customer(&state, "Zeynep Kaya", None).await;
        let caixa = account(&state, "Caixa", 0).await;

        let credit_sale = |account_id: Option<Uuid>, customer_id: Uuid, warehouse_id: Option<Uuid>| CreateSale {
            customer_id: Some(customer_id),
            warehouse_id,
            account_id,
            payment_method: PaymentMethod::Credit,
            lines: one_unit(item.id),
            notes: None,
        };

        // Conta de outro tenant numa venda a prazo (nenhum lançamento passaria por ela)
        // e conta inexistente dão o mesmo NotFound.
        for account_id in [caixa_t1.id, Uuid::new_v4()] {
            let err = state
                .sales_service
                .create_sale(credit_sale(Some(account_id), cliente.id, None))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
        }

        for customer_id in [cliente_t1.id, Uuid::new_v4()] {
            let err = state
                .sales_service
                .create_sale(credit_sale(None, customer_id, None))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
        }

        for warehouse_id in [deposito_t1.id, Uuid::new_v4()] {
            let err = state
                .sales_service
                .create_sale(credit_sale(None, cliente.id, Some(warehouse_id)))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
        }
        assert_eq!(stock_of(&state, item.id).await, dec(10));

        // Reembolso apontando para a conta de outro tenant.
        let sale = state
            .sales_service
            .create_sale(CreateSale {
                customer_id: None,
                warehouse_id: None,
                account_id: Some(caixa.id),
                payment_method: PaymentMethod::Cash,
                lines: one_unit(item.id),
                notes: None,
            })
            .await
            .unwrap();
        for refund_account_id in [caixa_t1.id, Uuid::new_v4()] {
            let err = state
                .sales_service
                .create_return(CreateReturn {
                    sale_id: sale.sale.id,
                    lines: vec![ReturnLine { sale_item_id: sale.items[0].id, quantity: dec(1) }],
                    refund_account_id: Some(refund_account_id),
                    reason: None,
                })
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
        }
        assert_eq!(stock_of(&state, item.id).await, dec(9));
        assert_eq!(balance_of(&state, caixa.id).await, dec(120));
    })
    .await;

    // Nada foi gravado do lado de T2 apontando para T1.
    let sales_in_t2: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE tenant_id = $1")
        .bind(t2)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(sales_in_t2, 1);

    as_tenant(t1, async {
        assert_eq!(balance_of(&state, caixa_t1.id).await, dec(1_000));
    })
    .await;
}
