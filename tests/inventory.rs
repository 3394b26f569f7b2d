// Controle de estoque sob concorrência (precisa de Postgres).

mod common;

use sqlx::PgPool;

use business_core::{
    common::error::AppError,
    middleware::tenancy::run_with,
    models::{
        inventory::{AdjustMode, StockMovementType},
        sales::{
            CreateReturn, CreateSale, CreateStockTransfer, PaymentMethod, ReturnLine, SaleLine,
            TransferLine,
        },
    },
};
use common::{
    account, as_tenant, balance_of, dec, product, seed_tenant, state, stock_of, tenant_context,
    warehouse, warehouse_stock_of,
};

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn decrement_beyond_stock_is_a_conflict(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool.clone());

    as_tenant(tenant, async {
        let item = product(&state, "Farinha 1kg", 25).await;

        let mut tx = pool.begin().await.unwrap();
        let err = state
            .inventory_service
            .decrement_for_sale(&mut tx, item.id, None, dec(30), StockMovementType::Sale, None)
            .await
            .unwrap_err();
        drop(tx);

        match err {
            AppError::Conflict(message) => assert!(message.contains("Estoque insuficiente")),
            other => panic!("esperava Conflict, veio {other:?}"),
        }
        assert_eq!(stock_of(&state, item.id).await, dec(25));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn concurrent_sales_never_oversell(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    let item = as_tenant(tenant, product(&state, "Açúcar 5kg", 10)).await;
    let product_id = item.id;

    // 8 vendas de 3 unidades contra 10 em estoque: exatamente 3 passam.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = state.clone();
        handles.push(tokio::spawn(run_with(tenant_context(tenant), async move {
            state
                .sales_service
                .create_sale(CreateSale {
                    customer_id: None,
                    warehouse_id: None,
                    account_id: None,
                    payment_method: PaymentMethod::Cash,
                    lines: vec![SaleLine {
                        product_id,
                        quantity: dec(3),
                        unit_price: None,
                        discount_rate: dec(0),
                        vat_rate: None,
                    }],
                    notes: None,
                })
                .await
        })));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("falha inesperada: {other:?}"),
        }
    }

    assert_eq!(successes, 3);
    let remaining = as_tenant(tenant, stock_of(&state, item.id)).await;
    assert_eq!(remaining, dec(1));
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn warehouse_counters_follow_the_product_total(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let item = product(&state, "Óleo 900ml", 0).await;
        let central = warehouse(&state, "Central").await;
        let filial = warehouse(&state, "Filial").await;

        let change = state
            .inventory_service
            .adjust_stock(item.id, Some(central.id), dec(40), AdjustMode::Add, None)
            .await
            .unwrap();
        assert_eq!(change.new_quantity, dec(40));
        let movement = change.movement.unwrap();
        assert_eq!(movement.movement_type, StockMovementType::Adjustment);
        assert_eq!(movement.quantity_after, dec(40));

        // Ajuste sem variação não grava movimentação.
        let unchanged = state
            .inventory_service
            .adjust_stock(item.id, Some(central.id), dec(40), AdjustMode::Set, None)
            .await
            .unwrap();
        assert!(unchanged.movement.is_none());

        let err = state
            .inventory_service
            .adjust_stock(item.id, Some(filial.id), dec(1), AdjustMode::Subtract, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let detail = state
            .transfer_service
            .create_transfer(CreateStockTransfer {
                from_warehouse_id: central.id,
                to_warehouse_id: filial.id,
                lines: vec![TransferLine { product_id: item.id, quantity: dec(15) }],
                notes: None,
            })
            .await
            .unwrap();
        assert!(detail.header.transfer_number.starts_with("TRF-"));
        assert_eq!(detail.items.len(), 1);

        let (product, warehouses) = state.inventory_service.get_product(item.id).await.unwrap();
        assert_eq!(product.stock_quantity, dec(40));
        let by_warehouse: Vec<_> = [central.id, filial.id]
            .iter()
            .map(|id| {
                warehouses
                    .iter()
                    .find(|s| s.warehouse_id == *id)
                    .map(|s| s.quantity)
                    .unwrap_or_default()
            })
            .collect();
        assert_eq!(by_warehouse, vec![dec(25), dec(15)]);

        // Mais do que há na origem: nada muda.
        let err = state
            .transfer_service
            .create_transfer(CreateStockTransfer {
                from_warehouse_id: filial.id,
                to_warehouse_id: central.id,
                lines: vec![TransferLine { product_id: item.id, quantity: dec(16) }],
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = state
            .transfer_service
            .create_transfer(CreateStockTransfer {
                from_warehouse_id: filial.id,
                to_warehouse_id: filial.id,
                lines: vec![TransferLine { product_id: item.id, quantity: dec(1) }],
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn warehouse_sale_and_return_move_both_counters(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let caixa = account(&state, "Caixa", 0).await;
        let item = product(&state, "Macarrão 500g", 0).await;
        let central = warehouse(&state, "Central").await;

        state
            .inventory_service
            .adjust_stock(item.id, Some(central.id), dec(10), AdjustMode::Add, None)
            .await
            .unwrap();

        let sale = |quantity| CreateSale {
            customer_id: None,
            warehouse_id: Some(central.id),
            account_id: Some(caixa.id),
            payment_method: PaymentMethod::Cash,
            lines: vec![SaleLine {
                product_id: item.id,
                quantity: dec(quantity),
                unit_price: None,
                discount_rate: dec(0),
                vat_rate: None,
            }],
            notes: None,
        };

        let detail = state.sales_service.create_sale(sale(3)).await.unwrap();
        assert_eq!(detail.sale.warehouse_id, Some(central.id));
        assert_eq!(stock_of(&state, item.id).await, dec(7));
        assert_eq!(warehouse_stock_of(&state, item.id, central.id).await, dec(7));
        assert_eq!(balance_of(&state, caixa.id).await, dec(360));

        // Saída manual no depósito.
        let change = state
            .inventory_service
            .adjust_stock(item.id, Some(central.id), dec(1), AdjustMode::Subtract, None)
            .await
            .unwrap();
        assert_eq!(change.new_quantity, dec(6));
        assert_eq!(stock_of(&state, item.id).await, dec(6));

        // A devolução volta para o depósito da venda.
        state
            .sales_service
            .create_return(CreateReturn {
                sale_id: detail.sale.id,
                lines: vec![ReturnLine { sale_item_id: detail.items[0].id, quantity: dec(2) }],
                refund_account_id: None,
                reason: None,
            })
            .await
            .unwrap();
        assert_eq!(stock_of(&state, item.id).await, dec(8));
        assert_eq!(warehouse_stock_of(&state, item.id, central.id).await, dec(8));
        assert_eq!(balance_of(&state, caixa.id).await, dec(120));

        let err = state.sales_service.create_sale(sale(9)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(warehouse_stock_of(&state, item.id, central.id).await, dec(8));
        assert_eq!(stock_of(&state, item.id).await, dec(8));
    })
    .await;
}
