// Orquestradores de venda, devolução, pagamento e documentos (precisa de Postgres).

mod common;

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use business_core::{
    common::error::AppError,
    config::AppState,
    models::{
        crm::{CustomerPatch, CustomerTransactionKind},
        finance::MovementCategory,
        sales::{
            CreatePayment, CreateReturn, CreateSale, DocumentStatus, ExternalInvoice,
            ExternalLine, ExternalParty, PaymentDirection, PaymentMethod, ReturnLine, SaleDetail,
            SaleLine, SaleStatus,
        },
    },
};
use common::{
    account, as_tenant, balance_of, customer, dec, product, seed_tenant, state, stock_of, warehouse,
};

fn line(product_id: Uuid, quantity: i64) -> SaleLine {
    SaleLine {
        product_id,
        quantity: dec(quantity),
        unit_price: None,
        discount_rate: Decimal::ZERO,
        vat_rate: None,
    }
}

async fn credit_sale(state: &AppState, customer_id: Uuid, lines: Vec<SaleLine>) -> SaleDetail {
    state
        .sales_service
        .create_sale(CreateSale {
            customer_id: Some(customer_id),
            warehouse_id: None,
            account_id: None,
            payment_method: PaymentMethod::Credit,
            lines,
            notes: None,
        })
        .await
        .unwrap()
}

async fn cash_sale(state: &AppState, account_id: Uuid, lines: Vec<SaleLine>) -> SaleDetail {
    state
        .sales_service
        .create_sale(CreateSale {
            customer_id: None,
            warehouse_id: None,
            account_id: Some(account_id),
            payment_method: PaymentMethod::Cash,
            lines,
            notes: None,
        })
        .await
        .unwrap()
}

async fn customer_balance(state: &AppState, id: Uuid) -> Decimal {
    state.crm_service.get_customer(id).await.unwrap().0.balance
}

fn invoice(external_id: &str, product_name: &str, quantity: i64) -> ExternalInvoice {
    ExternalInvoice {
        external_id: external_id.to_string(),
        issue_date: None,
        customer: ExternalParty {
            name: "Mercado Bereket".to_string(),
            tax_id: "123 456 7890".to_string(),
        },
        lines: vec![ExternalLine {
            name: product_name.to_string(),
            quantity: dec(quantity),
            unit_price: dec(50),
            vat_rate: dec(10),
        }],
        warehouse_id: None,
        account_id: None,
        payment_method: PaymentMethod::Credit,
    }
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn short_line_rolls_back_the_whole_sale(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let caixa = account(&state, "Caixa", 0).await;
        let a = product(&state, "Arroz 5kg", 5).await;
        let b = product(&state, "Feijão 1kg", 1).await;

        let err = state
            .sales_service
            .create_sale(CreateSale {
                customer_id: None,
                warehouse_id: None,
                account_id: Some(caixa.id),
                payment_method: PaymentMethod::Cash,
                lines: vec![line(a.id, 2), line(b.id, 3)],
                notes: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(stock_of(&state, a.id).await, dec(5));
        assert_eq!(stock_of(&state, b.id).await, dec(1));
        assert_eq!(balance_of(&state, caixa.id).await, Decimal::ZERO);

        // A falha não consumiu número: a próxima venda é a primeira do mês.
        let sale = cash_sale(&state, caixa.id, vec![line(a.id, 1)]).await;
        assert!(sale.sale.invoice_number.ends_with("-00001"));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn credit_sale_posts_a_debt(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let cliente = customer(&state, "Ayşe Yılmaz", None).await;
        let item = product(&state, "Chá 1kg", 10).await;

        // 2 x 100,00 + 20% de IVA
        let detail = credit_sale(&state, cliente.id, vec![line(item.id, 2)]).await;
        assert_eq!(detail.sale.grand_total, dec(240));
        assert_eq!(detail.sale.vat_total, dec(40));
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].product_name, "Chá 1kg");

        assert_eq!(stock_of(&state, item.id).await, dec(8));
        let (found, transactions) = state.crm_service.get_customer(cliente.id).await.unwrap();
        assert_eq!(found.balance, dec(-240));
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].kind, CustomerTransactionKind::Debt);
        assert_eq!(transactions[0].reference_id, Some(detail.sale.id));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn credit_sale_without_customer_is_rejected(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let item = product(&state, "Chá 1kg", 10).await;
        let err = state
            .sales_service
            .create_sale(CreateSale {
                customer_id: None,
                warehouse_id: None,
                account_id: None,
                payment_method: PaymentMethod::Credit,
                lines: vec![line(item.id, 1)],
                notes: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidInput(_)));
        assert_eq!(stock_of(&state, item.id).await, dec(10));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn invoice_numbers_are_sequential_per_tenant(pool: PgPool) {
    let first = seed_tenant(&pool, "Loja A").await;
    let second = seed_tenant(&pool, "Loja B").await;
    let state = state(pool);

    let now = Utc::now();
    let prefix = format!("INV-{:04}{:02}-", now.year(), now.month());

    let numbers = as_tenant(first, async {
        let caixa = account(&state, "Caixa", 0).await;
        let item = product(&state, "Pão", 10).await;
        let mut numbers = Vec::new();
        for _ in 0..2 {
            numbers.push(cash_sale(&state, caixa.id, vec![line(item.id, 1)]).await.sale.invoice_number);
        }
        numbers
    })
    .await;
    assert_eq!(numbers, vec![format!("{prefix}00001"), format!("{prefix}00002")]);

    let other = as_tenant(second, async {
        let caixa = account(&state, "Caixa", 0).await;
        let item = product(&state, "Pão", 10).await;
        cash_sale(&state, caixa.id, vec![line(item.id, 1)]).await.sale.invoice_number
    })
    .await;
    assert_eq!(other, format!("{prefix}00001"));
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn cash_sale_and_cancellation_move_the_account(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let caixa = account(&state, "Caixa", 0).await;
        let item = product(&state, "Queijo", 4).await;

        let detail = cash_sale(&state, caixa.id, vec![line(item.id, 1)]).await;
        assert_eq!(balance_of(&state, caixa.id).await, dec(120));
        let movements = state.ledger_service.get_account(caixa.id).await.unwrap().movements;
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].category, MovementCategory::Sale);

        let cancelled = state.sales_service.cancel_sale(detail.sale.id).await.unwrap();
        assert_eq!(cancelled.status, SaleStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(stock_of(&state, item.id).await, dec(4));
        assert_eq!(balance_of(&state, caixa.id).await, Decimal::ZERO);

        let err = state.sales_service.cancel_sale(detail.sale.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(stock_of(&state, item.id).await, dec(4));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn returns_then_cancel_settle_the_customer(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let cliente = customer(&state, "Mehmet Demir", None).await;
        let item = product(&state, "Azeite", 10).await;

        let detail = credit_sale(&state, cliente.id, vec![line(item.id, 3)]).await;
        let sale_item_id = detail.items[0].id;
        assert_eq!(customer_balance(&state, cliente.id).await, dec(-360));

        let returned = state
            .sales_service
            .create_return(CreateReturn {
                sale_id: detail.sale.id,
                lines: vec![ReturnLine { sale_item_id, quantity: dec(1) }],
                refund_account_id: None,
                reason: Some("Embalagem violada".into()),
            })
            .await
            .unwrap();
        assert!(returned.header.return_number.starts_with("RET-"));
        assert_eq!(returned.header.total_amount, dec(120));
        assert_eq!(returned.header.refund_account_id, None);
        assert_eq!(stock_of(&state, item.id).await, dec(8));
        assert_eq!(customer_balance(&state, cliente.id).await, dec(-240));

        // Restam 2: devolver 3 não passa e nada muda.
        let err = state
            .sales_service
            .create_return(CreateReturn {
                sale_id: detail.sale.id,
                lines: vec![ReturnLine { sale_item_id, quantity: dec(3) }],
                refund_account_id: None,
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(stock_of(&state, item.id).await, dec(8));

        // O cancelamento só estorna o que ainda não foi devolvido.
        state.sales_service.cancel_sale(detail.sale.id).await.unwrap();
        assert_eq!(stock_of(&state, item.id).await, dec(10));
        assert_eq!(customer_balance(&state, cliente.id).await, Decimal::ZERO);

        let after = state.sales_service.get_sale(detail.sale.id).await.unwrap();
        assert_eq!(after.items[0].returned_quantity, dec(1));

        let err = state
            .sales_service
            .create_return(CreateReturn {
                sale_id: detail.sale.id,
                lines: vec![ReturnLine { sale_item_id, quantity: dec(1) }],
                refund_account_id: None,
                reason: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn cash_return_refunds_the_sale_account(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let caixa = account(&state, "Caixa", 0).await;
        let item = product(&state, "Mel", 5).await;

        let detail = cash_sale(&state, caixa.id, vec![line(item.id, 2)]).await;
        assert_eq!(balance_of(&state, caixa.id).await, dec(240));

        let returned = state
            .sales_service
            .create_return(CreateReturn {
                sale_id: detail.sale.id,
                lines: vec![ReturnLine { sale_item_id: detail.items[0].id, quantity: dec(1) }],
                refund_account_id: None,
                reason: None,
            })
            .await
            .unwrap();

        assert_eq!(returned.header.refund_account_id, Some(caixa.id));
        assert_eq!(balance_of(&state, caixa.id).await, dec(120));
        let movements = state.ledger_service.get_account(caixa.id).await.unwrap().movements;
        assert_eq!(movements.last().map(|m| m.category), Some(MovementCategory::Refund));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn payments_move_customer_and_account_together(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let cliente = customer(&state, "Zeynep Kaya", None).await;
        let banco = account(&state, "Banco", 0).await;
        let item = product(&state, "Café", 10).await;
        credit_sale(&state, cliente.id, vec![line(item.id, 2)]).await;

        let received = state
            .payment_service
            .create_payment(CreatePayment {
                customer_id: cliente.id,
                account_id: banco.id,
                direction: PaymentDirection::Incoming,
                amount: dec(100),
                description: None,
            })
            .await
            .unwrap();
        assert!(received.payment_number.starts_with("PAY-"));
        assert_eq!(customer_balance(&state, cliente.id).await, dec(-140));
        assert_eq!(balance_of(&state, banco.id).await, dec(100));

        state
            .payment_service
            .create_payment(CreatePayment {
                customer_id: cliente.id,
                account_id: banco.id,
                direction: PaymentDirection::Outgoing,
                amount: dec(30),
                description: Some("Troco".into()),
            })
            .await
            .unwrap();
        assert_eq!(customer_balance(&state, cliente.id).await, dec(-170));
        assert_eq!(balance_of(&state, banco.id).await, dec(70));

        // Saída maior que o saldo da conta: nenhum dos lados muda.
        let err = state
            .payment_service
            .create_payment(CreatePayment {
                customer_id: cliente.id,
                account_id: banco.id,
                direction: PaymentDirection::Outgoing,
                amount: dec(500),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(customer_balance(&state, cliente.id).await, dec(-170));
        assert_eq!(balance_of(&state, banco.id).await, dec(70));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn external_invoice_is_imported_once(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let item = product(&state, "Cay 1kg", 10).await;

        let detail = state
            .sales_service
            .import_external_invoice(invoice("ETTN-0001", "cay 1KG", 4))
            .await
            .unwrap();
        assert_eq!(detail.sale.external_document_id.as_deref(), Some("ETTN-0001"));
        assert_eq!(detail.items[0].product_id, item.id);
        // 4 x 50,00 + 10% de IVA
        assert_eq!(detail.sale.grand_total, dec(220));
        assert_eq!(stock_of(&state, item.id).await, dec(6));

        let customer_id = detail.sale.customer_id.unwrap();
        let (created, _) = state.crm_service.get_customer(customer_id).await.unwrap();
        assert_eq!(created.tax_id.as_deref(), Some("1234567890"));
        assert_eq!(created.balance, dec(-220));

        let err = state
            .sales_service
            .import_external_invoice(invoice("ETTN-0001", "Cay 1kg", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(stock_of(&state, item.id).await, dec(6));

        // Mesmo número fiscal: o cliente é reaproveitado.
        let again = state
            .sales_service
            .import_external_invoice(invoice("ETTN-0002", "Cay 1kg", 1))
            .await
            .unwrap();
        assert_eq!(again.sale.customer_id, Some(customer_id));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn import_of_unknown_product_without_stock_writes_nothing(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let err = state
            .sales_service
            .import_external_invoice(invoice("ETTN-0003", "Produto novo", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Nada ficou gravado: o mesmo documento entra depois de haver estoque.
        product(&state, "Produto novo", 5).await;
        let detail = state
            .sales_service
            .import_external_invoice(invoice("ETTN-0003", "Produto novo", 1))
            .await
            .unwrap();
        assert_eq!(detail.sale.status, SaleStatus::Completed);
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn edocument_follows_its_state_machine(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool);

    as_tenant(tenant, async {
        let caixa = account(&state, "Caixa", 0).await;
        let item = product(&state, "Sabão", 10).await;
        let sale = cash_sale(&state, caixa.id, vec![line(item.id, 1)]).await;

        let doc = state.edocument_service.create(sale.sale.id).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Draft);
        assert!(doc.document_number.starts_with("EDOC-"));

        let pending = state
            .edocument_service
            .transition(doc.id, DocumentStatus::Pending, None)
            .await
            .unwrap();
        assert_eq!(pending.status, DocumentStatus::Pending);

        let approved = state
            .edocument_service
            .transition(doc.id, DocumentStatus::Approved, Some("Aceito pelo GİB".into()))
            .await
            .unwrap();
        assert_eq!(approved.status, DocumentStatus::Approved);
        assert_eq!(approved.status_note.as_deref(), Some("Aceito pelo GİB"));

        let err = state
            .edocument_service
            .transition(doc.id, DocumentStatus::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Venda cancelada não gera documento.
        let other = cash_sale(&state, caixa.id, vec![line(item.id, 1)]).await;
        state.sales_service.cancel_sale(other.sale.id).await.unwrap();
        let err = state.edocument_service.create(other.sale.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    })
    .await;
}

#[sqlx::test]
#[ignore = "precisa de DATABASE_URL apontando para um Postgres"]
async fn inactive_references_block_the_sale(pool: PgPool) {
    let tenant = seed_tenant(&pool, "Loja A").await;
    let state = state(pool.clone());

    let (caixa, cliente, deposito, item) = as_tenant(tenant, async {
        (
            account(&state, "Caixa", 0).await,
            customer(&state, "Ayşe Yılmaz", None).await,
            warehouse(&state, "Filial").await,
            product(&state, "Chá 1kg", 10).await,
        )
    })
    .await;

    sqlx::query("UPDATE accounts SET is_active = FALSE WHERE id = $1")
        .bind(caixa.id)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE warehouses SET is_active = FALSE WHERE id = $1")
        .bind(deposito.id)
        .execute(&pool)
        .await
        .unwrap();

    as_tenant(tenant, async {
        // Conta inativa: nem venda à vista nem recebimento.
        let err = state
            .sales_service
            .create_sale(CreateSale {
                customer_id: None,
                warehouse_id: None,
                account_id: Some(caixa.id),
                payment_method: PaymentMethod::Cash,
                lines: vec![line(item.id, 1)],
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

        let err = state
            .payment_service
            .create_payment(CreatePayment {
                customer_id: cliente.id,
                account_id: caixa.id,
                direction: PaymentDirection::Incoming,
                amount: dec(50),
                description: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");
        assert_eq!(customer_balance(&state, cliente.id).await, Decimal::ZERO);

        let err = state
            .sales_service
            .create_sale(CreateSale {
                customer_id: Some(cliente.id),
                warehouse_id: Some(deposito.id),
                account_id: None,
                payment_method: PaymentMethod::Credit,
                lines: vec![line(item.id, 1)],
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

        state
            .crm_service
            .update_customer(
                cliente.id,
                CustomerPatch {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let err = state
            .sales_service
            .create_sale(CreateSale {
                customer_id: Some(cliente.id),
                warehouse_id: None,
                account_id: None,
                payment_method: PaymentMethod::Credit,
                lines: vec![line(item.id, 1)],
                notes: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

        assert_eq!(stock_of(&state, item.id).await, dec(10));
        assert_eq!(balance_of(&state, caixa.id).await, Decimal::ZERO);
    })
    .await;
}
