// src/models/sales.rs

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::common::{
    error::AppError,
    validation::{validate_not_negative, validate_positive, validate_rate},
};

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Credit, // "Veresiye": o valor vai para a conta corrente do cliente
}

impl PaymentMethod {
    pub fn is_credit(self) -> bool {
        self == PaymentMethod::Credit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "sale_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    Incoming, // Cobrança do cliente
    Outgoing, // Devolução de dinheiro ao cliente
}

/// Ciclo de vida dos documentos eletrônicos:
/// `draft → pending → approved | rejected`, cancelamento só a partir de draft/pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "document_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl DocumentStatus {
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Draft, Pending)
                | (Pending, Approved)
                | (Pending, Rejected)
                | (Draft, Cancelled)
                | (Pending, Cancelled)
        )
    }

    pub fn ensure_transition(self, next: DocumentStatus) -> Result<(), AppError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::conflict(format!(
                "Transição de estado inválida: {self:?} → {next:?}"
            )))
        }
    }
}

// --- Numeração de documentos ---

/// Tipo de documento numerado: código do prefixo e onde os números ficam gravados.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Invoice,
    Return,
    StockTransfer,
    Payment,
    EDocument,
}

impl DocumentKind {
    pub fn code(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "INV",
            DocumentKind::Return => "RET",
            DocumentKind::StockTransfer => "TRF",
            DocumentKind::Payment => "PAY",
            DocumentKind::EDocument => "EDOC",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "sales",
            DocumentKind::Return => "sale_returns",
            DocumentKind::StockTransfer => "stock_transfers",
            DocumentKind::Payment => "payments",
            DocumentKind::EDocument => "e_documents",
        }
    }

    pub fn number_column(self) -> &'static str {
        match self {
            DocumentKind::Invoice => "invoice_number",
            DocumentKind::Return => "return_number",
            DocumentKind::StockTransfer => "transfer_number",
            DocumentKind::Payment => "payment_number",
            DocumentKind::EDocument => "document_number",
        }
    }
}

// --- Cálculo de linha ---

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Valores calculados de uma linha de venda.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePricing {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
}

impl LinePricing {
    pub fn compute(
        quantity: Decimal,
        unit_price: Decimal,
        discount_rate: Decimal,
        vat_rate: Decimal,
    ) -> Self {
        let subtotal = money(quantity * unit_price);
        let discount = money(subtotal * discount_rate / Decimal::ONE_HUNDRED);
        let net = subtotal - discount;
        let vat = money(net * vat_rate / Decimal::ONE_HUNDRED);
        Self {
            subtotal,
            discount,
            vat,
            total: net + vat,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaleTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub vat: Decimal,
    pub total: Decimal,
}

impl SaleTotals {
    pub fn add(&mut self, line: &LinePricing) {
        self.subtotal += line.subtotal;
        self.discount += line.discount;
        self.vat += line.vat;
        self.total += line.total;
    }
}

/// Valor proporcional a devolver por `quantity` unidades de uma linha vendida.
pub fn refund_for(item: &SaleItem, quantity: Decimal) -> Decimal {
    if quantity == item.quantity {
        return item.line_total;
    }
    money(item.line_total * quantity / item.quantity)
}

// --- Registros persistidos ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "INV-202610-00001")]
    pub invoice_number: String,
    pub customer_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub vat_total: Decimal,
    pub grand_total: Decimal,
    pub external_document_id: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub sale_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_rate: Decimal,
    pub vat_rate: Decimal,
    pub line_subtotal: Decimal,
    pub discount_amount: Decimal,
    pub vat_amount: Decimal,
    pub line_total: Decimal,
    pub returned_quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleReturn {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "RET-202610-00001")]
    pub return_number: String,
    pub sale_id: Uuid,
    pub refund_account_id: Option<Uuid>,
    pub total_amount: Decimal,
    pub reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub return_id: Uuid,
    pub sale_item_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub line_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnDetail {
    #[serde(flatten)]
    pub header: SaleReturn,
    pub items: Vec<ReturnItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockTransfer {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "TRF-202610-00001")]
    pub transfer_number: String,
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockTransferItem {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    pub transfer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StockTransferDetail {
    #[serde(flatten)]
    pub header: StockTransfer,
    pub items: Vec<StockTransferItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "PAY-202610-00001")]
    pub payment_number: String,
    pub customer_id: Uuid,
    pub account_id: Uuid,
    pub direction: PaymentDirection,
    pub amount: Decimal,
    pub description: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EDocument {
    pub id: Uuid,
    #[schema(ignore)]
    pub tenant_id: Uuid,
    #[schema(example = "EDOC-202610-00001")]
    pub document_number: String,
    pub sale_id: Uuid,
    pub status: DocumentStatus,
    pub status_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Comandos (entrada dos orquestradores) ---

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: Uuid,

    #[validate(custom(function = "validate_positive"))]
    #[schema(example = "2")]
    pub quantity: Decimal,

    /// Se ausente, usa o preço de cadastro do produto.
    #[validate(custom(function = "validate_not_negative"))]
    pub unit_price: Option<Decimal>,

    #[serde(default)]
    #[validate(custom(function = "validate_rate"))]
    pub discount_rate: Decimal,

    /// Se ausente, usa a alíquota de cadastro do produto.
    #[validate(custom(function = "validate_rate"))]
    pub vat_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSale {
    pub customer_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    /// Conta (caixa/banco) que recebe o valor nas vendas à vista.
    pub account_id: Option<Uuid>,
    pub payment_method: PaymentMethod,

    #[validate(length(min = 1, message = "A venda precisa de ao menos um item."), nested)]
    pub lines: Vec<SaleLine>,

    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLine {
    pub sale_item_id: Uuid,

    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReturn {
    pub sale_id: Uuid,

    #[validate(length(min = 1, message = "A devolução precisa de ao menos um item."), nested)]
    pub lines: Vec<ReturnLine>,

    pub refund_account_id: Option<Uuid>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransferLine {
    pub product_id: Uuid,

    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateStockTransfer {
    pub from_warehouse_id: Uuid,
    pub to_warehouse_id: Uuid,

    #[validate(length(min = 1, message = "A transferência precisa de ao menos um item."), nested)]
    pub lines: Vec<TransferLine>,

    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub customer_id: Uuid,
    pub account_id: Uuid,
    pub direction: PaymentDirection,

    #[validate(custom(function = "validate_positive"))]
    #[schema(example = "500.00")]
    pub amount: Decimal,

    pub description: Option<String>,
}

// --- Documento externo já normalizado pelo parser ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalParty {
    #[validate(length(min = 1, message = "O nome do cliente é obrigatório."))]
    pub name: String,

    #[validate(length(min = 1, message = "O número fiscal é obrigatório."))]
    pub tax_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLine {
    #[validate(length(min = 1, message = "O nome do produto é obrigatório."))]
    pub name: String,

    #[validate(custom(function = "validate_positive"))]
    pub quantity: Decimal,

    #[validate(custom(function = "validate_not_negative"))]
    pub unit_price: Decimal,

    #[validate(custom(function = "validate_rate"))]
    pub vat_rate: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInvoice {
    /// Identificador do documento na origem (ex.: ETTN da e-Fatura). Chave de idempotência.
    #[validate(length(min = 1, message = "O identificador externo é obrigatório."))]
    pub external_id: String,

    pub issue_date: Option<NaiveDate>,

    #[validate(nested)]
    pub customer: ExternalParty,

    #[validate(length(min = 1, message = "O documento precisa de ao menos um item."), nested)]
    pub lines: Vec<ExternalLine>,

    pub warehouse_id: Option<Uuid>,
    pub account_id: Option<Uuid>,
    pub payment_method: PaymentMethod,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_pricing_applies_discount_before_vat() {
        // 3 x 100,00 com 10% de desconto e 20% de IVA
        let line = LinePricing::compute(
            Decimal::from(3),
            Decimal::from(100),
            Decimal::from(10),
            Decimal::from(20),
        );
        assert_eq!(line.subtotal, Decimal::from(300));
        assert_eq!(line.discount, Decimal::from(30));
        assert_eq!(line.vat, Decimal::from(54));
        assert_eq!(line.total, Decimal::from(324));
    }

    #[test]
    fn line_pricing_rounds_to_cents() {
        // 1 x 9,99 com 18% de IVA: 1,7982 → 1,80
        let line = LinePricing::compute(
            Decimal::ONE,
            Decimal::new(999, 2),
            Decimal::ZERO,
            Decimal::from(18),
        );
        assert_eq!(line.vat, Decimal::new(180, 2));
        assert_eq!(line.total, Decimal::new(1179, 2));
    }

    #[test]
    fn totals_accumulate() {
        let mut totals = SaleTotals::default();
        totals.add(&LinePricing::compute(Decimal::ONE, Decimal::from(10), Decimal::ZERO, Decimal::ZERO));
        totals.add(&LinePricing::compute(Decimal::from(2), Decimal::from(5), Decimal::ZERO, Decimal::from(10)));
        assert_eq!(totals.subtotal, Decimal::from(20));
        assert_eq!(totals.vat, Decimal::ONE);
        assert_eq!(totals.total, Decimal::from(21));
    }

    #[test]
    fn document_transitions() {
        use DocumentStatus::*;
        assert!(Draft.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Draft.can_transition_to(Cancelled));
        assert!(Pending.can_transition_to(Cancelled));

        assert!(!Approved.can_transition_to(Cancelled));
        assert!(!Rejected.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(!Draft.can_transition_to(Approved));
        assert!(matches!(
            Approved.ensure_transition(Cancelled),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn sale_command_shape_is_validated() {
        let cmd = CreateSale {
            customer_id: None,
            warehouse_id: None,
            account_id: None,
            payment_method: PaymentMethod::Cash,
            lines: vec![SaleLine {
                product_id: Uuid::new_v4(),
                quantity: Decimal::ZERO,
                unit_price: None,
                discount_rate: Decimal::ZERO,
                vat_rate: None,
            }],
            notes: None,
        };
        assert!(cmd.validate().is_err());

        let empty = CreateSale { lines: vec![], ..cmd };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn commands_without_lines_are_rejected() {
        let ret = CreateReturn {
            sale_id: Uuid::new_v4(),
            lines: vec![],
            refund_account_id: None,
            reason: None,
        };
        let errors = ret.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("lines"));

        let transfer = CreateStockTransfer {
            from_warehouse_id: Uuid::new_v4(),
            to_warehouse_id: Uuid::new_v4(),
            lines: vec![TransferLine {
                product_id: Uuid::new_v4(),
                quantity: Decimal::from(3),
            }],
            notes: None,
        };
        assert!(transfer.validate().is_ok());
        let empty = CreateStockTransfer { lines: vec![], ..transfer };
        assert!(empty.validate().is_err());

        let invoice = ExternalInvoice {
            external_id: "ETTN-1".into(),
            issue_date: None,
            customer: ExternalParty {
                name: "Mercado".into(),
                tax_id: "1234567890".into(),
            },
            lines: vec![ExternalLine {
                name: "Chá 1kg".into(),
                quantity: Decimal::ONE,
                unit_price: Decimal::from(50),
                vat_rate: Decimal::from(10),
            }],
            warehouse_id: None,
            account_id: None,
            payment_method: PaymentMethod::Credit,
        };
        assert!(invoice.validate().is_ok());
        let empty = ExternalInvoice { lines: vec![], ..invoice };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn sale_command_from_json() {
        let json = serde_json::json!({
            "paymentMethod": "credit",
            "customerId": Uuid::new_v4(),
            "lines": [{ "productId": Uuid::new_v4(), "quantity": 2 }]
        });
        let cmd: CreateSale = serde_json::from_value(json).unwrap();
        assert!(cmd.payment_method.is_credit());
        assert_eq!(cmd.lines[0].discount_rate, Decimal::ZERO);
        assert!(cmd.validate().is_ok());
    }
}
