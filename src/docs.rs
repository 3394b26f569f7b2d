// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Platform ---
        handlers::tenancy::health,
        handlers::tenancy::list_tenants,

        // --- Sales ---
        handlers::sales::create_sale,
        handlers::sales::get_sale,
        handlers::sales::cancel_sale,
        handlers::sales::import_external_invoice,
        handlers::sales::create_return,
        handlers::sales::create_payment,

        // --- Inventory ---
        handlers::inventory::create_product,
        handlers::inventory::get_product,
        handlers::inventory::adjust_stock,
        handlers::inventory::create_warehouse,
        handlers::inventory::create_stock_transfer,

        // --- Finance ---
        handlers::finance::create_account,
        handlers::finance::get_account,
        handlers::finance::add_movement,
        handlers::finance::transfer,

        // --- CRM ---
        handlers::crm::create_customer,
        handlers::crm::get_customer,
        handlers::crm::update_customer,
        handlers::crm::delete_customer,

        // --- E-Documents ---
        handlers::documents::create_edocument,
        handlers::documents::transition_edocument,
    ),
    components(
        schemas(
            // --- Tenancy ---
            models::tenancy::TenantStatus,
            models::tenancy::Tenant,

            // --- Sales ---
            models::sales::PaymentMethod,
            models::sales::SaleStatus,
            models::sales::PaymentDirection,
            models::sales::DocumentStatus,
            models::sales::Sale,
            models::sales::SaleItem,
            models::sales::SaleDetail,
            models::sales::SaleReturn,
            models::sales::ReturnItem,
            models::sales::ReturnDetail,
            models::sales::StockTransfer,
            models::sales::StockTransferItem,
            models::sales::StockTransferDetail,
            models::sales::Payment,
            models::sales::EDocument,
            models::sales::SaleLine,
            models::sales::CreateSale,
            models::sales::ReturnLine,
            models::sales::CreateReturn,
            models::sales::TransferLine,
            models::sales::CreateStockTransfer,
            models::sales::CreatePayment,
            models::sales::ExternalParty,
            models::sales::ExternalLine,
            models::sales::ExternalInvoice,

            // --- Inventory ---
            models::inventory::Product,
            models::inventory::Warehouse,
            models::inventory::WarehouseStock,
            models::inventory::StockMovementType,
            models::inventory::StockMovement,
            models::inventory::AdjustMode,
            models::inventory::StockChange,
            models::inventory::ProductStock,
            handlers::inventory::CreateProductPayload,
            handlers::inventory::StockAdjustmentPayload,
            handlers::inventory::CreateWarehousePayload,

            // --- Finance ---
            models::finance::AccountType,
            models::finance::MovementCategory,
            models::finance::ManualMovementKind,
            models::finance::Account,
            models::finance::AccountMovement,
            models::finance::AccountTransfer,
            models::finance::TransferReceipt,
            models::finance::AccountStatement,
            handlers::finance::CreateAccountPayload,
            handlers::finance::AddMovementPayload,
            handlers::finance::AccountTransferPayload,

            // --- CRM ---
            models::crm::CustomerTransactionKind,
            models::crm::Customer,
            models::crm::AccountTransaction,
            models::crm::CustomerStatement,
            handlers::crm::CreateCustomerPayload,
            handlers::crm::UpdateCustomerPayload,

            // --- E-Documents ---
            handlers::documents::CreateEDocumentPayload,
            handlers::documents::TransitionPayload,
        )
    ),
    tags(
        (name = "Platform", description = "Saúde do serviço e administração da plataforma"),
        (name = "Sales", description = "Vendas, cancelamentos, devoluções e importação de documentos"),
        (name = "Inventory", description = "Produtos, depósitos e movimentação de estoque"),
        (name = "Finance", description = "Contas, extratos, transferências e pagamentos"),
        (name = "CRM", description = "Clientes e conta corrente"),
        (name = "E-Documents", description = "Documentos eletrônicos e seu ciclo de vida")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
