pub mod auth;
pub mod crm_service;
pub mod edocument_service;
pub mod inventory_service;
pub mod ledger_service;
pub mod numbering_service;
pub mod payment_service;
pub mod sales_service;
pub mod tenancy_service;
pub mod transfer_service;
