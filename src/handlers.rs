pub mod crm;
pub mod documents;
pub mod finance;
pub mod inventory;
pub mod sales;
pub mod tenancy;
