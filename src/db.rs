pub mod scoped_repo;
pub use scoped_repo::ScopedRepository;
pub mod tenancy_repo;
pub use tenancy_repo::TenantRepository;
pub mod finance_repo;
pub use finance_repo::FinanceRepository;
pub mod crm_repo;
pub use crm_repo::CrmRepository;
pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod sales_repo;
pub use sales_repo::SalesRepository;
pub mod numbering_repo;
pub use numbering_repo::NumberingRepository;
