pub mod franchise_service;
pub use franchise_service::{FranchiseError, FranchiseService, Generated};

pub mod franchise_service_impl;
pub use franchise_service_impl::CatalogFranchiseService;
