pub mod domains;
pub mod tenants;
