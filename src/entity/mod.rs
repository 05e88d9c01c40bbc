pub mod po;
pub mod bo;
