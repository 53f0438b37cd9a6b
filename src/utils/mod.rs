pub mod constants;
pub mod pagination;
