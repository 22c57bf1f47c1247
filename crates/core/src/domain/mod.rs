pub mod actor;
pub mod approval;
pub mod order;
