pub mod context;
pub mod turn;
