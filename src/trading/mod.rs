//! Order placement shared by the engine and one-shot commands

pub mod direct;
pub mod orders;

pub use direct::DirectTrader;
pub use orders::OrderRequest;
