pub mod portfolio;

pub use portfolio::{
    NewTransaction, PortfolioApi, Transaction, TransactionType, ValueSnapshot, DEFAULT_CURRENCY,
};
