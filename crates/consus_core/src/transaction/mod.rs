//! Transaction management.

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::TransactionRecord;
