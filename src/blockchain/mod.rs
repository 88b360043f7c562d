pub mod traits;

pub use traits::{ChainClient, FeeData, TxReceipt, TxRequest};
