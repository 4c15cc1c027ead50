pub mod decompiler;
pub mod errors;
pub mod models;

pub use decompiler::{DecompileSummary, Decompiler};
pub use errors::DecompilerError;
pub use models::TableSummary;
