pub mod assembler;
pub mod store;

pub use assembler::{assemble_price_matrix, PriceMatrix};
pub use store::{InMemoryPriceStore, PricePoint, PriceRow, PriceSource, UpsertSummary};
