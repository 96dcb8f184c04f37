pub mod documents;

pub use documents::{DocumentClient, UpdateResult};
