pub mod generation;
pub mod messages;
pub mod query;

pub use generation::*;
pub use messages::*;
pub use query::*;
