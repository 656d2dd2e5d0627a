mod connection;
mod statement;

pub use connection::*;
pub use statement::*;
