mod access;
mod as_value;
mod bean;
mod cache;
mod connection;
mod exchange;
mod executor;
mod introspect;
mod mapper;
mod mapping;
mod object;
mod session;
mod sql;
mod statement;
mod type_handler;
mod util;
mod value;

pub use ::anyhow::Context;
pub use access::*;
pub use as_value::*;
pub use bean::*;
pub use cache::*;
pub use connection::*;
pub use exchange::*;
pub use executor::*;
pub use introspect::*;
pub use mapper::*;
pub use mapping::*;
pub use object::*;
pub use session::*;
pub use sql::*;
pub use statement::*;
pub use type_handler::*;
pub use util::*;
pub use value::*;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
