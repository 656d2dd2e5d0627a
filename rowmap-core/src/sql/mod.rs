mod inline;
mod nodes;
mod source;

pub use inline::*;
pub use nodes::*;
pub use source::*;
