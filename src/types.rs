pub mod attr;
pub mod date;
pub mod like;
pub mod value;

pub use attr::AttrType;
pub use value::{CastError, Value};
