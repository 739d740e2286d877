pub mod record;
pub mod timestamp;
pub mod value;

pub use record::*;
pub use timestamp::*;
pub use value::*;
