pub mod util;
pub mod value;

pub use util::{deep_clone, deep_equals, get_path, parse, shallow_clone, shallow_equals, stringify};
pub use value::Value;
