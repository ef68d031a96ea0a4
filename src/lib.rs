pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod stream;

mod util;

pub use stream::{translate, translate_with_options, TranslateOptions};
