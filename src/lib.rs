pub mod editor;
pub mod stream;
pub mod utils;
