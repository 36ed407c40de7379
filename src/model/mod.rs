pub mod color;
pub mod config;
pub mod info;
pub mod item;
pub mod list;

pub use color::*;
pub use config::*;
pub use info::*;
pub use item::*;
pub use list::*;
