pub mod cli;
pub mod controller;
pub mod io;
pub mod model;
pub mod parse;
pub mod presenter;
pub mod util;
