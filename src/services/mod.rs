//! Services exposed over HTTP.

pub mod articles;
pub mod hello;

pub use articles::ArticlesService;
pub use hello::HelloService;
