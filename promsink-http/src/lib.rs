pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{HttpState, build_router, serve, start};
