pub mod debug;
pub mod forward;
pub mod health;
pub mod upload;

pub use debug::debug_secrets_handler;
pub use forward::forward_handler;
pub use health::health_handler;
pub use upload::upload_handler;
