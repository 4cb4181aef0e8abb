pub mod actions;
pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;
pub mod settings;

pub use actions::*;
pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
pub use settings::*;
