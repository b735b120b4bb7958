pub mod service;
pub mod session;
pub mod storage;
pub mod token;

pub use service::AuthService;
pub use session::SessionState;
pub use storage::{FileTokenStore, MemoryTokenStore, TokenKey, TokenStore};
pub use token::{Credentials, RegisteredUser, TokenPair};
