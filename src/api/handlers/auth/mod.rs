pub(crate) mod identity;
pub(crate) mod oauth2;
pub(crate) mod password;
pub(crate) mod pending;
pub(crate) mod providers;
pub(crate) mod session;
pub(crate) mod signin;
pub(crate) mod state;
pub(crate) mod storage;
pub(crate) mod types;
pub(crate) mod utils;

pub use state::AuthState;
