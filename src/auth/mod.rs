// Authentication module
// Credentials, mode resolution, the OAuth exchange and login orchestration

mod credentials;
mod exchange;
mod login;
mod mode;
mod provider;
mod types;

pub use credentials::CredentialStore;
pub use exchange::HttpOAuthProvider;
pub use login::LoginOrchestrator;
pub use mode::ModeResolver;
pub use provider::{LoginContext, OAuthProvider, UrlDelivery};
pub use types::{AuthStatus, Credentials, Mode, TokenData, TokenKind, TokenState};
