pub mod credential_validator;
pub mod token_manager;

pub use credential_validator::CredentialFormatChecker;
pub use token_manager::SecureTokenManager;
