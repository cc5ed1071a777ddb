// Authentication module
// Token storage, header derivation and auth service operations

mod client;
mod headers;
mod tokens;
mod types;

pub use client::{AuthClient, AUTH_SERVICE};
pub use headers::{bearer, namespace_auth_headers, service_auth_headers, INTERNAL_AUTHORIZATION};
pub use tokens::{default_tokens_file, dot_hail_dir, ensure_private_dir, TokenStore, Tokens};
pub use types::{
    CopyPasteLoginOptions, CopyPasteLoginResponse, CreateSessionRequest, CreateUserRequest,
    DeleteSessionRequest, DeleteUserRequest, LoginOutcome, UserinfoOptions,
};
