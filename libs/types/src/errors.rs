//! Error taxonomy for intent admission and the wire protocol
//!
//! Every intent the engine rejects maps to exactly one uppercase wire token,
//! rendered by the session layer as `ERR <token>`. Rejections never mutate
//! book state.

use thiserror::Error;

/// Malformed or semantically invalid client input.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientInputError {
    #[error("malformed command")]
    BadCommand,

    #[error("side must be BUY or SELL")]
    BadSide,

    #[error("unknown or invalid symbol")]
    BadSymbol,

    #[error("quantity must be a positive integer")]
    BadQty,

    #[error("price must be a positive integer tick count")]
    BadPrice,
}

/// Authentication and ownership failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("session is not authenticated")]
    Unauthorized,

    #[error("bad passkey")]
    BadPasskey,

    #[error("order is owned by another session")]
    NotOwner,
}

/// A rejected intent.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    #[error(transparent)]
    Input(#[from] ClientInputError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("order or instrument not found")]
    NotFound,

    #[error("order would match against the same session")]
    SelfMatch,
}

impl Reject {
    /// Uppercase token for the `ERR <token>` reply line.
    pub fn wire_token(&self) -> &'static str {
        match self {
            Reject::Input(ClientInputError::BadCommand) => "BAD_COMMAND",
            Reject::Input(ClientInputError::BadSide) => "BAD_SIDE",
            Reject::Input(ClientInputError::BadSymbol) => "BAD_SYMBOL",
            Reject::Input(ClientInputError::BadQty) => "BAD_QTY",
            Reject::Input(ClientInputError::BadPrice) => "BAD_PRICE",
            Reject::Auth(AuthError::Unauthorized) => "UNAUTHORIZED",
            Reject::Auth(AuthError::BadPasskey) => "BAD_PASSKEY",
            Reject::Auth(AuthError::NotOwner) => "NOT_OWNER",
            Reject::NotFound => "NOT_FOUND",
            Reject::SelfMatch => "SELF_MATCH",
        }
    }
}
