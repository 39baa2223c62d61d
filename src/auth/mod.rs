//! Authentication primitives: token codec, password hashing and the
//! request extractor for the calling user.

pub mod extractor;
pub mod password;
pub mod tokens;

pub use extractor::AuthUser;
pub use tokens::{Claims, JwtCodec, TokenCodec, TokenKind};
