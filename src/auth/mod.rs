//! Authentication: password hashing, session tokens, request guard

pub mod jwt;
pub mod middleware;
pub mod password;
