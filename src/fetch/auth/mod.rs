//! Request-signing wrappers around an [`HttpClient`](super::HttpClient).

mod oauth1;

pub use oauth1::{OAuth1, OAuth1Credentials};
