//! Credits API clients.

mod http;

pub use http::HttpCreditsApi;
