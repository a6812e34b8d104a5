pub mod http;
#[cfg(test)]
pub mod scripted;

pub use http::HttpTransport;
