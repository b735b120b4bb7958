pub mod http_client;

pub use http_client::{join_url, ApiRequest, ApiResponse, HttpClient, ReqwestHttpClient};
