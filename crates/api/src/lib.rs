pub mod conversions;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod openapi;
pub mod routes;
