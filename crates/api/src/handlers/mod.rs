//! HTTP handler implementations, one module per resource.

pub mod notification;
