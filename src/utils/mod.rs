pub mod jwt;
pub mod phone;
pub mod pricing;
pub mod profanity;
pub mod rate_window;
