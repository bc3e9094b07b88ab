pub mod auth;
pub mod chat;
pub mod family;
pub mod matching;
pub mod payments;
pub mod safety;
pub mod schedule;
