pub mod annotate;
pub mod convert;
pub mod fallback;
pub mod health;
pub mod history;
pub mod status;
