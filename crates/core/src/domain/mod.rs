pub mod analysis;
pub mod etf;
pub mod notification;
pub mod user;
