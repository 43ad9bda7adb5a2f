pub mod alert;
pub mod device_token;
pub mod feed;
pub mod location;
pub mod notification_log;
