pub mod artisan;
pub mod assignment;
pub mod booking;
pub mod dispatch_log;
pub mod lead;
pub mod message;
pub mod notification;
pub mod review;
