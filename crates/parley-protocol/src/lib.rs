pub mod api;
pub mod message;
pub mod report;

pub use message::ChatMessage;
pub use report::DeliveryReport;
