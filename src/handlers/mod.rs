pub mod health_handlers;
pub mod invoke_handlers;
pub mod item_handlers;
