pub mod order_service;
pub mod reservation;
