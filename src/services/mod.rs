pub mod board_service;
pub mod producer_service;
