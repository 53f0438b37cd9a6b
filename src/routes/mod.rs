pub mod board_route;
pub mod jobs_route;
