pub mod predictions;
pub mod sessions;
pub mod users;
