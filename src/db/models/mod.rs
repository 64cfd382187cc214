pub mod prediction;
pub mod session;
pub mod user;

pub use prediction::{PredictionFilter, PredictionRecord, PredictionWithOwner};
pub use session::Session;
pub use user::{Role, User};
