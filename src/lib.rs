pub mod auction;
pub mod client;
pub mod email;
pub mod error;
pub mod leaderboard;
pub mod list_query;
pub mod session;
