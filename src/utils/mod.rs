pub mod data;
pub mod leaderboard;
pub mod spread_grader;
pub mod submission;
