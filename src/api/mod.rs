pub mod odds_api;
pub mod scores_api;
