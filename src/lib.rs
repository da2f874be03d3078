pub mod aggregate;
pub mod cli;
pub mod demo_source;
pub mod env_cfg;
pub mod error;
pub mod http_cache;
pub mod http_client;
pub mod insight;
pub mod model;
pub mod nba;
pub mod nflverse;
pub mod report;
pub mod season_cache;
pub mod source;
pub mod table;
