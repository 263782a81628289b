mod config;
mod fetch;
mod index;
mod reset;
mod search;
mod status;
mod watch;

pub use config::ConfigCommand;
pub use fetch::FetchArgs;
pub use index::IndexArgs;
pub use reset::ResetArgs;
pub use search::SearchArgs;
pub use watch::WatchArgs;

pub use config::handle_config;
pub use fetch::handle_fetch;
pub use index::handle_index;
pub use reset::handle_reset;
pub use search::handle_search;
pub use status::handle_status;
pub use watch::handle_watch;
