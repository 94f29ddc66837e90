//! CLI commands implementation

pub mod cluster;
pub mod crawl;
pub mod init;
pub mod orphans;
pub mod rank;
pub mod status;

pub use cluster::*;
pub use crawl::*;
pub use init::*;
pub use orphans::*;
pub use rank::*;
pub use status::*;
