pub mod libtrivia;
pub mod server;
