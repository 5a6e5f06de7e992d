pub mod cmd;
pub mod methods;
pub mod output;
pub mod rpc;
pub mod state_dir;
