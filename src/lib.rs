pub mod accessspec;
pub mod capabilities;
pub mod errors;
pub mod llrp;
pub mod message;
pub mod reports;
pub mod rospec;
pub mod session;
pub mod transport;
