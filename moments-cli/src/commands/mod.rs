pub mod enhance;
pub mod fingerprint;
pub mod scan;
pub mod targets;
