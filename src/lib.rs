pub mod cluster;
#[cfg(feature = "worker")]
mod hex;
