//! Connectivity probing

pub mod probe;

pub use probe::ConnectivityProbe;
