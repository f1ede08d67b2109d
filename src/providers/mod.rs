//! Provider implementations of the remote API traits

pub mod aws;

pub use aws::AwsProvider;
