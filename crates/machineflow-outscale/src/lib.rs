//! Outscale provider for MachineFlow
//!
//! Implements [`machineflow_cloud::CloudApi`] on top of the OSC API.
//!
//! # Example
//!
//! ```ignore
//! use machineflow_cloud::{CloudApi, Credentials};
//! use machineflow_outscale::OutscaleClient;
//!
//! let client = OutscaleClient::new(&Credentials {
//!     access_key: "AK".into(),
//!     secret_key: "SK".into(),
//!     region: "eu-west-2".into(),
//! })?;
//!
//! let account = client.read_account().await?;
//! ```

pub mod client;
pub mod signer;
pub mod wire;

pub use client::{OutscaleClient, default_endpoint};
pub use signer::{SignedRequest, Signer};
