pub mod credentials;

pub use credentials::{AdminCredentialRecord, InitialCredentials};
