//! Root identity and leaf issuance for the Crab PKI signing service.

mod adapter;
mod ca;
mod csr;
mod error;
mod host;
mod metadata;
mod profile;

pub use adapter::{der_to_pem, verify_client_cert};
pub use ca::CertificateAuthority;
pub use csr::{IssuedCertificate, RequestInfo, verify_request};
pub use error::{CertError, Result};
pub use host::{fully_qualified_name, host_dns_names, host_name};
pub use metadata::CertMetadata;
pub use profile::{
    CaProfile, KeyType, LEAF_SERIAL, LEAF_VALIDITY_YEARS, LeafProfile, ORGANIZATION, ROOT_SERIAL,
    ROOT_VALIDITY_YEARS, years_after,
};
