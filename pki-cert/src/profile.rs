use rcgen::string::Ia5String;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyUsagePurpose, SanType, SerialNumber,
};
use time::{Duration, OffsetDateTime};

/// Organization written into every root subject.
pub const ORGANIZATION: &str = "Crab Inc.";

/// Serial number of every root certificate. Not a registry: each bootstrap uses it.
pub const ROOT_SERIAL: u64 = 1653;

/// Serial number stamped on every issued leaf. Intentionally constant, no
/// issuance history is kept.
pub const LEAF_SERIAL: u64 = 2;

pub const ROOT_VALIDITY_YEARS: i32 = 20;
pub const LEAF_VALIDITY_YEARS: i32 = 10;

/// Root key algorithm. Chosen once at bootstrap and baked into the key file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeyType {
    #[default]
    P256,
    Rsa2048,
}

impl KeyType {
    pub(crate) fn signature_algorithm(self) -> &'static rcgen::SignatureAlgorithm {
        match self {
            KeyType::P256 => &rcgen::PKCS_ECDSA_P256_SHA256,
            KeyType::Rsa2048 => &rcgen::PKCS_RSA_SHA256,
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyType::P256 => f.write_str("ecdsa-p256"),
            KeyType::Rsa2048 => f.write_str("rsa-2048"),
        }
    }
}

impl std::str::FromStr for KeyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ec" | "ecdsa" | "p256" | "ecdsa-p256" => Ok(KeyType::P256),
            "rsa" | "rsa2048" | "rsa-2048" => Ok(KeyType::Rsa2048),
            other => Err(format!("unknown key type '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CaProfile {
    pub common_name: String,
    pub organization: String,
    /// DNS names of the host running the CA
    pub dns_names: Vec<String>,
    pub validity_years: i32,
    pub key_type: KeyType,
    pub key_encipherment: bool,
}

impl CaProfile {
    /// Root profile for a service identity.
    ///
    /// The common name is the service name, or the host's fully-qualified
    /// name when the service name is empty. The short host name and the FQDN
    /// are added as DNS SANs.
    pub fn root(service_name: &str) -> Self {
        let common_name = if service_name.is_empty() {
            crate::host::fully_qualified_name().unwrap_or_else(|| "localhost".to_string())
        } else {
            service_name.to_string()
        };
        Self {
            common_name,
            organization: ORGANIZATION.to_string(),
            dns_names: crate::host::host_dns_names(),
            validity_years: ROOT_VALIDITY_YEARS,
            key_type: KeyType::default(),
            key_encipherment: true,
        }
    }

    pub fn with_key_type(mut self, key_type: KeyType) -> Self {
        self.key_type = key_type;
        self
    }
}

impl Default for CaProfile {
    fn default() -> Self {
        Self {
            common_name: "Crab Root CA".to_string(),
            organization: ORGANIZATION.to_string(),
            dns_names: vec![],
            validity_years: ROOT_VALIDITY_YEARS,
            key_type: KeyType::default(),
            key_encipherment: true,
        }
    }
}

/// Issued leaf policy. Subject and public key always come from the CSR.
#[derive(Clone, Debug)]
pub struct LeafProfile {
    pub validity_years: i32,
    pub serial: u64,
}

impl Default for LeafProfile {
    fn default() -> Self {
        Self {
            validity_years: LEAF_VALIDITY_YEARS,
            serial: LEAF_SERIAL,
        }
    }
}

pub(crate) fn create_ca_params(profile: &CaProfile) -> CertificateParams {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::OrganizationName, &profile.organization);
    dn.push(DnType::CommonName, &profile.common_name);
    params.distinguished_name = dn;

    params.subject_alt_names = profile
        .dns_names
        .iter()
        .filter_map(|name| Ia5String::try_from(name.clone()).ok())
        .map(SanType::DnsName)
        .collect();

    params.serial_number = Some(SerialNumber::from(ROOT_SERIAL));
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);

    let mut key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyCertSign,
    ];
    if profile.key_encipherment {
        key_usages.push(KeyUsagePurpose::KeyEncipherment);
    }
    params.key_usages = key_usages;
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ClientAuth,
        ExtendedKeyUsagePurpose::ServerAuth,
    ];

    let now = now_seconds();
    params.not_before = now;
    params.not_after = years_after(now, profile.validity_years);

    params
}

/// Overwrite everything in CSR-derived params except the subject.
pub(crate) fn apply_leaf_profile(params: &mut CertificateParams, profile: &LeafProfile) {
    params.serial_number = Some(SerialNumber::from(profile.serial));
    params.is_ca = IsCa::NoCa;
    params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
    params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    params.subject_alt_names.clear();
    params.custom_extensions.clear();
    params.use_authority_key_identifier_extension = true;

    let now = now_seconds();
    params.not_before = now;
    params.not_after = years_after(now, profile.validity_years);
}

/// Current UTC time truncated to whole seconds, the resolution X.509 validity stores.
pub(crate) fn now_seconds() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

/// Calendar addition of whole years. Feb 29 rolls over to Mar 1 when the
/// target year is not a leap year.
pub fn years_after(start: OffsetDateTime, years: i32) -> OffsetDateTime {
    let target = start.year() + years;
    match start.replace_year(target) {
        Ok(shifted) => shifted,
        Err(_) => (start - Duration::days(1))
            .replace_year(target)
            .map(|d| d + Duration::days(1))
            .unwrap_or(start + Duration::days(365 * years as i64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn years_after_keeps_calendar_date() {
        let start = datetime!(2024-06-15 10:30:00 UTC);
        assert_eq!(years_after(start, 10), datetime!(2034-06-15 10:30:00 UTC));
    }

    #[test]
    fn years_after_rolls_leap_day_forward() {
        let start = datetime!(2024-02-29 00:00:00 UTC);
        assert_eq!(years_after(start, 10), datetime!(2034-03-01 00:00:00 UTC));
        assert_eq!(years_after(start, 20), datetime!(2044-02-29 00:00:00 UTC));
    }

    #[test]
    fn key_type_parses_aliases() {
        assert_eq!("ec".parse::<KeyType>().unwrap(), KeyType::P256);
        assert_eq!("RSA".parse::<KeyType>().unwrap(), KeyType::Rsa2048);
        assert!("dsa".parse::<KeyType>().is_err());
    }

    #[test]
    fn root_profile_falls_back_to_host_name() {
        let named = CaProfile::root("my-pki");
        assert_eq!(named.common_name, "my-pki");
        assert_eq!(named.validity_years, ROOT_VALIDITY_YEARS);

        let unnamed = CaProfile::root("");
        assert!(!unnamed.common_name.is_empty());
        if let Some(fqdn) = crate::host::fully_qualified_name() {
            assert_eq!(unnamed.common_name, fqdn);
        }
        assert_eq!(unnamed.dns_names, crate::host::host_dns_names());
    }
}
