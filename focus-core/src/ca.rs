use crate::error::FocusError;
use crate::Result;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use std::fs;
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};
use tracing::info;

const CA_COMMON_NAME: &str = "Focuswall CA";
const CA_ORGANIZATION: &str = "Focuswall Local Interception";

/// Root certificate authority used by the proxy to intercept HTTPS.
///
/// The CA is persisted so the user only has to trust `ca.crt` once; leaf
/// certificates are issued on the fly by hudsucker.
pub struct CertificateAuthority {
    ca_cert: Certificate,
    cert_path: PathBuf,
}

impl CertificateAuthority {
    /// Load the CA found in `ca_dir`, or generate and save a new one.
    pub fn new(ca_dir: &Path) -> Result<Self> {
        let pem_path = ca_dir.join("ca.pem");
        let key_path = ca_dir.join("ca.key");

        if pem_path.exists() && key_path.exists() {
            let key_pem = fs::read_to_string(&key_path)?;
            let mut ca = Self::from_key_pem(&key_pem)?;
            ca.cert_path = pem_path.with_extension("crt");
            Ok(ca)
        } else {
            fs::create_dir_all(ca_dir)?;
            Self::generate_into(&pem_path, &key_path)
        }
    }

    fn params() -> CertificateParams {
        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, CA_COMMON_NAME);
        dn.push(DnType::OrganizationName, CA_ORGANIZATION);
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
        params.key_usages = vec![
            rcgen::KeyUsagePurpose::KeyCertSign,
            rcgen::KeyUsagePurpose::CrlSign,
        ];
        params
    }

    /// Rebuild the CA around an existing private key.
    ///
    /// rcgen cannot sign with a parsed certificate, so the CA certificate is recreated
    /// with the same subject and key; leaves still chain to the trusted `ca.crt`.
    pub fn from_key_pem(key_pem: &str) -> Result<Self> {
        let key_pair = KeyPair::from_pem(key_pem)
            .map_err(|e| FocusError::Certificate(format!("Failed to parse CA key: {}", e)))?;

        let mut params = Self::params();
        params.key_pair = Some(key_pair);

        let cert = Certificate::from_params(params)
            .map_err(|e| FocusError::Certificate(format!("Failed to recreate CA cert: {}", e)))?;

        Ok(Self {
            ca_cert: cert,
            cert_path: PathBuf::new(),
        })
    }

    fn generate_into(cert_path: &Path, key_path: &Path) -> Result<Self> {
        let mut params = Self::params();

        // root stays valid for ten years
        let not_before = OffsetDateTime::now_utc();
        params.not_before = not_before;
        params.not_after = not_before + Duration::days(365 * 10);

        let key_pair = KeyPair::generate(&PKCS_ECDSA_P256_SHA256)
            .map_err(|e| FocusError::Certificate(format!("Failed to generate CA key: {}", e)))?;
        params.key_pair = Some(key_pair);

        let cert = Certificate::from_params(params)
            .map_err(|e| FocusError::Certificate(format!("Failed to generate CA cert: {}", e)))?;

        let cert_pem = cert
            .serialize_pem()
            .map_err(|e| FocusError::Certificate(format!("Failed to serialize CA cert: {}", e)))?;
        let key_pem = cert.serialize_private_key_pem();

        fs::write(cert_path, &cert_pem)?;
        fs::write(key_path, &key_pem)?;

        // .crt copy for importing into browser / OS trust stores
        let crt_path = cert_path.with_extension("crt");
        fs::write(&crt_path, &cert_pem)?;
        info!("Generated new CA certificate at {}", crt_path.display());

        Ok(Self {
            ca_cert: cert,
            cert_path: crt_path,
        })
    }

    /// File the user should import as a trusted root
    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    /// PEM of the root certificate, for display or export
    pub fn cert_pem(&self) -> Result<String> {
        self.ca_cert
            .serialize_pem()
            .map_err(|e| FocusError::Certificate(format!("Failed to serialize CA cert: {}", e)))
    }

    pub fn cert_der(&self) -> Result<Vec<u8>> {
        self.ca_cert.serialize_der().map_err(|e| {
            FocusError::Certificate(format!("Failed to serialize CA cert DER: {}", e))
        })
    }

    /// PKCS#8 DER of the CA key, as `RcgenAuthority` expects
    pub fn key_der(&self) -> Vec<u8> {
        self.ca_cert.serialize_private_key_der()
    }
}
