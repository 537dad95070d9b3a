//! AWS Signature Version 4 for Outscale API requests
//!
//! Every OSC API call is a JSON `POST` signed over the `content-type`,
//! `host` and `x-amz-date` headers.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use machineflow_cloud::Credentials;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "content-type;host;x-amz-date";
pub const CONTENT_TYPE: &str = "application/json";
pub const SERVICE: &str = "oapi";

/// Headers to attach to a signed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub amz_date: String,
    pub authorization: String,
}

pub struct Signer {
    access_key: String,
    secret_key: String,
    region: String,
    service: String,
}

impl Signer {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            access_key: credentials.access_key.clone(),
            secret_key: credentials.secret_key.clone(),
            region: credentials.region.clone(),
            service: SERVICE.to_string(),
        }
    }

    /// Sign a JSON `POST` to `host` + `path`
    pub fn sign_post(
        &self,
        host: &str,
        path: &str,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> SignedRequest {
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let canonical_request = format!(
            "POST\n{path}\n\ncontent-type:{CONTENT_TYPE}\nhost:{host}\nx-amz-date:{amz_date}\n\n{SIGNED_HEADERS}\n{}",
            hex::encode(Sha256::digest(body))
        );

        let scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date_stamp);
        let signature = hex::encode(hmac(&signing_key, string_to_sign.as_bytes()));

        SignedRequest {
            authorization: format!(
                "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
                self.access_key
            ),
            amz_date,
        }
    }

    fn signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let k_date = hmac(
            format!("AWS4{}", self.secret_key).as_bytes(),
            date_stamp.as_bytes(),
        );
        let k_region = hmac(&k_date, self.region.as_bytes());
        let k_service = hmac(&k_region, self.service.as_bytes());
        hmac(&k_service, b"aws4_request")
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
