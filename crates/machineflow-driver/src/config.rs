//! Driver configuration
//!
//! [`DriverOptions`] holds the raw values as they come from flags or the
//! environment; [`DriverConfig::from_options`] validates them before any
//! remote call is made.

use crate::error::{DriverError, Result};
use crate::resources::security_group::IngressRule;
use crate::resources::tag::parse_tags;
use machineflow_cloud::{Credentials, RootDiskSpec, Tag};
use std::str::FromStr;

pub const DEFAULT_REGION: &str = "eu-west-2";
pub const DEFAULT_INSTANCE_TYPE: &str = "tinav2.c1r2p3";
pub const DEFAULT_SOURCE_IMAGE: &str = "ami-504e6b16";
pub const DEFAULT_ROOT_DISK_SIZE: i64 = 15;
pub const DEFAULT_ROOT_DISK_IOPS: i64 = 1500;
pub const MAX_ROOT_DISK_IOPS: i64 = 13000;
pub const ROOT_DEVICE_NAME: &str = "/dev/sda1";

pub const DOCKER_PORT: u16 = 2376;
pub const SSH_PORT: u16 = 22;
pub const SSH_USERNAME: &str = "outscale";

/// Environment variables consulted when a credential is not given explicitly
pub const ACCESS_KEY_ENV: &str = "OSC_ACCESS_KEY";
pub const SECRET_KEY_ENV: &str = "OSC_SECRET_KEY";
pub const REGION_ENV: &str = "OSC_REGION";

/// Root disk volume type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiskType {
    Standard,
    Io1,
    #[default]
    Gp2,
}

impl DiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskType::Standard => "standard",
            DiskType::Io1 => "io1",
            DiskType::Gp2 => "gp2",
        }
    }
}

impl FromStr for DiskType {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "standard" => Ok(DiskType::Standard),
            "io1" => Ok(DiskType::Io1),
            "gp2" => Ok(DiskType::Gp2),
            other => Err(DriverError::InvalidConfig(format!(
                "root disk type '{}' is not one of standard, io1, gp2",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DiskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw driver options
#[derive(Debug, Clone, Default)]
pub struct DriverOptions {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub instance_type: Option<String>,
    pub source_image: Option<String>,
    pub root_disk_type: Option<String>,
    pub root_disk_size: Option<i64>,
    pub root_disk_iops: Option<i64>,
    /// `key=value` list applied to every created resource
    pub extra_tags_all: Option<String>,
    /// `key=value` list applied to the VM only
    pub extra_tags_instances: Option<String>,
    pub security_group_ids: Vec<String>,
    pub subnet_id: Option<String>,
    /// `proto:port` or `proto:from-to`
    pub extra_ingress_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootDisk {
    pub disk_type: DiskType,
    pub size_gib: u32,
    pub iops: u32,
}

impl RootDisk {
    /// IOPS are only sent for provisioned-IOPS volumes
    pub fn to_spec(&self) -> RootDiskSpec {
        RootDiskSpec {
            device_name: ROOT_DEVICE_NAME.to_string(),
            volume_type: self.disk_type.to_string(),
            size_gib: self.size_gib,
            iops: (self.disk_type == DiskType::Io1).then_some(self.iops),
        }
    }
}

/// Validated driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub credentials: Credentials,
    pub instance_type: String,
    pub source_image: String,
    pub root_disk: RootDisk,
    pub tags_all: Vec<Tag>,
    pub tags_instance: Vec<Tag>,
    /// Caller-supplied groups; empty means the driver creates its own
    pub security_group_ids: Vec<String>,
    pub subnet_id: Option<String>,
    pub extra_ingress_rules: Vec<IngressRule>,
}

impl DriverConfig {
    pub fn from_options(options: &DriverOptions) -> Result<Self> {
        let access_key = explicit_or_env(&options.access_key, ACCESS_KEY_ENV).ok_or_else(|| {
            DriverError::InvalidConfig("an access key must be specified".to_string())
        })?;
        let secret_key = explicit_or_env(&options.secret_key, SECRET_KEY_ENV).ok_or_else(|| {
            DriverError::InvalidConfig("a secret key must be specified".to_string())
        })?;
        let region = explicit_or_env(&options.region, REGION_ENV)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let disk_type = match non_empty(&options.root_disk_type) {
            Some(raw) => raw.parse()?,
            None => DiskType::default(),
        };
        let size_gib = validate_disk_size(options.root_disk_size.unwrap_or(DEFAULT_ROOT_DISK_SIZE))?;
        let iops = validate_iops(options.root_disk_iops.unwrap_or(DEFAULT_ROOT_DISK_IOPS))?;

        let tags_all = parse_tags(options.extra_tags_all.as_deref().unwrap_or_default())?;
        let tags_instance = parse_tags(options.extra_tags_instances.as_deref().unwrap_or_default())?;

        let extra_ingress_rules = options
            .extra_ingress_rules
            .iter()
            .map(|rule| rule.parse())
            .collect::<Result<Vec<IngressRule>>>()?;

        Ok(Self {
            credentials: Credentials {
                access_key,
                secret_key,
                region,
            },
            instance_type: non_empty(&options.instance_type)
                .unwrap_or(DEFAULT_INSTANCE_TYPE)
                .to_string(),
            source_image: non_empty(&options.source_image)
                .unwrap_or(DEFAULT_SOURCE_IMAGE)
                .to_string(),
            root_disk: RootDisk {
                disk_type,
                size_gib,
                iops,
            },
            tags_all,
            tags_instance,
            security_group_ids: options
                .security_group_ids
                .iter()
                .map(|id| id.trim())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect(),
            subnet_id: non_empty(&options.subnet_id).map(str::to_string),
            extra_ingress_rules,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn explicit_or_env(value: &Option<String>, env: &str) -> Option<String> {
    non_empty(value).map(str::to_string).or_else(|| {
        std::env::var(env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

pub fn validate_disk_size(size: i64) -> Result<u32> {
    if size <= 0 {
        return Err(DriverError::InvalidConfig(format!(
            "the root disk size must be greater than 0 (got {})",
            size
        )));
    }
    u32::try_from(size).map_err(|_| {
        DriverError::InvalidConfig(format!("the root disk size {} is too large", size))
    })
}

pub fn validate_iops(iops: i64) -> Result<u32> {
    if !(1..=MAX_ROOT_DISK_IOPS).contains(&iops) {
        return Err(DriverError::InvalidConfig(format!(
            "the root disk IOPS must be between 1 and {} (got {})",
            MAX_ROOT_DISK_IOPS, iops
        )));
    }
    Ok(iops as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use machineflow_cloud::Protocol;

    fn with_keys() -> DriverOptions {
        DriverOptions {
            access_key: Some("AK".to_string()),
            secret_key: Some("SK".to_string()),
            ..Default::default()
        }
    }

    fn no_osc_env<F: FnOnce()>(f: F) {
        temp_env::with_vars_unset([ACCESS_KEY_ENV, SECRET_KEY_ENV, REGION_ENV], f);
    }

    #[test]
    fn test_defaults() {
        no_osc_env(|| {
            let config = DriverConfig::from_options(&with_keys()).unwrap();

            assert_eq!(config.credentials.region, "eu-west-2");
            assert_eq!(config.instance_type, "tinav2.c1r2p3");
            assert_eq!(config.source_image, "ami-504e6b16");
            assert_eq!(
                config.root_disk,
                RootDisk {
                    disk_type: DiskType::Gp2,
                    size_gib: 15,
                    iops: 1500,
                }
            );
            assert!(config.tags_all.is_empty());
            assert!(config.security_group_ids.is_empty());
        });
    }

    #[test]
    fn test_credentials_fall_back_to_environment() {
        temp_env::with_vars(
            [
                (ACCESS_KEY_ENV, Some("env-ak")),
                (SECRET_KEY_ENV, Some("env-sk")),
                (REGION_ENV, Some("us-east-2")),
            ],
            || {
                let config = DriverConfig::from_options(&DriverOptions::default()).unwrap();
                assert_eq!(config.credentials.access_key, "env-ak");
                assert_eq!(config.credentials.secret_key, "env-sk");
                assert_eq!(config.credentials.region, "us-east-2");

                let explicit = DriverConfig::from_options(&with_keys()).unwrap();
                assert_eq!(explicit.credentials.access_key, "AK");
            },
        );
    }

    #[test]
    fn test_missing_secret_key_is_rejected() {
        no_osc_env(|| {
            let options = DriverOptions {
                access_key: Some("AK".to_string()),
                ..Default::default()
            };
            let err = DriverConfig::from_options(&options).unwrap_err();
            assert!(err.to_string().contains("secret key"));
        });
    }

    #[test]
    fn test_disk_size_boundary() {
        assert!(validate_disk_size(-1).is_err());
        let err = validate_disk_size(0).unwrap_err();
        assert!(err.to_string().contains("greater than 0"));
        assert_eq!(validate_disk_size(1).unwrap(), 1);
    }

    #[test]
    fn test_iops_boundaries() {
        assert!(validate_iops(0).is_err());
        assert!(validate_iops(-5).is_err());
        assert_eq!(validate_iops(1).unwrap(), 1);
        assert_eq!(validate_iops(13000).unwrap(), 13000);
        let err = validate_iops(13001).unwrap_err();
        assert!(err.to_string().contains("between 1 and 13000"));
    }

    #[test]
    fn test_disk_type() {
        assert_eq!("io1".parse::<DiskType>().unwrap(), DiskType::Io1);
        assert_eq!("standard".parse::<DiskType>().unwrap(), DiskType::Standard);
        assert!("ssd".parse::<DiskType>().is_err());
    }

    #[test]
    fn test_iops_only_sent_for_io1() {
        let mut disk = RootDisk {
            disk_type: DiskType::Gp2,
            size_gib: 20,
            iops: 3000,
        };
        assert_eq!(disk.to_spec().iops, None);

        disk.disk_type = DiskType::Io1;
        let spec = disk.to_spec();
        assert_eq!(spec.iops, Some(3000));
        assert_eq!(spec.volume_type, "io1");
        assert_eq!(spec.device_name, "/dev/sda1");
    }

    #[test]
    fn test_tags_groups_and_rules() {
        no_osc_env(|| {
            let options = DriverOptions {
                extra_tags_all: Some("env=prod,team=".to_string()),
                extra_tags_instances: Some("role=worker".to_string()),
                security_group_ids: vec!["sg-1".to_string(), " ".to_string()],
                extra_ingress_rules: vec!["udp:51820".to_string()],
                ..with_keys()
            };
            let config = DriverConfig::from_options(&options).unwrap();

            assert_eq!(
                config.tags_all,
                vec![Tag::new("env", "prod"), Tag::new("team", "")]
            );
            assert_eq!(config.tags_instance, vec![Tag::new("role", "worker")]);
            assert_eq!(config.security_group_ids, vec!["sg-1"]);
            assert_eq!(
                config.extra_ingress_rules,
                vec![IngressRule::udp(51820)]
            );
            assert_eq!(config.extra_ingress_rules[0].protocol, Protocol::Udp);
        });
    }

    #[test]
    fn test_invalid_tag_is_rejected() {
        no_osc_env(|| {
            let options = DriverOptions {
                extra_tags_instances: Some("=value".to_string()),
                ..with_keys()
            };
            assert!(matches!(
                DriverConfig::from_options(&options),
                Err(DriverError::InvalidConfig(_))
            ));
        });
    }
}
