use clap::Args;
use machineflow_driver::DriverOptions;

/// Outscale driver flags for `create`
#[derive(Args, Debug, Clone, Default)]
pub struct OutscaleArgs {
    /// Outscale access key
    #[arg(long = "outscale-access-key", env = "OUTSCALE_ACCESS_KEY")]
    pub access_key: Option<String>,

    /// Outscale secret key
    #[arg(
        long = "outscale-secret-key",
        env = "OUTSCALE_SECRET_KEY",
        hide_env_values = true
    )]
    pub secret_key: Option<String>,

    /// Outscale region (default: eu-west-2)
    #[arg(long = "outscale-region", env = "OUTSCALE_REGION")]
    pub region: Option<String>,

    /// VM type (default: tinav2.c1r2p3)
    #[arg(long = "outscale-instance-type", env = "OUTSCALE_INSTANCE_TYPE")]
    pub instance_type: Option<String>,

    /// Source image (OMI) of the VM
    #[arg(long = "outscale-source-omi", env = "OUTSCALE_SOURCE_OMI")]
    pub source_omi: Option<String>,

    /// Tags applied to every created resource (key1=value1,key2=value2)
    #[arg(long = "outscale-extra-tags-all")]
    pub extra_tags_all: Option<String>,

    /// Tags applied to the VM only (key1=value1,key2=value2)
    #[arg(long = "outscale-extra-tags-instances")]
    pub extra_tags_instances: Option<String>,

    /// Existing security groups to use instead of creating one
    #[arg(long = "outscale-security-group-ids", value_delimiter = ',')]
    pub security_group_ids: Vec<String>,

    /// Root disk type: standard, io1 or gp2 (default: gp2)
    #[arg(long = "outscale-root-disk-type")]
    pub root_disk_type: Option<String>,

    /// Root disk size in GiB (default: 15)
    #[arg(long = "outscale-root-disk-size", allow_negative_numbers = true)]
    pub root_disk_size: Option<i64>,

    /// Root disk IOPS, io1 only (default: 1500)
    #[arg(long = "outscale-root-disk-io1-iops", allow_negative_numbers = true)]
    pub root_disk_iops: Option<i64>,

    /// Subnet to place the VM in
    #[arg(long = "outscale-subnet-id")]
    pub subnet_id: Option<String>,

    /// Additional inbound rule on the created security group (tcp:8080, udp:6000-6010)
    #[arg(long = "outscale-extra-ingress-rule")]
    pub extra_ingress_rules: Vec<String>,
}

impl From<OutscaleArgs> for DriverOptions {
    fn from(args: OutscaleArgs) -> Self {
        Self {
            access_key: args.access_key,
            secret_key: args.secret_key,
            region: args.region,
            instance_type: args.instance_type,
            source_image: args.source_omi,
            root_disk_type: args.root_disk_type,
            root_disk_size: args.root_disk_size,
            root_disk_iops: args.root_disk_iops,
            extra_tags_all: args.extra_tags_all,
            extra_tags_instances: args.extra_tags_instances,
            security_group_ids: args.security_group_ids,
            subnet_id: args.subnet_id,
            extra_ingress_rules: args.extra_ingress_rules,
        }
    }
}
