//! Outscale API client
//!
//! Direct OSC API implementation of [`CloudApi`]. Each operation is a signed
//! JSON `POST` to `<endpoint>/<Operation>`.

use crate::signer::{CONTENT_TYPE, Signer};
use crate::wire::*;
use async_trait::async_trait;
use machineflow_cloud::{
    AccountInfo, CloudApi, CloudError, CreateKeypairRequest, CreateSecurityGroupRequest,
    CreateSecurityGroupRuleRequest, CreateVmsRequest, Credentials, Keypair, PublicIp, Result,
    SecurityGroup, Subnet, Tag, Vm,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

const USER_AGENT: &str = concat!("machineflow/", env!("CARGO_PKG_VERSION"));

/// Default endpoint for a region
pub fn default_endpoint(region: &str) -> String {
    format!("https://api.{}.outscale.com/api/v1", region)
}

/// Outscale API client
pub struct OutscaleClient {
    http: reqwest::Client,
    endpoint: String,
    signer: Signer,
}

impl OutscaleClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CloudError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: default_endpoint(&credentials.region),
            signer: Signer::new(credentials),
        })
    }

    /// Override the API endpoint (e.g. for a private deployment)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<Req, Resp>(&self, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = reqwest::Url::parse(&format!("{}/{}", self.endpoint, operation))
            .map_err(|e| CloudError::InvalidConfig(format!("endpoint {}: {}", self.endpoint, e)))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(CloudError::InvalidConfig(format!(
                    "endpoint {} has no host",
                    self.endpoint
                )));
            }
        };

        let body = serde_json::to_vec(request)?;
        let signed = self
            .signer
            .sign_post(&host, url.path(), &body, chrono::Utc::now());

        tracing::debug!("POST {}", url);

        let response = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .header("x-amz-date", signed.amz_date)
            .header(reqwest::header::AUTHORIZATION, signed.authorization)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(operation, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(operation, e))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &bytes));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| CloudError::UnexpectedResponse(format!("{}: {}", operation, e)))
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> CloudError {
    CloudError::Transport(format!("{}: {}", operation, err))
}

/// Build an [`CloudError::Api`] from a non-2xx answer
fn api_error(status: u16, body: &[u8]) -> CloudError {
    let parsed: ErrorResponse = serde_json::from_slice(body).unwrap_or_default();
    CloudError::Api {
        status,
        errors: parsed.errors.into_iter().map(Into::into).collect(),
        request_id: parsed.response_context.and_then(|c| c.request_id),
    }
}

#[async_trait]
impl CloudApi for OutscaleClient {
    async fn read_account(&self) -> Result<Option<AccountInfo>> {
        let response: ReadAccountsResponse = self.call("ReadAccounts", &Empty {}).await?;
        Ok(response.accounts.into_iter().next().map(Into::into))
    }

    async fn create_keypair(&self, request: &CreateKeypairRequest) -> Result<Option<Keypair>> {
        let body = CreateKeypairBody {
            keypair_name: &request.name,
            public_key: &request.public_key,
        };
        let response: CreateKeypairResponse = self.call("CreateKeypair", &body).await?;
        Ok(response.keypair.map(Into::into))
    }

    async fn delete_keypair(&self, name: &str) -> Result<()> {
        let _: Acknowledged = self
            .call("DeleteKeypair", &DeleteKeypairBody { keypair_name: name })
            .await?;
        Ok(())
    }

    async fn create_security_group(
        &self,
        request: &CreateSecurityGroupRequest,
    ) -> Result<Option<SecurityGroup>> {
        let body = CreateSecurityGroupBody {
            security_group_name: &request.name,
            description: &request.description,
            net_id: request.net_id.as_deref(),
        };
        let response: SecurityGroupResponse = self.call("CreateSecurityGroup", &body).await?;
        Ok(response.security_group.map(Into::into))
    }

    async fn create_security_group_rule(
        &self,
        request: &CreateSecurityGroupRuleRequest,
    ) -> Result<Option<SecurityGroup>> {
        let body = CreateSecurityGroupRuleBody::from(request);
        let response: SecurityGroupResponse = self.call("CreateSecurityGroupRule", &body).await?;
        Ok(response.security_group.map(Into::into))
    }

    async fn read_security_groups(&self, ids: &[String]) -> Result<Vec<SecurityGroup>> {
        let body = ReadBody {
            filters: SecurityGroupFilters {
                security_group_ids: ids,
            },
        };
        let response: ReadSecurityGroupsResponse = self.call("ReadSecurityGroups", &body).await?;
        Ok(response.security_groups.into_iter().map(Into::into).collect())
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        let _: Acknowledged = self
            .call(
                "DeleteSecurityGroup",
                &DeleteSecurityGroupBody {
                    security_group_id: id,
                },
            )
            .await?;
        Ok(())
    }

    async fn create_public_ip(&self) -> Result<Option<PublicIp>> {
        let response: CreatePublicIpResponse = self.call("CreatePublicIp", &Empty {}).await?;
        Ok(response.public_ip.map(Into::into))
    }

    async fn link_public_ip(&self, public_ip_id: &str, vm_id: &str) -> Result<Option<String>> {
        let body = LinkPublicIpBody {
            public_ip_id,
            vm_id,
        };
        let response: LinkPublicIpResponse = self.call("LinkPublicIp", &body).await?;
        Ok(response.link_public_ip_id)
    }

    async fn delete_public_ip(&self, id: &str) -> Result<()> {
        let _: Acknowledged = self
            .call("DeletePublicIp", &DeletePublicIpBody { public_ip_id: id })
            .await?;
        Ok(())
    }

    async fn create_tags(&self, resource_ids: &[String], tags: &[Tag]) -> Result<()> {
        let body = CreateTagsBody {
            resource_ids,
            tags: tags.iter().map(Into::into).collect(),
        };
        let _: Acknowledged = self.call("CreateTags", &body).await?;
        Ok(())
    }

    async fn read_subnets(&self, ids: &[String]) -> Result<Vec<Subnet>> {
        let body = ReadBody {
            filters: SubnetFilters { subnet_ids: ids },
        };
        let response: ReadSubnetsResponse = self.call("ReadSubnets", &body).await?;
        Ok(response.subnets.into_iter().map(Into::into).collect())
    }

    async fn create_vms(&self, request: &CreateVmsRequest) -> Result<Vec<Vm>> {
        let body = CreateVmsBody::from(request);
        let response: VmsResponse = self.call("CreateVms", &body).await?;
        Ok(response.vms.into_iter().map(Into::into).collect())
    }

    async fn read_vms(&self, ids: &[String]) -> Result<Vec<Vm>> {
        let body = ReadBody {
            filters: VmFilters { vm_ids: ids },
        };
        let response: VmsResponse = self.call("ReadVms", &body).await?;
        Ok(response.vms.into_iter().map(Into::into).collect())
    }

    async fn start_vms(&self, ids: &[String]) -> Result<()> {
        let _: Acknowledged = self.call("StartVms", &VmIdsBody { vm_ids: ids }).await?;
        Ok(())
    }

    async fn stop_vms(&self, ids: &[String], force: bool) -> Result<()> {
        let body = StopVmsBody {
            vm_ids: ids,
            force_stop: force,
        };
        let _: Acknowledged = self.call("StopVms", &body).await?;
        Ok(())
    }

    async fn reboot_vms(&self, ids: &[String]) -> Result<()> {
        let _: Acknowledged = self.call("RebootVms", &VmIdsBody { vm_ids: ids }).await?;
        Ok(())
    }

    async fn delete_vms(&self, ids: &[String]) -> Result<()> {
        let _: Acknowledged = self.call("DeleteVms", &VmIdsBody { vm_ids: ids }).await?;
        Ok(())
    }
}
