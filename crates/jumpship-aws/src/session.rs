//! Execution session from the ambient AWS credential chain.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::error::DisplayErrorContext;
use tracing::{debug, warn};

use jumpship_core::{DeployError, DeployResult, SessionContext, SessionProvider};

/// [`SessionProvider`] backed by the SDK configuration and STS.
#[derive(Debug, Clone)]
pub struct AwsSession {
    sdk_config: SdkConfig,
    sts: aws_sdk_sts::Client,
    iam: aws_sdk_iam::Client,
    role_arn: Option<String>,
}

impl AwsSession {
    /// Create a session provider.
    ///
    /// When `role_arn` is given, STS is not consulted.
    #[must_use]
    pub fn new(sdk_config: &SdkConfig, role_arn: Option<String>) -> Self {
        Self {
            sdk_config: sdk_config.clone(),
            sts: aws_sdk_sts::Client::new(sdk_config),
            iam: aws_sdk_iam::Client::new(sdk_config),
            role_arn,
        }
    }

    fn region(&self) -> DeployResult<String> {
        self.sdk_config
            .region()
            .map(ToString::to_string)
            .ok_or_else(|| DeployError::session("no region configured"))
    }

    async fn caller_role(&self) -> DeployResult<String> {
        let identity = self
            .sts
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| DeployError::session_with("GetCallerIdentity failed", e))?;

        let arn = identity
            .arn()
            .ok_or_else(|| DeployError::session("caller identity has no ARN"))?;
        debug!(caller = %arn, "resolved caller identity");

        let Some(assumed) = AssumedRole::parse(arn) else {
            return role_from_caller_arn(arn);
        };
        match self.role_arn_from_iam(assumed.name).await {
            Some(role_arn) => Ok(role_arn),
            None => role_from_caller_arn(arn),
        }
    }

    /// Full ARN, path included, of a role in the caller's account.
    async fn role_arn_from_iam(&self, role_name: &str) -> Option<String> {
        match self.iam.get_role().role_name(role_name).send().await {
            Ok(output) => {
                let arn: Option<&str> = output.role().map(|role| role.arn()).and_then(Into::into);
                debug!(role = %role_name, arn = ?arn, "resolved role through IAM");
                arn.map(str::to_owned)
            }
            Err(e) => {
                warn!(
                    role = %role_name,
                    error = %DisplayErrorContext(&e),
                    "GetRole failed, deriving role ARN from caller identity"
                );
                None
            }
        }
    }
}

#[async_trait]
impl SessionProvider for AwsSession {
    async fn session(&self) -> DeployResult<SessionContext> {
        let region = self.region()?;
        let role_arn = match &self.role_arn {
            Some(arn) => arn.clone(),
            None => self.caller_role().await?,
        };
        Ok(SessionContext { region, role_arn })
    }
}

/// Role names the SageMaker console creates under the `service-role/` path.
const SERVICE_ROLE_PREFIX: &str = "AmazonSageMaker-ExecutionRole";

/// Parts of an `arn:<partition>:sts::<account>:assumed-role/<name>/<session>` ARN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssumedRole<'a> {
    /// ARN partition, e.g. `aws` or `aws-cn`.
    pub partition: &'a str,
    /// Account that owns the role.
    pub account: &'a str,
    /// Role name without its path.
    pub name: &'a str,
}

impl<'a> AssumedRole<'a> {
    /// Split an STS assumed-role ARN; `None` for any other ARN.
    #[must_use]
    pub fn parse(arn: &'a str) -> Option<Self> {
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        let ["arn", partition, "sts", _region, account, resource] = parts.as_slice() else {
            return None;
        };
        let mut segments = (*resource).split('/');
        match (segments.next(), segments.next()) {
            (Some("assumed-role"), Some(name)) if !name.is_empty() && !account.is_empty() => {
                Some(Self {
                    partition: *partition,
                    account: *account,
                    name,
                })
            }
            _ => None,
        }
    }

    /// IAM ARN of the role when its path is not known.
    ///
    /// STS drops the role path, so console-created SageMaker execution roles
    /// are placed back under `service-role/`.
    #[must_use]
    pub fn role_arn(&self) -> String {
        let path = if self.name.starts_with(SERVICE_ROLE_PREFIX) {
            "service-role/"
        } else {
            ""
        };
        format!(
            "arn:{}:iam::{}:role/{path}{}",
            self.partition, self.account, self.name
        )
    }
}

/// Execution role ARN for a caller identity ARN, without asking IAM.
///
/// `arn:aws:sts::<account>:assumed-role/<role>/<session>` becomes
/// `arn:aws:iam::<account>:role/<role>`, with `service-role/` restored for
/// SageMaker execution roles. IAM role ARNs are returned unchanged; anything
/// else is not a role.
pub fn role_from_caller_arn(arn: &str) -> DeployResult<String> {
    if let Some(assumed) = AssumedRole::parse(arn) {
        return Ok(assumed.role_arn());
    }

    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    match parts.as_slice() {
        ["arn", _, "iam", _, account, resource]
            if !account.is_empty() && resource.starts_with("role/") =>
        {
            Ok(arn.to_owned())
        }
        _ => Err(DeployError::NotARole {
            arn: arn.to_owned(),
        }),
    }
}
