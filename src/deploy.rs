use std::fmt::{Display, Formatter};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info};
use reqwest::header::{LOCATION, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::{
    ActionConfig, CommonConfig, DeploymentConfig, DeploymentOperation, DeploymentStackConfig,
    Environment, Scope, StackOperation, WhatIfChangeType,
};
use crate::files::ParsedFiles;
use crate::input::InputEnum;

const DEPLOYMENTS_API_VERSION: &str = "2024-03-01";
const STACKS_API_VERSION: &str = "2024-03-01";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Stacks are long-lived, so an unnamed stack keeps the same name across runs.
const DEFAULT_STACK_NAME: &str = "bicep-deploy";

/// Error payload returned by Resource Manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ApiError>,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("acquire access token: {0}")]
    Token(String),

    #[error("run Azure CLI '{program}': {err}")]
    AzureCli {
        program: String,
        #[source]
        err: std::io::Error,
    },

    #[error("reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Api(ApiError),

    #[error("code: {status}, body: {body}")]
    UnexpectedResponse { status: u16, body: String },

    #[error("{operation} failed")]
    Operation {
        operation: &'static str,
        error: ApiError,
    },

    #[error("a template or template spec is required")]
    MissingTemplate,
}

impl Error {
    /// Attribute a Resource Manager error to the operation that raised it.
    fn during(self, operation: &'static str) -> Self {
        match self {
            Error::Api(error) => Error::Operation { operation, error },
            other => other,
        }
    }

    /// The Resource Manager error as a JSON line, nested details included.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            Error::Api(error) | Error::Operation { error, .. } => {
                serde_json::to_string(error).into_iter().collect()
            }
            _ => vec![],
        }
    }
}

fn deployment_operation_name(operation: DeploymentOperation) -> &'static str {
    match operation {
        DeploymentOperation::Create => "Create",
        DeploymentOperation::Validate => "Validation",
        DeploymentOperation::WhatIf => "What-if",
    }
}

fn stack_operation_name(operation: StackOperation) -> &'static str {
    match operation {
        StackOperation::Create => "Create",
        StackOperation::Validate => "Validation",
        StackOperation::Delete => "Delete",
    }
}

/// A change predicted by a what-if operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub resource_id: String,
    pub change_type: String,
}

impl Display for Change {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.change_type, self.resource_id)
    }
}

/// What an operation produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    /// Template outputs, keyed by name, each shaped `{"type": .., "value": ..}`.
    pub outputs: Map<String, Value>,
    /// Changes predicted by a what-if operation.
    pub changes: Vec<Change>,
}

/// Submits an action to the cloud.
pub trait Deployer {
    async fn deploy(&self, config: &ActionConfig, files: &ParsedFiles) -> Result<Outcome, Error>;
}

fn scope_path(scope: &Scope) -> String {
    match scope {
        Scope::Tenant(_) => String::new(),
        Scope::ManagementGroup(scope) => format!(
            "/providers/Microsoft.Management/managementGroups/{}",
            scope.management_group
        ),
        Scope::Subscription(scope) => format!("/subscriptions/{}", scope.subscription_id),
        Scope::ResourceGroup(scope) => format!(
            "/subscriptions/{}/resourceGroups/{}",
            scope.subscription_id, scope.resource_group
        ),
    }
}

pub fn deployment_id(scope: &Scope, name: &str) -> String {
    format!(
        "{}/providers/Microsoft.Resources/deployments/{name}",
        scope_path(scope)
    )
}

pub fn stack_id(scope: &Scope, name: &str) -> String {
    format!(
        "{}/providers/Microsoft.Resources/deploymentStacks/{name}",
        scope_path(scope)
    )
}

fn deployment_name(common: &CommonConfig) -> String {
    common
        .name
        .clone()
        .unwrap_or_else(|| format!("bicep-deploy-{}", Utc::now().format("%Y%m%d%H%M%S")))
}

/// Template, template link and parameters shared by every request body.
fn template_properties(files: &ParsedFiles) -> Result<Map<String, Value>, Error> {
    let mut properties = Map::new();
    match (&files.template_spec_id, &files.template) {
        (Some(id), _) => properties.insert("templateLink".into(), json!({ "id": id })),
        (None, Some(template)) => properties.insert("template".into(), template.clone()),
        (None, None) => return Err(Error::MissingTemplate),
    };
    let parameters = files
        .parameters
        .get("parameters")
        .cloned()
        .unwrap_or_else(|| json!({}));
    properties.insert("parameters".into(), parameters);
    Ok(properties)
}

fn envelope(common: &CommonConfig, properties: Map<String, Value>) -> Result<Value, Error> {
    let mut body = Map::new();
    if let Some(location) = &common.location {
        body.insert("location".into(), json!(location));
    }
    if let Some(tags) = &common.tags {
        body.insert("tags".into(), serde_json::to_value(tags)?);
    }
    body.insert("properties".into(), Value::Object(properties));
    Ok(Value::Object(body))
}

pub fn deployment_body(config: &DeploymentConfig, files: &ParsedFiles) -> Result<Value, Error> {
    let mut properties = template_properties(files)?;
    properties.insert("mode".into(), json!("Incremental"));
    if let Some(level) = config.validation_level {
        properties.insert("validationLevel".into(), json!(level.as_str()));
    }
    if config.operation == DeploymentOperation::WhatIf {
        properties.insert(
            "whatIfSettings".into(),
            json!({ "resultFormat": "FullResourcePayloads" }),
        );
    }
    envelope(&config.common, properties)
}

pub fn stack_body(config: &DeploymentStackConfig, files: &ParsedFiles) -> Result<Value, Error> {
    let mut properties = template_properties(files)?;
    if let Some(description) = &config.description {
        properties.insert("description".into(), json!(description));
    }
    properties.insert(
        "actionOnUnmanage".into(),
        serde_json::to_value(&config.action_on_unmanage)?,
    );
    properties.insert(
        "denySettings".into(),
        serde_json::to_value(&config.deny_settings)?,
    );
    properties.insert(
        "bypassStackOutOfSyncError".into(),
        json!(config.bypass_stack_out_of_sync_error),
    );
    envelope(&config.common, properties)
}

/// Query parameters of a stack deletion.
fn stack_delete_query(config: &DeploymentStackConfig) -> Vec<(&'static str, &'static str)> {
    let unmanage = &config.action_on_unmanage;
    let mut query = vec![
        ("api-version", STACKS_API_VERSION),
        ("unmanageAction.Resources", unmanage.resources.as_str()),
    ];
    if let Some(action) = unmanage.resource_groups {
        query.push(("unmanageAction.ResourceGroups", action.as_str()));
    }
    if let Some(action) = unmanage.management_groups {
        query.push(("unmanageAction.ManagementGroups", action.as_str()));
    }
    query.push((
        "bypassStackOutOfSyncError",
        if config.bypass_stack_out_of_sync_error {
            "true"
        } else {
            "false"
        },
    ));
    query
}

fn provisioning_state(resource: &Value) -> &str {
    resource["properties"]["provisioningState"]
        .as_str()
        .unwrap_or_default()
}

/// Error of a resource whose provisioning ended unsuccessfully.
fn provisioning_error(resource: &Value, state: &str) -> ApiError {
    parse_error(&resource["properties"]["error"]).unwrap_or_else(|| ApiError {
        code: state.to_string(),
        message: format!("Provisioning finished in state '{state}'"),
        details: vec![],
    })
}

fn parse_error(value: &Value) -> Option<ApiError> {
    if value.is_null() {
        return None;
    }
    serde_json::from_value(value.clone()).ok()
}

fn outputs_of(resource: &Value) -> Map<String, Value> {
    resource["properties"]["outputs"]
        .as_object()
        .cloned()
        .unwrap_or_default()
}

/// Fail if a synchronous or polled result carries an error.
fn check_result(result: &Value) -> Result<(), Error> {
    let error =
        parse_error(&result["error"]).or_else(|| parse_error(&result["properties"]["error"]));
    match error {
        Some(error) => Err(Error::Api(error)),
        None => Ok(()),
    }
}

fn what_if_changes(result: &Value, exclude: &[WhatIfChangeType]) -> Result<Vec<Change>, Error> {
    let changes: Vec<Change> = match result["properties"]["changes"].as_array() {
        Some(changes) => changes
            .iter()
            .map(|change| serde_json::from_value::<Change>(change.clone()))
            .collect::<Result<_, _>>()?,
        None => vec![],
    };

    Ok(changes
        .into_iter()
        .filter(|change| {
            !exclude
                .iter()
                .any(|excluded| excluded.as_str().eq_ignore_ascii_case(&change.change_type))
        })
        .collect())
}

async fn json_body(response: Response) -> Result<Value, Error> {
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

async fn api_error(response: Response) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        error: ApiError,
    }

    let status = response.status().as_u16();
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => return Error::Reqwest(err),
    };

    match serde_json::from_slice::<ErrorResponse>(&bytes) {
        Ok(body) => Error::Api(body.error),
        Err(_) => Error::UnexpectedResponse {
            status,
            body: String::from_utf8_lossy(&bytes).to_string(),
        },
    }
}

/// Get a Resource Manager token from the logged-in Azure CLI, unless one
/// is provided through `AZURE_ACCESS_TOKEN`.
async fn access_token(endpoint: &str, tenant_id: Option<&str>) -> Result<String, Error> {
    if let Some(token) = std::env::var("AZURE_ACCESS_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty())
    {
        debug!("Using access token from AZURE_ACCESS_TOKEN");
        return Ok(token.trim().to_string());
    }

    cli_token("az", endpoint, tenant_id).await
}

async fn cli_token(program: &str, endpoint: &str, tenant_id: Option<&str>) -> Result<String, Error> {
    debug!("Requesting an access token for {endpoint} from the Azure CLI");
    let mut command = tokio::process::Command::new(program);
    command.args([
        "account",
        "get-access-token",
        "--resource",
        endpoint,
        "--query",
        "accessToken",
        "--output",
        "tsv",
    ]);
    if let Some(tenant_id) = tenant_id {
        command.args(["--tenant", tenant_id]);
    }

    let output = command.output().await.map_err(|err| Error::AzureCli {
        program: program.to_string(),
        err,
    })?;
    if !output.status.success() {
        return Err(Error::Token(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Resource Manager REST client.
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    /// Delay between polls when the server does not send `Retry-After`.
    poll_interval: Duration,
}

impl ArmClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self, Error> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub async fn connect(environment: Environment, tenant_id: Option<&str>) -> Result<Self, Error> {
        let endpoint = environment.management_endpoint();
        let token = access_token(endpoint, tenant_id).await?;
        Self::new(endpoint, token)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response, Error> {
        debug!("{method} {url}");
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        if response.status().is_client_error() || response.status().is_server_error() {
            return Err(api_error(response).await);
        }
        Ok(response)
    }

    async fn call(
        &self,
        method: Method,
        id: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<Response, Error> {
        let url = format!("{}{id}", self.endpoint);
        self.send(method, &url, query, body).await
    }

    fn poll_delay(&self, response: &Response) -> Duration {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(self.poll_interval)
    }

    /// Poll a resource until its provisioning state is terminal.
    async fn wait_for_provisioning(
        &self,
        id: &str,
        api_version: &str,
        response: Response,
    ) -> Result<Value, Error> {
        let mut delay = self.poll_delay(&response);
        let mut resource = json_body(response).await?;
        loop {
            let state = provisioning_state(&resource).to_string();
            match state.to_ascii_lowercase().as_str() {
                "succeeded" => return Ok(resource),
                "failed" | "canceled" => {
                    return Err(Error::Api(provisioning_error(&resource, &state)))
                }
                _ => debug!("{id} is '{state}', checking again in {delay:?}"),
            }

            tokio::time::sleep(delay).await;
            let response = self
                .call(Method::GET, id, &[("api-version", api_version)], None)
                .await?;
            delay = self.poll_delay(&response);
            resource = json_body(response).await?;
        }
    }

    /// Follow an asynchronous operation's `Location` header to its result.
    async fn wait_for_result(&self, mut response: Response) -> Result<Value, Error> {
        while response.status() == StatusCode::ACCEPTED {
            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
            else {
                break;
            };

            let delay = self.poll_delay(&response);
            debug!("Operation in progress, checking again in {delay:?}");
            tokio::time::sleep(delay).await;
            response = self.send(Method::GET, &location, &[], None).await?;
        }

        let result = json_body(response).await?;
        check_result(&result)?;
        Ok(result)
    }

    async fn deploy_template(
        &self,
        config: &DeploymentConfig,
        files: &ParsedFiles,
    ) -> Result<Outcome, Error> {
        let id = deployment_id(&config.scope, &deployment_name(&config.common));
        let body = deployment_body(config, files)?;
        let query = [("api-version", DEPLOYMENTS_API_VERSION)];

        match config.operation {
            DeploymentOperation::Create => {
                info!("Creating deployment {id}");
                let response = self.call(Method::PUT, &id, &query, Some(&body)).await?;
                let resource = self
                    .wait_for_provisioning(&id, DEPLOYMENTS_API_VERSION, response)
                    .await?;
                Ok(Outcome {
                    outputs: outputs_of(&resource),
                    ..Default::default()
                })
            }
            DeploymentOperation::Validate => {
                info!("Validating deployment {id}");
                let url = format!("{id}/validate");
                let response = self.call(Method::POST, &url, &query, Some(&body)).await?;
                self.wait_for_result(response).await?;
                Ok(Outcome::default())
            }
            DeploymentOperation::WhatIf => {
                info!("Running what-if for deployment {id}");
                let url = format!("{id}/whatIf");
                let response = self.call(Method::POST, &url, &query, Some(&body)).await?;
                let result = self.wait_for_result(response).await?;
                let exclude = config.what_if.exclude_change_types.as_deref().unwrap_or_default();
                Ok(Outcome {
                    changes: what_if_changes(&result, exclude)?,
                    ..Default::default()
                })
            }
        }
    }

    async fn deploy_stack(
        &self,
        config: &DeploymentStackConfig,
        files: &ParsedFiles,
    ) -> Result<Outcome, Error> {
        let name = config
            .common
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_STACK_NAME.to_string());
        let scope: Scope = config.scope.clone().into();
        let id = stack_id(&scope, &name);
        let query = [("api-version", STACKS_API_VERSION)];

        match config.operation {
            StackOperation::Create => {
                info!("Creating deployment stack {id}");
                let body = stack_body(config, files)?;
                let response = self.call(Method::PUT, &id, &query, Some(&body)).await?;
                let resource = self
                    .wait_for_provisioning(&id, STACKS_API_VERSION, response)
                    .await?;
                Ok(Outcome {
                    outputs: outputs_of(&resource),
                    ..Default::default()
                })
            }
            StackOperation::Validate => {
                info!("Validating deployment stack {id}");
                let body = stack_body(config, files)?;
                let url = format!("{id}/validate");
                let response = self.call(Method::POST, &url, &query, Some(&body)).await?;
                self.wait_for_result(response).await?;
                Ok(Outcome::default())
            }
            StackOperation::Delete => {
                info!("Deleting deployment stack {id}");
                let response = self
                    .call(Method::DELETE, &id, &stack_delete_query(config), None)
                    .await?;
                self.wait_for_result(response).await?;
                Ok(Outcome::default())
            }
        }
    }
}

impl Deployer for ArmClient {
    async fn deploy(&self, config: &ActionConfig, files: &ParsedFiles) -> Result<Outcome, Error> {
        match config {
            ActionConfig::Deployment(config) => self
                .deploy_template(config, files)
                .await
                .map_err(|err| err.during(deployment_operation_name(config.operation))),
            ActionConfig::DeploymentStack(config) => self
                .deploy_stack(config, files)
                .await
                .map_err(|err| err.during(stack_operation_name(config.operation))),
        }
    }
}
