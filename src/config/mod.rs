//! Resolution of action inputs into a validated [`ActionConfig`].
//!
//! Inputs are read in a fixed order and the first violation aborts
//! resolution, so a given set of inputs always reports the same error.

use std::path::PathBuf;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::input::{self, input_enum, InputEnum, InputSource, StringMap};

pub mod scope;

pub use scope::{Scope, StackScope};

input_enum! {
    pub enum ActionType {
        Deployment => "deployment",
        DeploymentStack => "deploymentStack",
    }
}

input_enum! {
    /// Azure cloud the action talks to.
    pub enum Environment {
        AzureCloud => "azureCloud",
        AzureChinaCloud => "azureChinaCloud",
        AzureGermanCloud => "azureGermanCloud",
        AzureUsGovernment => "azureUSGovernment",
    }
}

impl Environment {
    /// Base URL of the Resource Manager endpoint of this cloud.
    pub fn management_endpoint(&self) -> &'static str {
        match self {
            Environment::AzureCloud => "https://management.azure.com",
            Environment::AzureChinaCloud => "https://management.chinacloudapi.cn",
            Environment::AzureGermanCloud => "https://management.microsoftazure.de",
            Environment::AzureUsGovernment => "https://management.usgovcloudapi.net",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::AzureCloud
    }
}

input_enum! {
    pub enum DeploymentOperation {
        Create => "create",
        Validate => "validate",
        WhatIf => "whatIf",
    }
}

input_enum! {
    pub enum StackOperation {
        Create => "create",
        Validate => "validate",
        Delete => "delete",
    }
}

input_enum! {
    pub enum WhatIfChangeType {
        Create => "create",
        Delete => "delete",
        Modify => "modify",
        Deploy => "deploy",
        NoChange => "noChange",
        Ignore => "ignore",
        Unsupported => "unsupported",
    }
}

input_enum! {
    pub enum ValidationLevel {
        Provider => "provider",
        Template => "template",
        ProviderNoRbac => "providerNoRbac",
    }
}

input_enum! {
    /// What happens to a resource once a stack no longer manages it.
    pub enum UnmanageAction {
        Delete => "delete",
        Detach => "detach",
    }
}

input_enum! {
    pub enum DenySettingsMode {
        DenyDelete => "denyDelete",
        DenyWriteAndDelete => "denyWriteAndDelete",
        None => "none",
    }
}

/// Where the template and parameters come from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters_file: Option<PathBuf>,
    /// Inline parameter values; these win over the parameters file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bicep_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<StringMap>,
    /// Outputs whose values must never reach the log.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked_outputs: Option<Vec<String>>,
    pub environment: Environment,
    #[serde(flatten)]
    pub files: FileConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_change_types: Option<Vec<WhatIfChangeType>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub operation: DeploymentOperation,
    pub scope: Scope,
    pub what_if: WhatIfSettings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_level: Option<ValidationLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOnUnmanage {
    pub resources: UnmanageAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_groups: Option<UnmanageAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_groups: Option<UnmanageAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DenySettings {
    pub mode: DenySettingsMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_actions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_principals: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply_to_child_scopes: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStackConfig {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub operation: StackOperation,
    pub scope: StackScope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "actionOnUnManage")]
    pub action_on_unmanage: ActionOnUnmanage,
    pub deny_settings: DenySettings,
    pub bypass_stack_out_of_sync_error: bool,
}

/// Fully validated action configuration. Built once per run, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionConfig {
    Deployment(DeploymentConfig),
    DeploymentStack(DeploymentStackConfig),
}

impl ActionConfig {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionConfig::Deployment(_) => ActionType::Deployment,
            ActionConfig::DeploymentStack(_) => ActionType::DeploymentStack,
        }
    }

    pub fn common(&self) -> &CommonConfig {
        match self {
            ActionConfig::Deployment(config) => &config.common,
            ActionConfig::DeploymentStack(config) => &config.common,
        }
    }

    pub fn files(&self) -> &FileConfig {
        &self.common().files
    }

    pub fn masked_outputs(&self) -> &[String] {
        self.common().masked_outputs.as_deref().unwrap_or_default()
    }

    /// Name of the operation, e.g. `whatIf`.
    pub fn operation(&self) -> &'static str {
        match self {
            ActionConfig::Deployment(config) => config.operation.as_str(),
            ActionConfig::DeploymentStack(config) => config.operation.as_str(),
        }
    }

    /// Target scope, widened to the deployment scope type.
    pub fn scope(&self) -> Scope {
        match self {
            ActionConfig::Deployment(config) => config.scope.clone(),
            ActionConfig::DeploymentStack(config) => config.scope.clone().into(),
        }
    }
}

/// Resolve the action configuration from its inputs.
pub fn parse<S: InputSource>(inputs: &S) -> Result<ActionConfig, input::Error> {
    let action_type = inputs.required_enum("type", ActionType::ALL)?;
    let name = inputs.optional_string("name");
    let location = inputs.optional_string("location");
    let template_file = inputs.optional_file_path("template-file")?;
    let parameters_file = inputs.optional_file_path("parameters-file")?;
    let parameters = inputs.optional_dictionary("parameters")?;
    let bicep_version = inputs.optional_string("bicep-version");
    let description = inputs.optional_string("description");
    let tags = inputs.optional_string_dictionary("tags")?;
    let masked_outputs = inputs.optional_string_list("masked-outputs");
    let environment = inputs
        .optional_enum("environment", Environment::ALL)?
        .unwrap_or_default();

    let common = CommonConfig {
        name,
        location,
        tags,
        masked_outputs,
        environment,
        files: FileConfig {
            template_file,
            parameters_file,
            parameters,
            bicep_version,
        },
    };

    Ok(match action_type {
        ActionType::Deployment => ActionConfig::Deployment(parse_deployment(inputs, common)?),
        ActionType::DeploymentStack => {
            ActionConfig::DeploymentStack(parse_stack(inputs, common, description)?)
        }
    })
}

fn parse_deployment<S: InputSource>(
    inputs: &S,
    common: CommonConfig,
) -> Result<DeploymentConfig, input::Error> {
    let operation = inputs.required_enum("operation", DeploymentOperation::ALL)?;
    let scope = scope::resolve_deployment_scope(inputs)?;
    let exclude_change_types =
        inputs.optional_enum_list("what-if-exclude-change-types", WhatIfChangeType::ALL)?;
    let validation_level = inputs.optional_enum("validation-level", ValidationLevel::ALL)?;

    Ok(DeploymentConfig {
        common,
        operation,
        scope,
        what_if: WhatIfSettings {
            exclude_change_types,
        },
        validation_level,
    })
}

fn parse_stack<S: InputSource>(
    inputs: &S,
    common: CommonConfig,
    description: Option<String>,
) -> Result<DeploymentStackConfig, input::Error> {
    let operation = inputs.required_enum("operation", StackOperation::ALL)?;
    let scope = scope::resolve_stack_scope(inputs)?;

    let action_on_unmanage = ActionOnUnmanage {
        resources: inputs.required_enum("action-on-unmanage-resources", UnmanageAction::ALL)?,
        resource_groups: inputs
            .optional_enum("action-on-unmanage-resourcegroups", UnmanageAction::ALL)?,
        management_groups: inputs
            .optional_enum("action-on-unmanage-managementgroups", UnmanageAction::ALL)?,
    };
    let bypass_stack_out_of_sync_error =
        inputs.required_boolean("bypass-stack-out-of-sync-error")?;
    let deny_settings = DenySettings {
        mode: inputs.required_enum("deny-settings-mode", DenySettingsMode::ALL)?,
        excluded_actions: inputs.optional_string_list("deny-settings-excluded-actions"),
        excluded_principals: inputs.optional_string_list("deny-settings-excluded-principals"),
        apply_to_child_scopes: inputs.optional_boolean("deny-settings-apply-to-child-scopes")?,
    };

    Ok(DeploymentStackConfig {
        common,
        operation,
        scope,
        description,
        action_on_unmanage,
        deny_settings,
        bypass_stack_out_of_sync_error,
    })
}

#[cfg(test)]
mod tests {
    use super::scope::{ResourceGroupScope, SubscriptionScope};
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::Path;

    fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn assert_error(pairs: &[(&str, &str)], message: &str) {
        match parse(&inputs(pairs)) {
            Ok(config) => panic!("expected '{message}', got {config:?}"),
            Err(err) => assert_eq!(err.to_string(), message),
        }
    }

    const STACK_RG: &[(&str, &str)] = &[
        ("type", "deploymentStack"),
        ("operation", "create"),
        ("scope", "resourceGroup"),
        ("subscription-id", "foo"),
        ("resource-group-name", "mockRg"),
    ];

    fn stack_rg_with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        STACK_RG.iter().chain(extra).copied().collect()
    }

    #[test]
    fn requires_type() {
        assert_error(&[], "Action input 'type' is required but not provided");
        assert!(matches!(
            parse(&inputs(&[("tags", "invalid"), ("environment", "asdf")])),
            Err(input::Error::MissingInput(key)) if key == "type"
        ));
    }

    #[test]
    fn requires_a_valid_type() {
        assert_error(
            &[("type", "foo")],
            "Action input 'type' must be one of the following values: 'deployment', 'deploymentStack'",
        );
    }

    #[test]
    fn tags_must_be_a_string_object() {
        for tags in ["invalid", r#"{"foo": {}}"#] {
            assert!(matches!(
                parse(&inputs(&[("type", "deployment"), ("tags", tags)])),
                Err(input::Error::InvalidObject(key)) if key == "tags"
            ));
        }
        assert_error(
            &[("type", "deployment"), ("tags", "invalid")],
            "Action input 'tags' must be a valid JSON or YAML object",
        );
    }

    #[test]
    fn requires_operation() {
        assert_error(
            &[("type", "deployment")],
            "Action input 'operation' is required but not provided",
        );
    }

    #[test]
    fn operation_depends_on_type() {
        assert_error(
            &[("type", "deployment"), ("operation", "delete")],
            "Action input 'operation' must be one of the following values: 'create', 'validate', 'whatIf'",
        );
        assert_error(
            &[("type", "deploymentStack"), ("operation", "whatIf")],
            "Action input 'operation' must be one of the following values: 'create', 'validate', 'delete'",
        );
    }

    #[test]
    fn environment_is_checked_before_kind_specific_inputs() {
        let message = "Action input 'environment' must be one of the following values: 'azureCloud', 'azureChinaCloud', 'azureGermanCloud', 'azureUSGovernment'";
        assert_error(
            &[
                ("type", "deployment"),
                ("operation", "create"),
                ("scope", "resourceGroup"),
                ("subscription-id", "foo"),
                ("resource-group-name", "mockRg"),
                ("what-if-exclude-change-types", "blah"),
                ("environment", "asdf"),
            ],
            message,
        );
        assert_error(
            &stack_rg_with(&[
                ("action-on-unmanage-resources", "detach"),
                ("action-on-unmanage-managementgroups", "sadf"),
                ("environment", "asdf"),
            ]),
            message,
        );
    }

    #[test]
    fn blocks_tenant_scope_for_stacks() {
        assert_error(
            &[
                ("type", "deploymentStack"),
                ("operation", "create"),
                ("scope", "tenant"),
            ],
            "Action input 'scope' must be one of the following values: 'managementGroup', 'subscription', 'resourceGroup'",
        );
    }

    #[test]
    fn requires_scope_companion_inputs() {
        assert_error(
            &[("type", "deployment"), ("operation", "create"), ("scope", "subscription")],
            "Action input 'subscription-id' is required but not provided",
        );
        assert_error(
            &[("type", "deployment"), ("operation", "create"), ("scope", "managementGroup")],
            "Action input 'management-group-id' is required but not provided",
        );
    }

    #[test]
    fn validates_deployment_enums() {
        let base = [
            ("type", "deployment"),
            ("operation", "create"),
            ("scope", "resourceGroup"),
            ("subscription-id", "foo"),
            ("resource-group-name", "mockRg"),
        ];
        let with = |extra: (&'static str, &'static str)| {
            let mut pairs = base.to_vec();
            pairs.push(extra);
            pairs
        };

        assert_error(
            &with(("what-if-exclude-change-types", "blah")),
            "Action input 'what-if-exclude-change-types' must be one of the following values: 'create', 'delete', 'modify', 'deploy', 'noChange', 'ignore', 'unsupported'",
        );
        assert_error(
            &with(("validation-level", "blah")),
            "Action input 'validation-level' must be one of the following values: 'provider', 'template', 'providerNoRbac'",
        );
    }

    #[test]
    fn validates_stack_inputs_in_order() {
        assert_error(
            STACK_RG,
            "Action input 'action-on-unmanage-resources' is required but not provided",
        );
        assert_error(
            &stack_rg_with(&[("action-on-unmanage-resources", "sadf")]),
            "Action input 'action-on-unmanage-resources' must be one of the following values: 'delete', 'detach'",
        );
        assert_error(
            &stack_rg_with(&[
                ("action-on-unmanage-resources", "detach"),
                ("action-on-unmanage-resourcegroups", "sadf"),
            ]),
            "Action input 'action-on-unmanage-resourcegroups' must be one of the following values: 'delete', 'detach'",
        );
        assert_error(
            &stack_rg_with(&[
                ("action-on-unmanage-resources", "detach"),
                ("action-on-unmanage-managementgroups", "sadf"),
            ]),
            "Action input 'action-on-unmanage-managementgroups' must be one of the following values: 'delete', 'detach'",
        );
        assert_error(
            &stack_rg_with(&[
                ("action-on-unmanage-resources", "detach"),
                ("bypass-stack-out-of-sync-error", "asdfasdf"),
            ]),
            "Action input 'bypass-stack-out-of-sync-error' must be a boolean value",
        );
        assert_error(
            &stack_rg_with(&[("action-on-unmanage-resources", "detach")]),
            "Action input 'bypass-stack-out-of-sync-error' is required but not provided",
        );
        assert_error(
            &stack_rg_with(&[
                ("action-on-unmanage-resources", "detach"),
                ("bypass-stack-out-of-sync-error", "false"),
            ]),
            "Action input 'deny-settings-mode' is required but not provided",
        );
        assert_error(
            &stack_rg_with(&[
                ("action-on-unmanage-resources", "detach"),
                ("bypass-stack-out-of-sync-error", "false"),
                ("deny-settings-mode", "asdfasdf"),
            ]),
            "Action input 'deny-settings-mode' must be one of the following values: 'denyDelete', 'denyWriteAndDelete', 'none'",
        );
        assert_error(
            &stack_rg_with(&[
                ("action-on-unmanage-resources", "detach"),
                ("bypass-stack-out-of-sync-error", "false"),
                ("deny-settings-mode", "none"),
                ("deny-settings-apply-to-child-scopes", "yes"),
            ]),
            "Action input 'deny-settings-apply-to-child-scopes' must be a boolean value",
        );
    }

    #[test]
    fn parses_deployment_inputs() {
        let config = parse(&inputs(&[
            ("type", "deployment"),
            ("name", "mockName"),
            ("operation", "create"),
            ("scope", "resourceGroup"),
            ("subscription-id", "mockSub"),
            ("resource-group-name", "mockRg"),
            ("location", "mockLocation"),
            ("template-file", "/path/to/mockTemplateFile"),
            ("parameters-file", "/path/to/mockParametersFile"),
            ("parameters", r#"{"foo": "bar2"}"#),
            ("description", "mockDescription"),
            ("tags", r#"{"foo": "bar"}"#),
            ("masked-outputs", "abc,def"),
            ("what-if-exclude-change-types", "noChange"),
            ("validation-level", "providerNoRbac"),
            ("environment", "azureUSGovernment"),
        ]))
        .unwrap();

        let expected = ActionConfig::Deployment(DeploymentConfig {
            common: CommonConfig {
                name: Some("mockName".into()),
                location: Some("mockLocation".into()),
                tags: Some(StringMap::from_iter([("foo", "bar")])),
                masked_outputs: Some(vec!["abc".into(), "def".into()]),
                environment: Environment::AzureUsGovernment,
                files: FileConfig {
                    template_file: Some(PathBuf::from("/path/to/mockTemplateFile")),
                    parameters_file: Some(PathBuf::from("/path/to/mockParametersFile")),
                    parameters: json!({"foo": "bar2"}).as_object().cloned(),
                    bicep_version: None,
                },
            },
            operation: DeploymentOperation::Create,
            scope: Scope::ResourceGroup(ResourceGroupScope {
                tenant_id: None,
                subscription_id: "mockSub".into(),
                resource_group: "mockRg".into(),
            }),
            what_if: WhatIfSettings {
                exclude_change_types: Some(vec![WhatIfChangeType::NoChange]),
            },
            validation_level: Some(ValidationLevel::ProviderNoRbac),
        });

        assert_eq!(config, expected);
        assert_eq!(config.action_type(), ActionType::Deployment);
        assert_eq!(config.operation(), "create");
        assert_eq!(config.masked_outputs(), ["abc", "def"]);
    }

    #[test]
    fn parses_deployment_stack_inputs() {
        let config = parse(&inputs(&[
            ("type", "deploymentStack"),
            ("name", "mockName"),
            ("operation", "delete"),
            ("scope", "subscription"),
            ("subscription-id", "mockSub"),
            ("location", "mockLocation"),
            ("template-file", "/path/to/mockTemplateFile"),
            ("parameters-file", "/path/to/mockParametersFile"),
            (
                "parameters",
                r#"
{
  "stringParam": "foo",
  "intParam": 123,
  "boolParam": true,
  "arrayParam": ["val1", "val2", "val3"],
  "objectParam": {"prop1": "val1", "prop2": "val2"}
}"#,
            ),
            ("description", "mockDescription"),
            ("tags", r#"{"foo": "bar"}"#),
            ("masked-outputs", "abc,def"),
            ("action-on-unmanage-resources", "delete"),
            ("action-on-unmanage-resourcegroups", "delete"),
            ("action-on-unmanage-managementgroups", "delete"),
            ("deny-settings-mode", "none"),
            ("deny-settings-excluded-actions", "abc,def"),
            ("deny-settings-excluded-principals", "ghi,jkl"),
            ("deny-settings-apply-to-child-scopes", "true"),
            ("bypass-stack-out-of-sync-error", "true"),
            ("environment", "azureUSGovernment"),
        ]))
        .unwrap();

        let ActionConfig::DeploymentStack(stack) = &config else {
            panic!("expected a deployment stack, got {config:?}");
        };
        assert_eq!(stack.operation, StackOperation::Delete);
        assert_eq!(
            stack.scope,
            StackScope::Subscription(SubscriptionScope {
                tenant_id: None,
                subscription_id: "mockSub".into(),
            })
        );
        assert_eq!(stack.description.as_deref(), Some("mockDescription"));
        assert_eq!(
            stack.action_on_unmanage,
            ActionOnUnmanage {
                resources: UnmanageAction::Delete,
                resource_groups: Some(UnmanageAction::Delete),
                management_groups: Some(UnmanageAction::Delete),
            }
        );
        assert_eq!(
            stack.deny_settings,
            DenySettings {
                mode: DenySettingsMode::None,
                excluded_actions: Some(vec!["abc".into(), "def".into()]),
                excluded_principals: Some(vec!["ghi".into(), "jkl".into()]),
                apply_to_child_scopes: Some(true),
            }
        );
        assert!(stack.bypass_stack_out_of_sync_error);
        assert_eq!(
            Value::Object(stack.common.files.parameters.clone().unwrap()),
            json!({
                "stringParam": "foo",
                "intParam": 123,
                "boolParam": true,
                "arrayParam": ["val1", "val2", "val3"],
                "objectParam": {"prop1": "val1", "prop2": "val2"}
            })
        );
        assert_eq!(config.scope(), Scope::from(stack.scope.clone()));
    }

    #[test]
    fn parses_minimal_stack() {
        let config = parse(&inputs(&stack_rg_with(&[
            ("action-on-unmanage-resources", "delete"),
            ("deny-settings-mode", "none"),
            ("bypass-stack-out-of-sync-error", "true"),
        ])))
        .unwrap();

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "deploymentStack");
        assert_eq!(json["actionOnUnManage"], json!({"resources": "delete"}));
        assert_eq!(json["denySettings"], json!({"mode": "none"}));
        assert_eq!(json["bypassStackOutOfSyncError"], true);
        assert_eq!(json["environment"], "azureCloud");
        assert_eq!(json["scope"]["type"], "resourceGroup");
    }

    #[test]
    fn supports_yaml_parameters() {
        let config = parse(&inputs(&[
            ("type", "deployment"),
            ("operation", "create"),
            ("scope", "resourceGroup"),
            ("subscription-id", "mockSub"),
            ("resource-group-name", "mockRg"),
            (
                "parameters",
                "
stringParam: foo
intParam: 123
boolParam: true
arrayParam:
  - val1
  - val2
objectParam:
  prop1: val1
",
            ),
        ]))
        .unwrap();

        assert_eq!(
            Value::Object(config.files().parameters.clone().unwrap()),
            json!({
                "stringParam": "foo",
                "intParam": 123,
                "boolParam": true,
                "arrayParam": ["val1", "val2"],
                "objectParam": {"prop1": "val1"}
            })
        );
    }

    #[test]
    fn defaults_optional_inputs() {
        let config = parse(&inputs(&[
            ("type", "deployment"),
            ("operation", "create"),
            ("scope", "resourceGroup"),
            ("subscription-id", "mockSub"),
            ("resource-group-name", "mockRg"),
            ("template-file", "/path/to/mockTemplateFile"),
            ("bicep-version", "0.30.23"),
        ]))
        .unwrap();

        let ActionConfig::Deployment(deployment) = &config else {
            panic!("expected a deployment, got {config:?}");
        };
        assert_eq!(deployment.common.environment, Environment::AzureCloud);
        assert_eq!(deployment.common.name, None);
        assert_eq!(deployment.common.tags, None);
        assert_eq!(deployment.what_if.exclude_change_types, None);
        assert_eq!(deployment.validation_level, None);
        assert_eq!(config.files().bicep_version.as_deref(), Some("0.30.23"));
        assert_eq!(
            config.files().template_file.as_deref(),
            Some(Path::new("/path/to/mockTemplateFile"))
        );
        assert!(config.masked_outputs().is_empty());
    }

    #[test]
    fn resolution_is_deterministic() {
        let source = inputs(&[
            ("type", "deployment"),
            ("operation", "whatIf"),
            ("scope", "tenant"),
            ("location", "westus"),
            ("template-file", "main.bicep"),
        ]);
        assert_eq!(parse(&source).unwrap(), parse(&source).unwrap());
    }

    #[test]
    fn environment_endpoints() {
        assert_eq!(
            Environment::default().management_endpoint(),
            "https://management.azure.com"
        );
        assert_eq!(
            Environment::AzureChinaCloud.management_endpoint(),
            "https://management.chinacloudapi.cn"
        );
    }
}
