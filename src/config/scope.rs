use serde::Serialize;

use crate::input::{self, input_enum, InputEnum, InputSource};

input_enum! {
    /// Level of the resource hierarchy an operation targets.
    pub enum ScopeType {
        Tenant => "tenant",
        ManagementGroup => "managementGroup",
        Subscription => "subscription",
        ResourceGroup => "resourceGroup",
    }
}

/// Scopes a deployment may target.
pub const DEPLOYMENT_SCOPES: &[ScopeType] = &[
    ScopeType::Tenant,
    ScopeType::ManagementGroup,
    ScopeType::Subscription,
    ScopeType::ResourceGroup,
];

/// Scopes a deployment stack may target. Tenant-level stacks do not exist.
pub const STACK_SCOPES: &[ScopeType] = &[
    ScopeType::ManagementGroup,
    ScopeType::Subscription,
    ScopeType::ResourceGroup,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementGroupScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub management_group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub subscription_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupScope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub subscription_id: String,
    pub resource_group: String,
}

/// Target of a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Scope {
    Tenant(TenantScope),
    ManagementGroup(ManagementGroupScope),
    Subscription(SubscriptionScope),
    ResourceGroup(ResourceGroupScope),
}

/// Target of a deployment stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StackScope {
    ManagementGroup(ManagementGroupScope),
    Subscription(SubscriptionScope),
    ResourceGroup(ResourceGroupScope),
}

impl Scope {
    pub fn scope_type(&self) -> ScopeType {
        match self {
            Scope::Tenant(_) => ScopeType::Tenant,
            Scope::ManagementGroup(_) => ScopeType::ManagementGroup,
            Scope::Subscription(_) => ScopeType::Subscription,
            Scope::ResourceGroup(_) => ScopeType::ResourceGroup,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            Scope::Tenant(scope) => scope.tenant_id.as_deref(),
            Scope::ManagementGroup(scope) => scope.tenant_id.as_deref(),
            Scope::Subscription(scope) => scope.tenant_id.as_deref(),
            Scope::ResourceGroup(scope) => scope.tenant_id.as_deref(),
        }
    }
}

impl From<StackScope> for Scope {
    fn from(scope: StackScope) -> Self {
        match scope {
            StackScope::ManagementGroup(scope) => Scope::ManagementGroup(scope),
            StackScope::Subscription(scope) => Scope::Subscription(scope),
            StackScope::ResourceGroup(scope) => Scope::ResourceGroup(scope),
        }
    }
}

impl TryFrom<Scope> for StackScope {
    type Error = input::Error;

    fn try_from(scope: Scope) -> Result<Self, Self::Error> {
        match scope {
            Scope::Tenant(_) => Err(input::Error::InvalidEnum {
                key: "scope".to_string(),
                allowed: STACK_SCOPES.iter().map(InputEnum::as_str).collect(),
                actual: ScopeType::Tenant.to_string(),
            }),
            Scope::ManagementGroup(scope) => Ok(StackScope::ManagementGroup(scope)),
            Scope::Subscription(scope) => Ok(StackScope::Subscription(scope)),
            Scope::ResourceGroup(scope) => Ok(StackScope::ResourceGroup(scope)),
        }
    }
}

/// Read `scope` restricted to `allowed`, then the inputs that scope requires.
fn resolve<S: InputSource>(inputs: &S, allowed: &[ScopeType]) -> Result<Scope, input::Error> {
    let scope_type = inputs.required_enum("scope", allowed)?;
    let tenant_id = inputs.optional_string("tenant-id");

    Ok(match scope_type {
        ScopeType::Tenant => Scope::Tenant(TenantScope { tenant_id }),
        ScopeType::ManagementGroup => Scope::ManagementGroup(ManagementGroupScope {
            tenant_id,
            management_group: inputs.required_string("management-group-id")?,
        }),
        ScopeType::Subscription => Scope::Subscription(SubscriptionScope {
            tenant_id,
            subscription_id: inputs.required_string("subscription-id")?,
        }),
        ScopeType::ResourceGroup => {
            let subscription_id = inputs.required_string("subscription-id")?;
            let resource_group = inputs.required_string("resource-group-name")?;
            Scope::ResourceGroup(ResourceGroupScope {
                tenant_id,
                subscription_id,
                resource_group,
            })
        }
    })
}

pub fn resolve_deployment_scope<S: InputSource>(inputs: &S) -> Result<Scope, input::Error> {
    resolve(inputs, DEPLOYMENT_SCOPES)
}

pub fn resolve_stack_scope<S: InputSource>(inputs: &S) -> Result<StackScope, input::Error> {
    resolve(inputs, STACK_SCOPES)?.try_into()
}
