//! CloudFormation template for one regional key
//!
//! Compiled into the binary; `--cloudformation-template-url` replaces it with
//! a template hosted elsewhere, which must accept the same parameters and
//! produce the same `KeyArn` output.

/// The built-in key template
pub const KEY_TEMPLATE: &str = include_str!("../assets/kms-key.yaml");

/// Parameters every stack is created with
pub const STACK_PARAMETERS: &[&str] = &[
    "AdministratorPrincipals",
    "UserPrincipals",
    "KeyDescription",
    "CreateSimpleRoles",
    "AllowIAMPoliciesToControlKeyAccess",
];
