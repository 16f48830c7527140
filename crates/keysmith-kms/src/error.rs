//! Error types for keysmith-kms

use thiserror::Error;

/// Result type alias using keysmith-kms's error type
pub type Result<T> = std::result::Result<T, KmsError>;

/// A failure scoped to one region
#[derive(Debug)]
pub struct RegionFailure {
    pub region: String,
    pub error: KmsError,
}

impl std::fmt::Display for RegionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.region, self.error)
    }
}

/// Errors raised while provisioning keys or listing grants
#[derive(Error, Debug)]
pub enum KmsError {
    /// An AWS API call failed
    #[error("{operation} failed: {message}")]
    Remote {
        operation: String,
        code: Option<String>,
        message: String,
    },

    /// No region could be resolved for a client
    #[error("No AWS region configured")]
    MissingRegion,

    /// The alias exists but the key behind it is disabled
    #[error(
        "There is a KMS key in {region} with a matching alias, but the key is disabled. \
         If the alias is no longer in use, you may try again after deleting the alias. \
         To delete the alias, run: aws --region {region} kms delete-alias --alias-name {alias}"
    )]
    DisabledKey { region: String, alias: String },

    /// The stack exists but its alias does not
    #[error(
        "A CloudFormation stack named '{stack}' exists, but the corresponding key alias \
         '{alias}' does not. The most likely cause of this is that a key was incompletely \
         deleted. You can resolve this by deleting the stack or by using an alternate label. \
         To delete the stack, run: aws --region {region} cloudformation delete-stack \
         --stack-name {stack}."
    )]
    InconsistentStack {
        region: String,
        stack: String,
        alias: String,
    },

    /// One or more regions could not be probed cleanly
    #[error("Please manually resolve the issues and try again.")]
    ProbeFailed { failures: Vec<RegionFailure> },

    /// Some regions already have keys and filling the gaps was not requested
    #[error(
        "You've requested to use {requested} regions, but {existing} regions already have keys \
         provisioned for label '{label}'. If you'd like the additional regions to be provisioned, \
         re-run this command with the --create-missing-keys flag. If you'd like to use a new set \
         of keys, re-run with the --label flag. If you'd like to choose a different set of \
         regions, use the --regions flag. Run 'keysmith kms init --help' for more information."
    )]
    MissingKeysNotAllowed {
        requested: usize,
        existing: usize,
        label: String,
    },

    /// An administrator or user list was empty after canonicalization
    #[error("{role} ARNs: {source}")]
    Principals {
        role: &'static str,
        #[source]
        source: keysmith_core::Error,
    },

    /// DescribeStacks returned nothing for a stack we just created
    #[error("DescribeStacks returned an empty stack list for {stack}.")]
    EmptyStackList { stack: String },

    /// A created stack lacks the output holding the key ARN
    #[error("Stack {stack} does not have an Output named {output}.")]
    MissingStackOutput { stack: String, output: String },

    /// The alias could not be found right after creating it
    #[error("Failed to discover ARN of new alias {alias}")]
    AliasNotFound { alias: String },

    /// The secret references an alias that is gone from a region
    #[error("Alias {alias} does not exist in {region}")]
    AliasMissingInRegion { alias: String, region: String },

    /// One or more provisioning units failed
    #[error("Failed to provision {}", describe_failures(.failures))]
    ProvisioningFailed { failures: Vec<RegionFailure> },

    /// Core error (store, arn parsing, validation)
    #[error(transparent)]
    Core(#[from] keysmith_core::Error),
}

fn describe_failures(failures: &[RegionFailure]) -> String {
    failures
        .iter()
        .map(|f| f.region.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl KmsError {
    /// Create a remote API error
    pub fn remote(
        operation: impl Into<String>,
        code: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self::Remote {
            operation: operation.into(),
            code: code.map(String::from),
            message: message.into(),
        }
    }

    /// AWS error code, if this error (or a nested region failure) carries one
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => code.as_deref(),
            Self::MissingRegion => Some("MissingRegion"),
            Self::ProbeFailed { failures } | Self::ProvisioningFailed { failures } => {
                failures.iter().find_map(|f| f.error.code())
            }
            _ => None,
        }
    }

    /// Per-region failures carried by an aggregate error
    pub fn region_failures(&self) -> &[RegionFailure] {
        match self {
            Self::ProbeFailed { failures } | Self::ProvisioningFailed { failures } => failures,
            _ => &[],
        }
    }
}
