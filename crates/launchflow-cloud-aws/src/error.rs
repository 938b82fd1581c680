//! Translation of AWS SDK failures into tagged gateway errors

use aws_sdk_sts::error::{BuildError, DisplayErrorContext, ProvideErrorMetadata, SdkError};
use launchflow_cloud::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    NotFound,
    AlreadyExists,
    DependencyViolation,
    Throttled,
    Other,
}

/// Classify a service error code.
///
/// AWS services name the same condition differently (`NoSuchEntity`,
/// `InvalidGroup.NotFound`, `ClusterNotFoundException`, ...), so matching is
/// done on well-known suffixes plus a short table of exceptions.
pub(crate) fn kind_of(code: &str) -> ErrorKind {
    match code {
        "NotFound"
        | "ServiceNotActiveException"
        | "LoadBalancerNotFound"
        | "TargetGroupNotFound"
        | "ListenerNotFound" => return ErrorKind::NotFound,
        "DependencyViolation"
        | "ResourceInUse"
        | "ResourceInUseException"
        | "DeleteConflict"
        | "BucketNotEmpty"
        | "DistributionNotDisabled"
        | "ClusterContainsServicesException"
        | "ClusterContainsTasksException"
        | "ClusterContainsContainerInstancesException"
        | "RepositoryNotEmptyException" => return ErrorKind::DependencyViolation,
        "Throttling"
        | "ThrottlingException"
        | "Throttled"
        | "TooManyRequestsException"
        | "RequestLimitExceeded"
        | "PriorRequestNotComplete"
        | "SlowDown" => return ErrorKind::Throttled,
        "EntityAlreadyExists"
        | "BucketAlreadyOwnedByYou"
        | "CNAMEAlreadyExists"
        | "DuplicateLoadBalancerName"
        | "DuplicateTargetGroupName"
        | "DuplicateListener" => return ErrorKind::AlreadyExists,
        _ => {}
    }

    if code.starts_with("NoSuch")
        || code.ends_with(".NotFound")
        || code.ends_with("NotFoundException")
        || code.ends_with("NotFoundFault")
    {
        ErrorKind::NotFound
    } else if code.ends_with(".Duplicate")
        || code.ends_with("AlreadyExists")
        || code.ends_with("AlreadyExistsException")
    {
        ErrorKind::AlreadyExists
    } else {
        ErrorKind::Other
    }
}

pub(crate) fn tagged(kind: ErrorKind, operation: &str, message: String) -> GatewayError {
    match kind {
        ErrorKind::NotFound => GatewayError::NotFound(message),
        ErrorKind::AlreadyExists => GatewayError::AlreadyExists(message),
        ErrorKind::DependencyViolation => GatewayError::DependencyViolation(message),
        ErrorKind::Throttled => GatewayError::Throttled(message),
        ErrorKind::Other => GatewayError::other(operation, message),
    }
}

/// Map an SDK error onto a [`GatewayError`] kind.
pub(crate) fn classify<E, R>(operation: &str, err: SdkError<E, R>) -> GatewayError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    match err.as_service_error() {
        Some(service) => {
            let code = service.code().unwrap_or_default();
            let message = match service.message() {
                Some(m) => format!("{} ({})", m, code),
                None => code.to_string(),
            };
            tracing::debug!(operation, code, "AWS service error");
            tagged(kind_of(code), operation, message)
        }
        None => {
            let message = DisplayErrorContext(&err).to_string();
            if matches!(err, SdkError::TimeoutError(_)) {
                GatewayError::Throttled(format!("{}: {}", operation, message))
            } else {
                GatewayError::other(operation, message)
            }
        }
    }
}

/// Request builders fail when a required member is missing
pub(crate) fn invalid_request(operation: &str, err: BuildError) -> GatewayError {
    GatewayError::other(operation, format!("invalid request: {}", err))
}

/// Response without a member the API documents as always present
pub(crate) fn missing(operation: &str, member: &str) -> GatewayError {
    GatewayError::other(operation, format!("response is missing {}", member))
}

/// Lookup helper: not-found becomes `Ok(None)`
pub(crate) fn optional<T>(result: Result<T, GatewayError>) -> Result<Option<T>, GatewayError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(GatewayError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
