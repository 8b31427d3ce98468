use gateway_validation_core::{
    k8s::GroupVersionKind, DecodeError, ReportErrors, Reports, ResourceId,
};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation is not yet available. Waiting for first snapshot")]
    NotReady,

    #[error("{}/{} {} is not supported for validation", .0.group, .0.version, .0.kind)]
    UnsupportedResource(GroupVersionKind),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("{id} is incompatible with the current snapshot: {violations}")]
    Rejected {
        id: ResourceId,
        reports: Box<Reports>,
        violations: Violations,
    },

    #[error(transparent)]
    Batch(#[from] BatchError),
}

/// Every problem found while rendering and validating a snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Violations(Vec<Violation>);

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("could not render proxy {proxy}: {errors}")]
    Render { proxy: String, errors: ReportErrors },

    #[error("failed to validate proxy {proxy}: {message}")]
    SecondaryValidation { proxy: String, message: String },

    #[error("expected exactly one validation report for proxy {proxy}, got {count}")]
    ResponseShape { proxy: String, count: usize },

    #[error("proxy {proxy} was rejected: {errors}")]
    ProxyRejected { proxy: String, errors: ReportErrors },

    #[error("proxy {proxy} has warnings: {warnings}")]
    Warning {
        proxy: String,
        warnings: ReportErrors,
    },

    #[error("proxy {proxy} has invalid resources: {errors}")]
    ResourceReports { proxy: String, errors: ReportErrors },
}

/// One or more items of a batch failed.
#[derive(Debug, thiserror::Error)]
#[error("{}", display_items(.errors))]
pub struct BatchError {
    /// Reports accumulated across the whole batch.
    pub reports: Box<Reports>,
    pub errors: Vec<ItemError>,
}

#[derive(Debug, thiserror::Error)]
#[error("item {index}: {error}")]
pub struct ItemError {
    pub index: usize,
    #[source]
    pub error: Error,
}

fn display_items(errors: &[ItemError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// === impl Error ===

impl Error {
    /// Reports produced before the request was rejected, if any.
    pub fn reports(&self) -> Option<&Reports> {
        match self {
            Self::Rejected { reports, .. } => Some(&**reports),
            Self::Batch(batch) => Some(&*batch.reports),
            _ => None,
        }
    }
}

// === impl Violations ===

impl Violations {
    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> + '_ {
        self.0.iter()
    }

    /// True if any violation comes from the secondary validator failing
    /// rather than from the configuration itself.
    pub fn has_breaking(&self) -> bool {
        self.0.iter().any(Violation::is_breaking)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            v.fmt(f)?;
        }
        Ok(())
    }
}

impl std::error::Error for Violations {}

// === impl Violation ===

impl Violation {
    pub fn is_breaking(&self) -> bool {
        matches!(
            self,
            Self::SecondaryValidation { .. } | Self::ResponseShape { .. }
        )
    }
}
