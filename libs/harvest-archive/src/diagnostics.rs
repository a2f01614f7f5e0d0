//! Validation diagnostics
//!
//! Format violations found while parsing a record are never returned as errors: they are
//! accumulated as [ValidationError] entries in a [Diagnostics] list so that a scan can go
//! on and report everything that is wrong with a record.

use std::fmt;

/// Kind of a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// A mandatory field is absent or empty
    Missing,
    /// A field is present but its value could not be parsed or is inconsistent
    Invalid,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::Missing => write!(f, "missing"),
            DiagnosticKind::Invalid => write!(f, "invalid"),
        }
    }
}

/// A single validation error attached to a record, a header or a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Kind of error
    pub kind: DiagnosticKind,
    /// Name of the offending field (or pseudo-field such as `ARC record`)
    pub field: String,
    /// Raw value, if there was one
    pub value: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {}: {:?}", self.kind, self.field, value),
            None => write!(f, "{} {}", self.kind, self.field),
        }
    }
}

/// Ordered, append-only list of validation errors.
///
/// Storage is only allocated when the first error is pushed, most records being valid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics(Option<Vec<ValidationError>>);

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics(None)
    }

    /// Appends a validation error.
    ///
    /// ## Arguments
    /// * `kind` - The error kind.
    /// * `field` - The name of the field the error is about.
    /// * `value` - The raw value, if any.
    pub fn push(&mut self, kind: DiagnosticKind, field: &str, value: Option<&str>) {
        self.0.get_or_insert_with(Vec::new).push(ValidationError {
            kind,
            field: field.to_string(),
            value: value.map(str::to_string),
        });
    }

    pub fn missing(&mut self, field: &str) {
        self.push(DiagnosticKind::Missing, field, None);
    }

    pub fn invalid(&mut self, field: &str, value: &str) {
        self.push(DiagnosticKind::Invalid, field, Some(value));
    }

    /// Appends every error of `other`, keeping their order.
    pub fn extend(&mut self, other: &Diagnostics) {
        if let Some(errors) = &other.0 {
            self.0.get_or_insert_with(Vec::new).extend(errors.iter().cloned());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.as_ref().is_none_or(Vec::is_empty)
    }

    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, Vec::len)
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        self.0.as_deref().unwrap_or(&[])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.as_slice().iter()
    }

    /// Number of errors of the given kind about the given field.
    pub fn count(&self, kind: DiagnosticKind, field: &str) -> usize {
        self.iter()
            .filter(|e| e.kind == kind && e.field == field)
            .count()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Common validity contract of every parsed archive item.
pub trait Validate {
    /// Diagnostics collected so far.
    fn diagnostics(&self) -> &Diagnostics;

    /// Structural compliance (for instance, the expected number of fields).
    fn is_compliant(&self) -> bool {
        true
    }

    /// Compliant and without any diagnostic.
    fn is_valid(&self) -> bool {
        self.is_compliant() && self.diagnostics().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostics_lazy() {
        let diagnostics = Diagnostics::new();
        assert!(diagnostics.is_empty());
        assert_eq!(diagnostics.len(), 0);
        assert!(diagnostics.as_slice().is_empty());
        assert_eq!(diagnostics.0, None);
    }

    #[test]
    fn test_diagnostics_order() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.missing("Checksum");
        diagnostics.invalid("Offset", "12x");
        diagnostics.push(DiagnosticKind::Invalid, "ARC record", None);

        let fields: Vec<&str> = diagnostics.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["Checksum", "Offset", "ARC record"]);
        assert_eq!(diagnostics.count(DiagnosticKind::Missing, "Checksum"), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::Invalid, "Checksum"), 0);
        assert_eq!(diagnostics.as_slice()[1].value.as_deref(), Some("12x"));
    }

    #[test]
    fn test_diagnostics_extend() {
        let mut a = Diagnostics::new();
        a.missing("URL");
        let mut b = Diagnostics::new();
        b.invalid("IP-address", "1.2.3");
        a.extend(&b);
        a.extend(&Diagnostics::new());
        assert_eq!(a.len(), 2);
        assert_eq!(a.as_slice()[1].field, "IP-address");
    }

    #[test]
    fn test_validation_error_display() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.invalid("Offset", "12x");
        diagnostics.missing("URL");
        assert_eq!(diagnostics.as_slice()[0].to_string(), "invalid Offset: \"12x\"");
        assert_eq!(diagnostics.as_slice()[1].to_string(), "missing URL");
    }

    struct Dummy(bool, Diagnostics);

    impl Validate for Dummy {
        fn diagnostics(&self) -> &Diagnostics {
            &self.1
        }
        fn is_compliant(&self) -> bool {
            self.0
        }
    }

    #[test]
    fn test_validate_default() {
        assert!(Dummy(true, Diagnostics::new()).is_valid());
        assert!(!Dummy(false, Diagnostics::new()).is_valid());
        let mut diagnostics = Diagnostics::new();
        diagnostics.missing("URL");
        assert!(!Dummy(true, diagnostics).is_valid());
    }
}
