use serde::Serialize;

/// Structured error type for the synthesis pipeline.
///
/// Only `EmptyLayout` and `ZeroDuration` abort a generation request. The
/// remaining variants describe recoverable conditions: stages that hit them
/// record a warning and substitute a documented fallback instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("Input parse error: {message}")]
    InputParse { message: String },
    #[error("Timing unavailable: {message}")]
    TimingUnavailable { message: String },
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
    #[error("Layout contains no fixtures")]
    EmptyLayout,
    #[error("Timeline duration must be positive")]
    ZeroDuration,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SynthError {
    /// Stable machine-readable code, used by the CLI's JSON error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            SynthError::InputParse { .. } => "InputParseError",
            SynthError::TimingUnavailable { .. } => "TimingUnavailableError",
            SynthError::InvalidConfiguration { .. } => "InvalidConfigurationError",
            SynthError::EmptyLayout => "EmptyLayout",
            SynthError::ZeroDuration => "ZeroDuration",
            SynthError::Io(_) => "IoError",
            SynthError::Xml(_) => "XmlError",
            SynthError::Json(_) => "JsonError",
        }
    }

    /// True for conditions that make the request unusable as a whole.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SynthError::InputParse { .. }
                | SynthError::TimingUnavailable { .. }
        )
    }
}

impl Serialize for SynthError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("SynthError", 2)?;
        s.serialize_field("code", self.code())?;
        s.serialize_field("detail", &self.to_string())?;
        s.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_errors_are_not_fatal() {
        let parse = SynthError::InputParse {
            message: "model without name".into(),
        };
        let timing = SynthError::TimingUnavailable {
            message: "timed out".into(),
        };
        assert!(!parse.is_fatal());
        assert!(!timing.is_fatal());
        assert!(SynthError::EmptyLayout.is_fatal());
        assert!(SynthError::ZeroDuration.is_fatal());
    }

    #[test]
    fn serializes_with_code_and_detail() {
        let json = serde_json::to_value(SynthError::ZeroDuration).unwrap();
        assert_eq!(json["code"], "ZeroDuration");
        assert_eq!(json["detail"], "Timeline duration must be positive");
    }
}
