use ipresolver::errors::{IpResolverError, Result};
use std::error::Error;

#[cfg(test)]
mod error_creation_tests {
    use super::*;

    #[test]
    fn test_network_error() {
        let error = IpResolverError::network("connection refused");

        assert!(matches!(error, IpResolverError::Network(_)));
        assert!(error.to_string().contains("Network Error"));
        assert!(error.to_string().contains("connection refused"));
    }

    #[test]
    fn test_archive_corrupt_error() {
        let error = IpResolverError::archive_corrupt("invalid gzip header");

        assert!(matches!(error, IpResolverError::ArchiveCorrupt(_)));
        assert!(error.to_string().contains("Archive Corrupt"));
        assert!(error.to_string().contains("invalid gzip header"));
    }

    #[test]
    fn test_payload_not_found_error() {
        let error = IpResolverError::payload_not_found("archive contains no .mmdb file");

        assert!(matches!(error, IpResolverError::PayloadNotFound(_)));
        assert!(error.to_string().contains("Payload Not Found"));
    }

    #[test]
    fn test_install_error() {
        let error = IpResolverError::install("rename failed");

        assert!(matches!(error, IpResolverError::Install(_)));
        assert!(error.to_string().contains("Install Error"));
        assert!(error.to_string().contains("rename failed"));
    }

    #[test]
    fn test_lookup_errors() {
        let unavailable = IpResolverError::database_unavailable("none yet");
        let miss = IpResolverError::lookup_miss("no entry for 192.0.2.1");
        let invalid = IpResolverError::invalid_ip("'abc' is not an IP address");
        let failed = IpResolverError::lookup_failed("bad pointer");

        assert!(unavailable.to_string().contains("Database Unavailable"));
        assert!(miss.to_string().contains("Lookup Miss"));
        assert!(invalid.to_string().contains("Invalid IP Address"));
        assert!(failed.to_string().contains("Lookup Failed"));
    }
}

#[cfg(test)]
mod error_code_tests {
    use super::*;

    #[test]
    fn test_codes_are_stable_and_unique() {
        let errors = [
            IpResolverError::network(""),
            IpResolverError::archive_corrupt(""),
            IpResolverError::payload_not_found(""),
            IpResolverError::install(""),
            IpResolverError::database_unavailable(""),
            IpResolverError::lookup_miss(""),
            IpResolverError::invalid_ip(""),
            IpResolverError::lookup_failed(""),
            IpResolverError::config(""),
            IpResolverError::file_operation(""),
        ];
        let codes: Vec<&str> = errors.iter().map(|e| e.code()).collect();

        assert_eq!(
            codes,
            vec![
                "E001", "E002", "E003", "E004", "E005", "E006", "E007", "E008", "E009", "E010"
            ]
        );
    }

    #[test]
    fn test_refresh_stage_errors_are_not_benign() {
        for error in [
            IpResolverError::network("x"),
            IpResolverError::archive_corrupt("x"),
            IpResolverError::payload_not_found("x"),
            IpResolverError::install("x"),
        ] {
            assert!(error.is_refresh_stage());
            assert!(!error.is_benign());
        }
    }
}

#[cfg(test)]
mod error_conversion_tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: IpResolverError = io_error.into();

        assert!(matches!(error, IpResolverError::FileOperation(_)));
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_question_mark_propagation() {
        fn read_missing() -> Result<Vec<u8>> {
            Ok(std::fs::read("/definitely/not/here/ipDataBase.mmdb")?)
        }

        let error = read_missing().unwrap_err();
        assert_eq!(error.code(), "E010");
    }

    #[test]
    fn test_std_error_trait() {
        let error = IpResolverError::config("bad value");
        let as_dyn: &dyn Error = &error;

        assert!(as_dyn.source().is_none());
        assert_eq!(as_dyn.to_string(), "Configuration Error: bad value");
    }
}

#[cfg(test)]
mod error_format_tests {
    use super::*;

    #[test]
    fn test_format_simple() {
        let error = IpResolverError::invalid_ip("'x' is not an IP address");
        assert_eq!(
            error.format_simple(),
            "Invalid IP Address: 'x' is not an IP address"
        );
    }

    #[test]
    fn test_format_colored_contains_code_and_message() {
        colored::control::set_override(false);
        let error = IpResolverError::network("timed out");
        let formatted = error.format_colored();

        assert!(formatted.contains("[ERROR]"));
        assert!(formatted.contains("E001"));
        assert!(formatted.contains("Network Error"));
        assert!(formatted.contains("timed out"));
    }
}
