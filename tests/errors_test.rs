#[cfg(test)]
mod error_tests {
    use crabwatch::errors::WatchError;
    use std::error::Error;

    #[test]
    fn test_segment_open_failed_display() {
        let error = WatchError::SegmentOpenFailed("captures is read-only".to_string());
        assert_eq!(
            error.to_string(),
            "Segment open failed: captures is read-only"
        );
        assert_eq!(error.kind(), "segment-open-failed");
    }

    #[test]
    fn test_segment_lifecycle_kinds_are_distinct() {
        let kinds = [
            WatchError::SegmentOpenFailed(String::new()).kind(),
            WatchError::SegmentAlreadyOpen(String::new()).kind(),
            WatchError::SegmentClosed(String::new()).kind(),
            WatchError::SegmentWriteFailed(String::new()).kind(),
            WatchError::SegmentFinalizeFailed(String::new()).kind(),
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_source_error_display() {
        let error = WatchError::SourceError("camera unplugged".to_string());
        assert!(error.to_string().contains("Frame source error"));
        assert!(error.to_string().contains("camera unplugged"));
    }

    #[test]
    fn test_error_debug_format() {
        let error = WatchError::ConfigError("Debug test".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("ConfigError"));
        assert!(debug_str.contains("Debug test"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error: WatchError = io.into();
        assert_eq!(error.kind(), "io-error");
        assert!(error.to_string().contains("denied"));
    }

    #[test]
    fn test_implements_error_trait() {
        let error = WatchError::Unsupported("mp4".to_string());
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_converts_into_anyhow() {
        fn fails() -> anyhow::Result<()> {
            Err(WatchError::SegmentWriteFailed("disk full".to_string()).into())
        }
        let err = fails().unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert!(err.downcast_ref::<WatchError>().is_some());
    }
}
