// User-facing notices returned by session actions

use std::path::PathBuf;

/// Shallow message shown to the user. Full detail lives in the run's log file.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    #[error("Looks like you are missing some variables!")]
    MissingVariables,
    #[error("No data loaded. Open one or more files with data rows first.")]
    NoData,
    #[error("Looks like something went wrong. Make sure all variables are correct, especially when using a profile. See {} for more details.", .log.display())]
    Failed { log: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_points_at_log() {
        let notice = Notice::Failed { log: PathBuf::from("Logs/plotbot_20240101_120000.log") };
        assert!(notice.to_string().contains("Logs/plotbot_20240101_120000.log"));
    }

    #[test]
    fn test_missing_variables_message() {
        assert_eq!(
            Notice::MissingVariables.to_string(),
            "Looks like you are missing some variables!"
        );
    }
}
