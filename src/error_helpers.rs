//! Error helper functions for creating actionable error messages

use std::io;
use std::path::Path;

/// Check if an IO error is a permission denied error
pub fn is_permission_denied(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::PermissionDenied
}

/// Check if an IO error is a "not found" error
pub fn is_not_found(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::NotFound
}

/// Create an enhanced error message for permission issues
pub fn permission_error(path: &Path, operation: &str) -> String {
    let parent_dir = path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| ".".to_string());

    format!(
        "Permission denied when {} '{}'\n\n\
         Possible fixes:\n\
         1. Check permissions: ls -l '{}'\n\
         2. Rewrites need write access to the containing directory: chmod u+w '{}'\n\
         3. Exclude the path from the file set with --exclude\n\
         4. Re-run with --keep-going to skip unreadable files",
        operation,
        path.display(),
        path.display(),
        parent_dir
    )
}

/// Create an enhanced error message for missing files or directories
pub fn not_found_error(path: &Path, operation: &str) -> String {
    format!(
        "Not found while {}: '{}'\n\n\
         Possible fixes:\n\
         1. Check the path is correct\n\
         2. Use an absolute path if the relative path is ambiguous\n\
         3. Re-run with --keep-going to skip missing file sets",
        operation,
        path.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;

    #[test]
    fn test_is_permission_denied() {
        let perm_err = io::Error::new(ErrorKind::PermissionDenied, "access denied");
        assert!(is_permission_denied(&perm_err));

        let not_found_err = io::Error::new(ErrorKind::NotFound, "not found");
        assert!(!is_permission_denied(&not_found_err));
    }

    #[test]
    fn test_is_not_found() {
        let not_found_err = io::Error::new(ErrorKind::NotFound, "not found");
        assert!(is_not_found(&not_found_err));

        let perm_err = io::Error::new(ErrorKind::PermissionDenied, "access denied");
        assert!(!is_not_found(&perm_err));
    }

    #[test]
    fn test_permission_error_formatting() {
        let path = Path::new("/tmp/test.txt");
        let msg = permission_error(path, "rewriting");
        assert!(msg.contains("Permission denied"));
        assert!(msg.contains("rewriting"));
        assert!(msg.contains("/tmp/test.txt"));
        assert!(msg.contains("Possible fixes"));
    }

    #[test]
    fn test_not_found_error_formatting() {
        let path = Path::new("/home/user/src");
        let msg = not_found_error(path, "scanning");
        assert!(msg.contains("Not found"));
        assert!(msg.contains("/home/user/src"));
        assert!(msg.contains("scanning"));
    }
}
