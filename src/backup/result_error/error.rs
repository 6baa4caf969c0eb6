use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use itertools::Itertools;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::mpsc::SendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Notify(#[from] notify::Error),
    #[error(transparent)]
    ValidationErrors(#[from] validator::ValidationErrors),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationError),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    StripPrefix(#[from] std::path::StripPrefixError),
    #[error("Source path does not exist: {}", .0.display())]
    SourceMissing(PathBuf),
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("Backup artifact already exists, refusing to overwrite: {}", .0.display())]
    ArtifactExists(PathBuf),
    #[error("Path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
    #[error("Thread {0} panicked")]
    ThreadJoin(String),
    #[error("{0}")]
    ChannelSendError(String),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{:?} {} failed:\n{}", obj_debug, fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithDebugObjAndFnName {
        error: Box<Error>,
        obj_debug: Box<dyn Debug + Send + Sync>,
        fn_name: String,
    },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>, O: Debug + Send + Sync + 'static> WithDebugObjectAndFnName<S, O> for Error {
    fn with_debug_object_and_fn_name(self, obj: O, fn_name: S) -> Self {
        Error::WithDebugObjAndFnName {
            error: Box::new(self),
            obj_debug: Box::new(obj),
            fn_name: fn_name.into(),
        }
    }
}

impl<S: Into<String>> WithMsg<S> for Error {
    fn with_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<D: Debug> From<SendError<D>> for Error {
    fn from(value: SendError<D>) -> Self {
        Self::ChannelSendError(format!("Failed to send {:?}", value.0))
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(Error::into_iter).collect_vec())
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(Error::into_iter)),
            e => Box::new(std::iter::once(e)),
        }
    }

    pub fn chain(self, other: Error) -> Error {
        Error::LotsOfError(self.into_iter().chain(other.into_iter()).collect_vec())
    }

    /// Number of leaf errors, flattening nested aggregates.
    pub fn count(&self) -> usize {
        match self {
            Error::LotsOfError(v) => v.iter().map(Error::count).sum(),
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error);

        match error {
            Error::Io(_) => (),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_with_msg() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error).with_msg("Custom message");

        match error {
            Error::WithMsg { msg, .. } => assert_eq!(msg, "Custom message"),
            _ => panic!("Expected WithMsg error"),
        }
    }

    #[test]
    fn test_error_with_debug_object_and_fn_name() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error = Error::from(io_error)
            .with_debug_object_and_fn_name(PathBuf::from("/tmp/src"), "write_snapshot");

        let message = error.to_string();
        assert!(message.contains("\"/tmp/src\""));
        assert!(message.contains("write_snapshot failed"));
        assert!(message.contains("  file not found"));
    }

    #[test]
    fn test_error_from_send_error() {
        let (tx, rx) = mpsc::channel();
        drop(rx);

        match tx.send("event") {
            Err(send_error) => match Error::from(send_error) {
                Error::ChannelSendError(msg) => assert!(msg.contains("event")),
                _ => panic!("Expected ChannelSendError"),
            },
            Ok(_) => panic!("Expected send error"),
        }
    }

    #[test]
    fn test_error_from_vec_flattens() {
        let nested = Error::from(vec![
            Error::ArtifactExists(PathBuf::from("a")),
            Error::ArtifactExists(PathBuf::from("b")),
        ]);
        let combined = Error::from(vec![nested, Error::ThreadJoin("drain".into())]);

        match &combined {
            Error::LotsOfError(errors) => assert_eq!(errors.len(), 3),
            _ => panic!("Expected LotsOfError"),
        }
        assert_eq!(combined.count(), 3);
    }

    #[test]
    #[should_panic(expected = "Should not create lots of errors when error is empty")]
    fn test_error_from_empty_vec_panics() {
        let errors: Vec<Error> = vec![];
        let _error = Error::from(errors);
    }

    #[test]
    fn test_error_chain() {
        let error1 = Error::SourceMissing(PathBuf::from("/missing"));
        let error2 = Error::NotADirectory(PathBuf::from("/file"));

        let chained = error1.chain(error2);
        assert_eq!(chained.count(), 2);
        let message = chained.to_string();
        assert!(message.contains("Source path does not exist: /missing"));
        assert!(message.contains("Not a directory: /file"));
    }

    #[test]
    fn test_artifact_exists_display() {
        let error = Error::ArtifactExists(PathBuf::from("/b/docs_2024-01-01_00-00-00.zip"));
        assert_eq!(
            error.to_string(),
            "Backup artifact already exists, refusing to overwrite: /b/docs_2024-01-01_00-00-00.zip"
        );
    }
}
