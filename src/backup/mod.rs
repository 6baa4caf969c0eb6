pub mod artifact;
pub mod backup_config;
pub mod change_tracker;
pub mod debounce;
pub mod event_log;
pub mod file_ext;
pub mod finish;
pub mod orchestrator;
pub mod result_error;
pub mod retention;
pub mod service;
pub mod shutdown;
pub mod snapshot;
pub mod validate;
pub mod watcher;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
